//! Annotation block parsing
//!
//! The enrichment provider injects one free-text block per card, e.g.
//! `Monthly sales: 1.2万件 | Reviews: 210 | Listed: 2024-03-01`. Each rule
//! owns one label-keyed pattern; numeric values are scaled by multiplier
//! tokens (`万` = 10,000) and stripped of their unit.

use regex::Regex;
use tracing::trace;

use super::config::{AnnotationKind, AnnotationRule, MultiplierToken};
use super::{ExtractionError, ExtractionResult};
use crate::domain::{DraftRecord, FieldValue, RecordField};

#[derive(Debug, Clone)]
struct CompiledRule {
    field: RecordField,
    kind: AnnotationKind,
    unit: Option<String>,
    pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct AnnotationParser {
    rules: Vec<CompiledRule>,
    multipliers: Vec<MultiplierToken>,
}

impl AnnotationParser {
    pub fn new(
        rules: &[AnnotationRule],
        multipliers: &[MultiplierToken],
    ) -> ExtractionResult<Self> {
        let mut multipliers = multipliers.to_vec();
        // longest token first so "万" style tokens never lose to a prefix
        multipliers.sort_by(|a, b| b.token.chars().count().cmp(&a.token.chars().count()));

        let token_alternation = multipliers
            .iter()
            .filter(|token| !token.token.is_empty())
            .map(|token| regex::escape(&token.token))
            .collect::<Vec<_>>()
            .join("|");

        let rules = rules
            .iter()
            .map(|rule| compile_rule(rule, &token_alternation))
            .collect::<ExtractionResult<Vec<_>>>()?;

        Ok(Self { rules, multipliers })
    }

    /// Fills annotation fields of `draft` from `text`; fields without a match stay untouched
    pub fn apply(&self, text: &str, draft: &mut DraftRecord) {
        for rule in &self.rules {
            if let Some(value) = self.parse_rule(rule, text) {
                trace!(field = %rule.field, %value, "annotation matched");
                draft.set(rule.field, FieldValue::from_text(value));
            }
        }
    }

    /// Value of one field, if its label is present
    #[must_use]
    pub fn value_for(&self, field: RecordField, text: &str) -> Option<String> {
        self.rules
            .iter()
            .filter(|rule| rule.field == field)
            .find_map(|rule| self.parse_rule(rule, text))
    }

    fn parse_rule(&self, rule: &CompiledRule, text: &str) -> Option<String> {
        let caps = rule.pattern.captures(text)?;
        let raw = caps.name("value")?.as_str().trim();
        match rule.kind {
            AnnotationKind::Numeric => {
                // "3456 Wishlist" carries no multiplier even though "W" is a token
                let glued = caps.name("glued").is_some();
                let factor = caps
                    .name("mult")
                    .filter(|token| {
                        !(glued && token.as_str().ends_with(|c: char| c.is_ascii_alphanumeric()))
                    })
                    .and_then(|token| {
                        self.multipliers
                            .iter()
                            .find(|multiplier| multiplier.token == token.as_str())
                    })
                    .map_or(1.0, |multiplier| multiplier.factor);
                parse_scaled_number(raw, factor)
            }
            AnnotationKind::Text => {
                let value = rule
                    .unit
                    .as_deref()
                    .and_then(|unit| raw.strip_suffix(unit))
                    .unwrap_or(raw)
                    .trim();
                (!value.is_empty()).then(|| value.to_string())
            }
        }
    }
}

fn compile_rule(rule: &AnnotationRule, token_alternation: &str) -> ExtractionResult<CompiledRule> {
    let labels = rule
        .labels
        .iter()
        .filter(|label| !label.trim().is_empty())
        .map(|label| regex::escape(label.trim()))
        .collect::<Vec<_>>();
    if labels.is_empty() {
        return Err(ExtractionError::invalid_annotation_rule(rule.field, "no labels"));
    }
    let labels = labels.join("|");
    let unit = rule
        .unit
        .as_deref()
        .filter(|unit| !unit.is_empty())
        .map(|unit| format!(r"(?:\s*{})?", regex::escape(unit)))
        .unwrap_or_default();

    let pattern = match rule.kind {
        AnnotationKind::Numeric => {
            let mult = if token_alternation.is_empty() {
                String::new()
            } else {
                format!(r"\s*(?:(?P<mult>{token_alternation})(?P<glued>[A-Za-z0-9_])?)?")
            };
            format!(r"(?i:{labels})\s*[:：]?\s*(?P<value>\d[\d,]*(?:\.\d+)?){mult}{unit}")
        }
        AnnotationKind::Text => format!(r"(?i:{labels})\s*[:：]?\s*(?P<value>[^|｜;；\n]+)"),
    };

    let pattern = Regex::new(&pattern)
        .map_err(|e| ExtractionError::invalid_annotation_rule(rule.field, e))?;
    Ok(CompiledRule {
        field: rule.field,
        kind: rule.kind,
        unit: rule.unit.clone(),
        pattern,
    })
}

/// Parses `1,234.5` style numbers, applies `factor` and renders whole values without decimals
#[must_use]
pub fn parse_scaled_number(raw: &str, factor: f64) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let number: f64 = cleaned.parse().ok()?;
    let scaled = (number * factor * 100.0).round() / 100.0;
    if scaled.fract() == 0.0 {
        Some(format!("{}", scaled as i64))
    } else {
        let rendered = format!("{scaled:.2}");
        Some(rendered.trim_end_matches('0').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::config::ExtractionConfig;
    use rstest::rstest;

    fn parser() -> AnnotationParser {
        let config = ExtractionConfig::default();
        AnnotationParser::new(&config.annotation_rules, &config.multipliers).unwrap()
    }

    const BLOCK: &str = concat!(
        "Monthly sales: 1.2万件 | Total sales: 3,456 | Reviews: 210条 | ",
        "Rating: 4.8 | Listed: 2024-03-01",
    );

    #[test]
    fn parses_every_default_label() {
        let mut draft = DraftRecord::new();
        parser().apply(BLOCK, &mut draft);
        assert_eq!(draft.known(RecordField::MonthlySales), Some("12000"));
        assert_eq!(draft.known(RecordField::TotalSales), Some("3456"));
        assert_eq!(draft.known(RecordField::ReviewCount), Some("210"));
        assert_eq!(draft.known(RecordField::Rating), Some("4.8"));
        assert_eq!(draft.known(RecordField::ListedAt), Some("2024-03-01"));
    }

    #[test]
    fn missing_labels_leave_fields_unknown() {
        let mut draft = DraftRecord::new();
        parser().apply("Rating: 4.1", &mut draft);
        assert_eq!(draft.known(RecordField::Rating), Some("4.1"));
        assert_eq!(draft.get(RecordField::MonthlySales), &FieldValue::Unknown);
    }

    #[test]
    fn chinese_labels_and_full_width_colon() {
        let parser = parser();
        let listed_and_rated = "上架时间：2023-11-30；评分 4.9";
        assert_eq!(
            parser.value_for(RecordField::MonthlySales, "月销量：3.5w").as_deref(),
            Some("35000")
        );
        assert_eq!(
            parser.value_for(RecordField::ListedAt, listed_and_rated).as_deref(),
            Some("2023-11-30")
        );
        assert_eq!(
            parser.value_for(RecordField::Rating, listed_and_rated).as_deref(),
            Some("4.9")
        );
    }

    #[rstest]
    #[case("Total sales: 3456 Wishlist: 12", "3456")]
    #[case("Total sales: 12 kg shipped", "12")]
    #[case("Total sales: 2.5k件", "2500")]
    #[case("Total sales: 7K | Reviews: 3", "7000")]
    #[case("Total sales: 4W", "40000")]
    fn latin_multipliers_need_a_word_end(#[case] block: &str, #[case] expected: &str) {
        assert_eq!(parser().value_for(RecordField::TotalSales, block).as_deref(), Some(expected));
    }

    #[test]
    fn labels_without_rules_are_rejected() {
        let rule = AnnotationRule {
            field: RecordField::Rating,
            labels: vec![" ".to_string()],
            unit: None,
            kind: AnnotationKind::Numeric,
        };
        assert!(AnnotationParser::new(&[rule], &[]).is_err());
    }

    #[rstest]
    #[case("1.2", 10_000.0, "12000")]
    #[case("3,400", 1.0, "3400")]
    #[case("2.5", 1_000.0, "2500")]
    #[case("4.75", 1.0, "4.75")]
    #[case("0.333", 1.0, "0.33")]
    fn scaled_numbers(#[case] raw: &str, #[case] factor: f64, #[case] expected: &str) {
        assert_eq!(parse_scaled_number(raw, factor).as_deref(), Some(expected));
    }
}
