//! Extraction configuration
//!
//! Every output field owns an ordered list of strategies and a validity
//! predicate. Selector lists are deliberately redundant: card markup changes
//! between page builds, so each field can be recovered from several
//! independent signals.

use serde::{Deserialize, Serialize};

use crate::domain::RecordField;

/// Main extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Base URL for resolving relative links and image references
    pub base_url: Option<String>,

    /// Selectors identifying the third-party annotation block; any match counts
    pub enrichment_marker: Vec<String>,

    /// Per-field strategy cascades for fields read from the card itself
    pub fields: Vec<FieldRuleSpec>,

    /// Label patterns applied to the annotation block text
    pub annotation_rules: Vec<AnnotationRule>,

    /// Large-number abbreviations recognised after annotation numbers
    pub multipliers: Vec<MultiplierToken>,
}

/// Strategy cascade for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRuleSpec {
    pub field: RecordField,
    pub strategies: Vec<StrategySpec>,
    #[serde(default)]
    pub validity: FieldValidity,
}

/// One way of reading a field out of a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategySpec {
    /// Attribute of the first matching element
    Attribute { selector: String, attr: String },
    /// Text content of the first matching element
    Text { selector: String },
    /// Any text node in the card that looks like the wanted kind of value
    HeuristicText { heuristic: TextHeuristic },
    /// `aria-label`, then `title`, of the first matching element
    AccessibleText { selector: String },
    /// Stable id parsed from the href of a matching link
    LinkIdentifier { selector: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextHeuristic {
    /// Longest text node passing the field's validity predicate
    TitleLike,
    /// First text node that reads like an amount of money
    PriceLike,
    /// First text node that reads like a sold counter
    SoldLike,
}

/// Validity predicate a candidate value must pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldValidity {
    pub min_chars: usize,
    pub max_chars: usize,
    pub reject_currency: bool,
    pub reject_percent: bool,
    pub reject_numeric_only: bool,
    pub require_digit: bool,
    pub reject_prefixes: Vec<String>,
}

impl Default for FieldValidity {
    fn default() -> Self {
        Self {
            min_chars: 1,
            max_chars: 2048,
            reject_currency: false,
            reject_percent: false,
            reject_numeric_only: false,
            require_digit: false,
            reject_prefixes: Vec::new(),
        }
    }
}

pub const CURRENCY_SYMBOLS: &[char] =
    &['¥', '￥', '$', '€', '£', '₩', '₹', '₱', '฿', '元'];

impl FieldValidity {
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        let chars = value.chars().count();
        if chars < self.min_chars || chars > self.max_chars {
            return false;
        }
        if self.reject_currency && value.contains(CURRENCY_SYMBOLS) {
            return false;
        }
        if self.reject_percent && value.contains(['%', '％']) {
            return false;
        }
        if self.reject_numeric_only
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '+' | '-' | ' '))
        {
            return false;
        }
        if self.require_digit && !value.chars().any(|c| c.is_ascii_digit()) {
            return false;
        }
        let lowered = value.to_ascii_lowercase();
        !self
            .reject_prefixes
            .iter()
            .any(|prefix| lowered.starts_with(&prefix.to_ascii_lowercase()))
    }
}

/// Label-keyed pattern over the annotation text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRule {
    pub field: RecordField,
    /// Alternative labels, tried as one case-insensitive alternation
    pub labels: Vec<String>,
    /// Unit suffix stripped from the value
    #[serde(default)]
    pub unit: Option<String>,
    pub kind: AnnotationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierToken {
    pub token: String,
    pub factor: f64,
}

fn attribute(selector: &str, attr: &str) -> StrategySpec {
    StrategySpec::Attribute {
        selector: selector.to_string(),
        attr: attr.to_string(),
    }
}

fn text(selector: &str) -> StrategySpec {
    StrategySpec::Text {
        selector: selector.to_string(),
    }
}

fn annotation(
    field: RecordField,
    labels: &[&str],
    unit: Option<&str>,
    kind: AnnotationKind,
) -> AnnotationRule {
    AnnotationRule {
        field,
        labels: labels.iter().map(|label| (*label).to_string()).collect(),
        unit: unit.map(str::to_string),
        kind,
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            enrichment_marker: vec![
                "[data-enrichment]".to_string(),
                ".enrich-panel".to_string(),
                ".plugin-annotation".to_string(),
            ],
            fields: vec![
                FieldRuleSpec {
                    field: RecordField::ItemId,
                    strategies: vec![
                        StrategySpec::LinkIdentifier {
                            selector: "a[href]".to_string(),
                        },
                        attribute("[data-item-id]", "data-item-id"),
                        attribute("[data-id]", "data-id"),
                    ],
                    validity: FieldValidity {
                        min_chars: 4,
                        max_chars: 64,
                        ..FieldValidity::default()
                    },
                },
                FieldRuleSpec {
                    field: RecordField::Title,
                    strategies: vec![
                        attribute("a[title]", "title"),
                        text("a [class*='title']"),
                        text("[class*='title']"),
                        StrategySpec::HeuristicText {
                            heuristic: TextHeuristic::TitleLike,
                        },
                        StrategySpec::AccessibleText {
                            selector: "a[aria-label], [aria-label], [title]".to_string(),
                        },
                        attribute("img[alt]", "alt"),
                    ],
                    validity: FieldValidity {
                        min_chars: 6,
                        max_chars: 300,
                        reject_currency: true,
                        reject_percent: true,
                        reject_numeric_only: true,
                        ..FieldValidity::default()
                    },
                },
                FieldRuleSpec {
                    field: RecordField::Price,
                    strategies: vec![
                        text("[class*='price'] em"),
                        text("[class*='price']"),
                        StrategySpec::HeuristicText {
                            heuristic: TextHeuristic::PriceLike,
                        },
                        StrategySpec::AccessibleText {
                            selector: "[class*='price']".to_string(),
                        },
                    ],
                    validity: FieldValidity {
                        min_chars: 1,
                        max_chars: 40,
                        reject_percent: true,
                        require_digit: true,
                        ..FieldValidity::default()
                    },
                },
                FieldRuleSpec {
                    field: RecordField::Link,
                    strategies: vec![
                        attribute("a[href*='/item']", "href"),
                        attribute("a[href*='/product']", "href"),
                        attribute("a[href*='id=']", "href"),
                        attribute("a[href]", "href"),
                    ],
                    validity: FieldValidity {
                        min_chars: 2,
                        reject_prefixes: vec!["javascript:".to_string(), "#".to_string()],
                        ..FieldValidity::default()
                    },
                },
                FieldRuleSpec {
                    field: RecordField::ImageUrl,
                    strategies: vec![
                        attribute("img[src]", "src"),
                        attribute("img[data-src]", "data-src"),
                        attribute("img[srcset]", "srcset"),
                    ],
                    validity: FieldValidity {
                        min_chars: 4,
                        reject_prefixes: vec!["data:".to_string()],
                        ..FieldValidity::default()
                    },
                },
                FieldRuleSpec {
                    field: RecordField::ShopName,
                    strategies: vec![
                        text("[class*='shop']"),
                        text("[class*='store']"),
                        text("[class*='seller']"),
                    ],
                    validity: FieldValidity {
                        min_chars: 2,
                        max_chars: 80,
                        reject_currency: true,
                        reject_percent: true,
                        reject_numeric_only: true,
                        ..FieldValidity::default()
                    },
                },
                FieldRuleSpec {
                    field: RecordField::SoldText,
                    strategies: vec![
                        text("[class*='sold']"),
                        text("[class*='sales']"),
                        StrategySpec::HeuristicText {
                            heuristic: TextHeuristic::SoldLike,
                        },
                    ],
                    validity: FieldValidity {
                        min_chars: 1,
                        max_chars: 40,
                        require_digit: true,
                        reject_currency: true,
                        ..FieldValidity::default()
                    },
                },
            ],
            annotation_rules: vec![
                annotation(
                    RecordField::MonthlySales,
                    &["Monthly sales", "月销量", "月销"],
                    Some("件"),
                    AnnotationKind::Numeric,
                ),
                annotation(
                    RecordField::TotalSales,
                    &["Total sales", "总销量"],
                    Some("件"),
                    AnnotationKind::Numeric,
                ),
                annotation(
                    RecordField::ReviewCount,
                    &["Reviews", "评价数", "评价"],
                    Some("条"),
                    AnnotationKind::Numeric,
                ),
                annotation(
                    RecordField::Rating,
                    &["Rating", "评分"],
                    None,
                    AnnotationKind::Numeric,
                ),
                annotation(
                    RecordField::ListedAt,
                    &["Listed", "上架时间", "上架"],
                    None,
                    AnnotationKind::Text,
                ),
            ],
            multipliers: vec![
                MultiplierToken { token: "万".to_string(), factor: 10_000.0 },
                MultiplierToken { token: "w".to_string(), factor: 10_000.0 },
                MultiplierToken { token: "W".to_string(), factor: 10_000.0 },
                MultiplierToken { token: "k".to_string(), factor: 1_000.0 },
                MultiplierToken { token: "K".to_string(), factor: 1_000.0 },
            ],
        }
    }
}
