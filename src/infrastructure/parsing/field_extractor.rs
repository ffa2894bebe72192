//! Field extractor
//!
//! Converts one slot's markup into a [`DraftRecord`]. Every card field runs
//! its strategy cascade in order; the first value passing the field's validity
//! predicate wins and a field nobody fills stays `Unknown`. Annotation fields
//! come from the enrichment block through the [`AnnotationParser`].

use scraper::Selector;
use tracing::{debug, trace, warn};
use url::Url;

use super::annotation::AnnotationParser;
use super::config::{ExtractionConfig, FieldValidity};
use super::strategies::{ExtractionStrategy, SlotView, compile_selector};
use super::{ExtractionError, ExtractionResult};
use crate::domain::{ContentHash, DraftRecord, FieldValue, RecordField, SlotContent};

/// Compiled cascade for one field
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: RecordField,
    pub strategies: Vec<ExtractionStrategy>,
    pub validity: FieldValidity,
}

impl FieldRule {
    /// Runs the cascade; `None` once every strategy missed
    #[must_use]
    pub fn extract(&self, view: &SlotView) -> Option<String> {
        self.strategies.iter().find_map(|strategy| {
            let value = strategy.apply(view, &self.validity);
            if value.is_some() {
                trace!(field = %self.field, strategy = %strategy.describe(), "strategy matched");
            }
            value
        })
    }
}

#[derive(Debug, Clone)]
pub struct FieldExtractor {
    rules: Vec<FieldRule>,
    marker: Selector,
    annotation: AnnotationParser,
    base_url: Option<Url>,
}

impl FieldExtractor {
    /// Extractor with the built-in strategy configuration
    pub fn new() -> ExtractionResult<Self> {
        Self::with_config(&ExtractionConfig::default())
    }

    /// Compiles a configuration. Invalid selectors are skipped with a warning;
    /// a field left without any strategy is an error.
    pub fn with_config(config: &ExtractionConfig) -> ExtractionResult<Self> {
        let marker = compile_marker(&config.enrichment_marker)?;

        let mut rules = Vec::with_capacity(config.fields.len());
        for spec in &config.fields {
            let mut strategies = Vec::with_capacity(spec.strategies.len());
            let mut rejected = Vec::new();
            for strategy in &spec.strategies {
                match ExtractionStrategy::compile(strategy) {
                    Ok(compiled) => strategies.push(compiled),
                    Err(e) => {
                        warn!("Skipping strategy for '{}': {}", spec.field, e);
                        rejected.push(e.to_string());
                    }
                }
            }
            if strategies.is_empty() {
                return Err(ExtractionError::NoStrategies {
                    field: spec.field,
                    rejected_selectors: rejected,
                });
            }
            rules.push(FieldRule {
                field: spec.field,
                strategies,
                validity: spec.validity.clone(),
            });
        }

        let annotation = AnnotationParser::new(&config.annotation_rules, &config.multipliers)?;

        let base_url = config
            .base_url
            .as_deref()
            .map(|url| {
                Url::parse(url).map_err(|e| ExtractionError::InvalidBaseUrl {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        debug!(
            "Field extractor ready: {} card rules, base_url={:?}",
            rules.len(),
            base_url.as_ref().map(Url::as_str)
        );

        Ok(Self {
            rules,
            marker,
            annotation,
            base_url,
        })
    }

    #[must_use]
    pub fn view(&self, content: &SlotContent) -> SlotView {
        SlotView::parse(&content.html, &self.marker)
    }

    /// Whether the third-party annotation marker is present in the slot
    #[must_use]
    pub fn has_enrichment(&self, content: &SlotContent) -> bool {
        self.view(content).has_marker()
    }

    #[must_use]
    pub fn extract(&self, content: &SlotContent) -> DraftRecord {
        self.extract_view(&self.view(content))
    }

    #[must_use]
    pub fn extract_view(&self, view: &SlotView) -> DraftRecord {
        let mut draft = DraftRecord::new();
        for rule in &self.rules {
            let value = rule
                .extract(view)
                .map(|value| self.normalize(rule.field, value))
                .map_or(FieldValue::Unknown, FieldValue::from_text);
            draft.set(rule.field, value);
        }
        if let Some(text) = view.annotation_text() {
            self.annotation.apply(&text, &mut draft);
        }
        draft
    }

    /// Value of a single card field, normalized, if any strategy succeeds
    #[must_use]
    pub fn extract_field(&self, view: &SlotView, field: RecordField) -> Option<String> {
        self.rules
            .iter()
            .filter(|rule| rule.field == field)
            .find_map(|rule| rule.extract(view))
            .map(|value| self.normalize(field, value))
    }

    /// Hash of the volatile visible fields: link, image, title, price
    #[must_use]
    pub fn content_hash(&self, content: &SlotContent) -> ContentHash {
        let view = self.view(content);
        let link = self.extract_field(&view, RecordField::Link);
        let image = self.extract_field(&view, RecordField::ImageUrl);
        let title = self.extract_field(&view, RecordField::Title);
        let price = self.extract_field(&view, RecordField::Price);
        ContentHash::from_visible_fields(
            link.as_deref(),
            image.as_deref(),
            title.as_deref(),
            price.as_deref(),
        )
    }

    fn normalize(&self, field: RecordField, value: String) -> String {
        match field {
            RecordField::Link | RecordField::ImageUrl => self.resolve_url(&value),
            _ => value,
        }
    }

    /// Makes protocol-relative and relative references absolute where possible
    fn resolve_url(&self, href: &str) -> String {
        if href.starts_with("//") {
            return format!("https:{href}");
        }
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        self.base_url
            .as_ref()
            .and_then(|base| base.join(href).ok())
            .map_or_else(|| href.to_string(), |url| url.to_string())
    }
}

fn compile_marker(sources: &[String]) -> ExtractionResult<Selector> {
    let mut valid = Vec::new();
    let mut rejected = Vec::new();
    for source in sources {
        match compile_selector(source) {
            Ok(_) => valid.push(source.as_str()),
            Err(e) => {
                warn!("Skipping enrichment marker selector: {}", e);
                rejected.push(source.clone());
            }
        }
    }
    if valid.is_empty() {
        return Err(ExtractionError::NoEnrichmentMarker {
            rejected_selectors: rejected,
        });
    }
    compile_selector(&valid.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SlotHandle;
    use crate::infrastructure::parsing::config::{FieldRuleSpec, StrategySpec};

    fn slot(html: &str) -> SlotContent {
        SlotContent::new(SlotHandle::new(0), html)
    }

    const STYLED: &str = r#"<div class="card">
        <a class="item-link" href="//shop.example.com/item/5550001.html"
            title="Bamboo bath towel set of 3">
            <img src="//img.example.com/p/towel01.jpg">
            <span class="item-title">Bamboo bath towel set of 3</span>
        </a>
        <div class="item-price"><em>¥59.00</em></div>
        <div class="shop-name">Linen House</div>
        <span class="sold-count">2000+ sold</span>
    </div>"#;

    #[test]
    fn extracts_core_fields_from_styled_card() {
        let extractor = FieldExtractor::new().unwrap();
        let draft = extractor.extract(&slot(STYLED));
        assert_eq!(draft.known(RecordField::ItemId), Some("5550001"));
        assert_eq!(draft.known(RecordField::Title), Some("Bamboo bath towel set of 3"));
        assert_eq!(draft.known(RecordField::Price), Some("¥59.00"));
        assert_eq!(
            draft.known(RecordField::Link),
            Some("https://shop.example.com/item/5550001.html")
        );
        assert_eq!(
            draft.known(RecordField::ImageUrl),
            Some("https://img.example.com/p/towel01.jpg")
        );
        assert_eq!(draft.known(RecordField::ShopName), Some("Linen House"));
        assert_eq!(draft.known(RecordField::SoldText), Some("2000+ sold"));
        assert_eq!(draft.get(RecordField::MonthlySales), &FieldValue::Unknown);
    }

    #[test]
    fn bare_card_falls_back_to_heuristics() {
        let html = r#"<div>
            <a href="/goods-90001234.html" aria-label="Folding camping chair">
                <img data-src="https://img.example.com/c.png">
            </a>
            <div>
                <div>Folding camping chair with cup holder</div><div>$24.99</div><div>35% off</div>
            </div>
        </div>"#;
        let extractor = FieldExtractor::new().unwrap();
        let draft = extractor.extract(&slot(html));
        assert_eq!(draft.known(RecordField::Title), Some("Folding camping chair with cup holder"));
        assert_eq!(draft.known(RecordField::Price), Some("$24.99"));
        assert_eq!(draft.known(RecordField::ImageUrl), Some("https://img.example.com/c.png"));
        assert_eq!(draft.known(RecordField::ItemId), Some("90001234"));
        assert_eq!(draft.get(RecordField::ShopName), &FieldValue::Unknown);
    }

    #[test]
    fn annotation_fields_are_parsed_from_marker_block() {
        let panel = r#"<div class="enrich-panel" data-enrichment="ready">
            Monthly sales: 2.4万 | Reviews: 88
        </div>"#;
        let extractor = FieldExtractor::new().unwrap();
        let content = slot(&format!("<div>{STYLED}{panel}</div>"));
        assert!(extractor.has_enrichment(&content));
        let draft = extractor.extract(&content);
        assert_eq!(draft.known(RecordField::MonthlySales), Some("24000"));
        assert_eq!(draft.known(RecordField::ReviewCount), Some("88"));
        assert_eq!(draft.known(RecordField::Title), Some("Bamboo bath towel set of 3"));
    }

    #[test]
    fn content_hash_ignores_enrichment_arrival() {
        let extractor = FieldExtractor::new().unwrap();
        let before = slot(STYLED);
        let after = slot(&format!(r#"{STYLED}<div data-enrichment="ready">Reviews: 12</div>"#));
        assert_eq!(extractor.content_hash(&before), extractor.content_hash(&after));

        let other = slot(&STYLED.replace("5550001", "5550002"));
        assert_ne!(extractor.content_hash(&before), extractor.content_hash(&other));
    }

    #[test]
    fn relative_links_resolve_against_base_url() {
        let config = ExtractionConfig {
            base_url: Some("https://m.example.com/list/".to_string()),
            ..ExtractionConfig::default()
        };
        let extractor = FieldExtractor::with_config(&config).unwrap();
        let draft = extractor.extract(&slot(r#"<a href="/item/1234567">Garden hose reel</a>"#));
        assert_eq!(draft.known(RecordField::Link), Some("https://m.example.com/item/1234567"));
    }

    #[test]
    fn invalid_selectors_are_skipped_but_empty_rules_fail() {
        let mut config = ExtractionConfig::default();
        config.fields[1]
            .strategies
            .insert(0, StrategySpec::Text { selector: "[[broken".to_string() });
        assert!(FieldExtractor::with_config(&config).is_ok());

        config.fields.push(FieldRuleSpec {
            field: RecordField::ShopName,
            strategies: vec![StrategySpec::Text { selector: ":::".to_string() }],
            validity: FieldValidity::default(),
        });
        assert!(matches!(
            FieldExtractor::with_config(&config),
            Err(ExtractionError::NoStrategies { field: RecordField::ShopName, .. })
        ));
    }
}
