//! Compiled extraction strategies
//!
//! A strategy is a pure `(card) -> Option<value>` function. Core strategies
//! never look inside the enrichment block, so the arrival of third-party
//! annotation text cannot change what the card itself reports.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::config::{FieldValidity, StrategySpec, TextHeuristic};
use super::{ExtractionError, ExtractionResult};
use crate::domain::parse_link_id;

static PRICE_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:[¥￥$€£₩₹₱฿]|RM|Rp|US\$)\s*\d[\d,]*(?:\.\d{1,2})?",
        r"|^\d[\d,]*(?:\.\d{1,2})?\s*(?:元|円)$",
    ))
    .expect("static regex")
});
static SOLD_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d[\d.,]*\s*(?:万|w|k)?\+?\s*(?:sold|sales|已售|销量|人付款|件)")
        .expect("static regex")
});

/// Parsed slot markup with the enrichment block fenced off
pub struct SlotView {
    document: Html,
    marker: Selector,
}

impl SlotView {
    #[must_use]
    pub fn parse(html: &str, marker: &Selector) -> Self {
        Self {
            document: Html::parse_fragment(html),
            marker: marker.clone(),
        }
    }

    #[must_use]
    pub fn has_marker(&self) -> bool {
        self.document.select(&self.marker).next().is_some()
    }

    /// Whitespace-collapsed text of the first enrichment block
    #[must_use]
    pub fn annotation_text(&self) -> Option<String> {
        self.document
            .select(&self.marker)
            .next()
            .map(|block| collapse(block.text()))
            .filter(|text| !text.is_empty())
    }

    fn in_enrichment(&self, element: ElementRef<'_>) -> bool {
        if self.marker.matches(&element) {
            return true;
        }
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| self.marker.matches(&ancestor))
    }

    /// Elements matching `selector` outside the enrichment block
    pub fn select<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.document
            .select(selector)
            .filter(move |element| !self.in_enrichment(*element))
    }

    /// Collapsed text of an element, skipping nested enrichment content
    #[must_use]
    pub fn text_of(&self, element: ElementRef<'_>) -> String {
        let parts = element.descendants().filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            (!self.in_enrichment(parent)).then_some(&**text)
        });
        collapse(parts)
    }

    /// Trimmed, non-empty text nodes of the card outside the enrichment block, in document order
    #[must_use]
    pub fn text_nodes(&self) -> Vec<String> {
        self.document
            .root_element()
            .descendants()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let parent = node.parent().and_then(ElementRef::wrap)?;
                if self.in_enrichment(parent) {
                    return None;
                }
                let collapsed = collapse(std::iter::once(&**text));
                (!collapsed.is_empty()).then_some(collapsed)
            })
            .collect()
    }
}

fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for word in parts.flat_map(str::split_whitespace) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// A strategy ready to run against a [`SlotView`]
#[derive(Debug, Clone)]
pub enum ExtractionStrategy {
    Attribute { selector: Selector, source: String, attr: String },
    Text { selector: Selector, source: String },
    HeuristicText(TextHeuristic),
    AccessibleText { selector: Selector, source: String },
    LinkIdentifier { selector: Selector, source: String },
}

pub(crate) fn compile_selector(source: &str) -> ExtractionResult<Selector> {
    Selector::parse(source).map_err(|e| ExtractionError::invalid_selector(source, e))
}

impl ExtractionStrategy {
    pub fn compile(spec: &StrategySpec) -> ExtractionResult<Self> {
        Ok(match spec {
            StrategySpec::Attribute { selector, attr } => Self::Attribute {
                selector: compile_selector(selector)?,
                source: selector.clone(),
                attr: attr.clone(),
            },
            StrategySpec::Text { selector } => Self::Text {
                selector: compile_selector(selector)?,
                source: selector.clone(),
            },
            StrategySpec::HeuristicText { heuristic } => Self::HeuristicText(*heuristic),
            StrategySpec::AccessibleText { selector } => Self::AccessibleText {
                selector: compile_selector(selector)?,
                source: selector.clone(),
            },
            StrategySpec::LinkIdentifier { selector } => Self::LinkIdentifier {
                selector: compile_selector(selector)?,
                source: selector.clone(),
            },
        })
    }

    /// Short label for trace output
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Attribute { source, attr, .. } => format!("attr({source} @{attr})"),
            Self::Text { source, .. } => format!("text({source})"),
            Self::HeuristicText(heuristic) => format!("heuristic({heuristic:?})"),
            Self::AccessibleText { source, .. } => format!("accessible({source})"),
            Self::LinkIdentifier { source, .. } => format!("link_id({source})"),
        }
    }

    /// First candidate that passes `validity`
    #[must_use]
    pub fn apply(&self, view: &SlotView, validity: &FieldValidity) -> Option<String> {
        let accept = |value: String| {
            let value = value.trim().to_string();
            validity.accepts(&value).then_some(value)
        };

        match self {
            Self::Attribute { selector, attr, .. } => view
                .select(selector)
                .filter_map(|element| element.value().attr(attr))
                .map(|raw| {
                    if attr == "srcset" {
                        first_srcset_entry(raw)
                    } else {
                        raw.to_string()
                    }
                })
                .find_map(accept),
            Self::Text { selector, .. } => view
                .select(selector)
                .map(|element| view.text_of(element))
                .find_map(accept),
            Self::AccessibleText { selector, .. } => view
                .select(selector)
                .flat_map(|element| {
                    [element.value().attr("aria-label"), element.value().attr("title")]
                        .into_iter()
                        .flatten()
                        .map(str::to_string)
                })
                .find_map(accept),
            Self::LinkIdentifier { selector, .. } => view
                .select(selector)
                .filter_map(|element| element.value().attr("href"))
                .filter_map(parse_link_id)
                .find_map(accept),
            Self::HeuristicText(heuristic) => apply_heuristic(*heuristic, view, validity),
        }
    }
}

fn apply_heuristic(
    heuristic: TextHeuristic,
    view: &SlotView,
    validity: &FieldValidity,
) -> Option<String> {
    let mut candidates = view
        .text_nodes()
        .into_iter()
        .filter(|text| validity.accepts(text));

    match heuristic {
        TextHeuristic::TitleLike => candidates
            .filter(|text| !looks_like_price(text) && !looks_like_sold(text))
            .max_by_key(|text| text.chars().count()),
        TextHeuristic::PriceLike => candidates.find(|text| looks_like_price(text)),
        TextHeuristic::SoldLike => candidates.find(|text| looks_like_sold(text)),
    }
}

#[must_use]
pub fn looks_like_price(text: &str) -> bool {
    PRICE_LIKE.is_match(text.trim())
}

#[must_use]
pub fn looks_like_sold(text: &str) -> bool {
    SOLD_LIKE.is_match(text)
}

fn first_srcset_entry(srcset: &str) -> String {
    srcset
        .split(',')
        .next()
        .and_then(|entry| entry.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}
