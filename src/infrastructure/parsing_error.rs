//! Extraction setup errors
//!
//! Runtime extraction misses are not errors (they fall through to the next
//! strategy and finally to the "unknown" sentinel). These variants only cover
//! building an extractor from configuration.

use thiserror::Error;

use crate::domain::RecordField;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No usable extraction strategy for field '{field}'")]
    NoStrategies {
        field: RecordField,
        rejected_selectors: Vec<String>,
    },

    #[error("Invalid annotation pattern for field '{field}': {reason}")]
    InvalidAnnotationRule { field: RecordField, reason: String },

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Enrichment marker has no valid selector")]
    NoEnrichmentMarker { rejected_selectors: Vec<String> },
}

impl ExtractionError {
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_annotation_rule(field: RecordField, reason: impl ToString) -> Self {
        Self::InvalidAnnotationRule {
            field,
            reason: reason.to_string(),
        }
    }
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;
