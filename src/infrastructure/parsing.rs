//! Card extraction for virtualized list slots
//!
//! Strategy configuration, compiled strategies, the annotation parser and the
//! [`FieldExtractor`] that ties them together.

pub mod annotation;
pub mod config;
pub mod error;
pub mod field_extractor;
pub mod strategies;

pub use annotation::{AnnotationParser, parse_scaled_number};
pub use config::{
    AnnotationKind, AnnotationRule, ExtractionConfig, FieldRuleSpec, FieldValidity, MultiplierToken,
    StrategySpec, TextHeuristic,
};
pub use error::{ExtractionError, ExtractionResult};
pub use field_extractor::{FieldExtractor, FieldRule};
pub use strategies::{ExtractionStrategy, SlotView, looks_like_price, looks_like_sold};
