//! Item identity independent of the slot rendering it
//!
//! Priority: a stable id parsed out of the canonical link; otherwise a
//! composite of title prefix, normalized price and image stem. The composite is
//! a best-effort dedup floor: two different items that agree on all three
//! segments collapse into one fingerprint, and that is accepted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use super::constants::identity::{
    COMPOSITE_SEPARATOR, COMPOSITE_TITLE_CHARS, LINK_ID_MAX_LEN, LINK_ID_MIN_LEN,
    LINK_ID_QUERY_KEYS,
};
use super::record::{DraftRecord, RecordField};

static DOUBLE_ID_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-i\.(\d+)\.(\d+)$").expect("static regex"));
static TRAILING_DIGITS_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[-_])(\d{5,})(?:\.html?)?$").expect("static regex"));
static PRICE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("static regex"));

const ID_PATH_KEYWORDS: &[&str] =
    &["item", "items", "product", "products", "goods", "dp", "p", "i"];

/// Derived identity of one logical item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Fingerprint {
    /// Stable identifier parsed from the canonical link
    LinkId(String),
    /// Title prefix, price and image stem joined with [`COMPOSITE_SEPARATOR`]
    Composite(String),
}

impl Fingerprint {
    pub fn link_id(id: impl Into<String>) -> Self {
        Self::LinkId(id.into())
    }

    /// Builds a composite from already-available parts; missing parts become empty segments
    #[must_use]
    pub fn composite(title: Option<&str>, price: Option<&str>, image: Option<&str>) -> Self {
        let title_segment: String = title
            .map(|title| {
                collapse_whitespace(title)
                    .chars()
                    .take(COMPOSITE_TITLE_CHARS)
                    .collect()
            })
            .unwrap_or_default();
        let price_segment = price.map(normalize_price).unwrap_or_default();
        let image_segment = image.map(image_stem).unwrap_or_default();

        let mut key = String::with_capacity(
            title_segment.len() + price_segment.len() + image_segment.len() + 2,
        );
        key.push_str(&title_segment);
        key.push(COMPOSITE_SEPARATOR);
        key.push_str(&price_segment);
        key.push(COMPOSITE_SEPARATOR);
        key.push_str(&image_segment);
        Self::Composite(key)
    }

    #[must_use]
    pub const fn is_link_id(&self) -> bool {
        matches!(self, Self::LinkId(_))
    }

    /// Serialized form, unambiguous and parseable back
    #[must_use]
    pub fn to_key(&self) -> String {
        match self {
            Self::LinkId(id) => format!("id:{id}"),
            Self::Composite(key) => format!("cmp:{key}"),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkId(id) => write!(f, "id:{id}"),
            Self::Composite(key) => {
                write!(f, "cmp:")?;
                for (i, segment) in key.split(COMPOSITE_SEPARATOR).enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    f.write_str(segment)?;
                }
                Ok(())
            }
        }
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_key()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if let Some(id) = value.strip_prefix("id:") {
            Ok(Self::LinkId(id.to_string()))
        } else if let Some(key) = value.strip_prefix("cmp:") {
            Ok(Self::Composite(key.to_string()))
        } else {
            Err(format!("not a fingerprint key: {value}"))
        }
    }
}

/// Assigns fingerprints to draft records. Pure and deterministic; never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FingerprintGenerator;

impl FingerprintGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn fingerprint(&self, draft: &DraftRecord) -> Fingerprint {
        let from_link = draft
            .known(RecordField::ItemId)
            .filter(|id| is_well_formed_id(id))
            .map(str::to_string)
            .or_else(|| draft.known(RecordField::Link).and_then(parse_link_id));

        match from_link {
            Some(id) => Fingerprint::LinkId(id),
            None => Fingerprint::composite(
                draft.known(RecordField::Title),
                draft.known(RecordField::Price),
                draft.known(RecordField::ImageUrl),
            ),
        }
    }
}

/// Extracts a stable id segment from a canonical link, if one is present and well-formed
#[must_use]
pub fn parse_link_id(link: &str) -> Option<String> {
    let url = parse_possibly_relative(link.trim())?;

    for (key, value) in url.query_pairs() {
        if LINK_ID_QUERY_KEYS.contains(&key.as_ref()) && is_well_formed_id(&value) {
            return Some(value.into_owned());
        }
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
        .unwrap_or_default();

    for window in segments.windows(2) {
        if ID_PATH_KEYWORDS.contains(&window[0].to_ascii_lowercase().as_str()) {
            let candidate = strip_html_suffix(window[1]);
            if is_well_formed_id(candidate) {
                return Some(candidate.to_string());
            }
        }
    }

    for segment in segments.iter().rev() {
        if let Some(caps) = DOUBLE_ID_SEGMENT.captures(segment) {
            return Some(format!("{}.{}", &caps[1], &caps[2]));
        }
        if let Some(caps) = TRAILING_DIGITS_SEGMENT.captures(segment) {
            let digits = &caps[1];
            if digits.len() <= LINK_ID_MAX_LEN {
                return Some(digits.to_string());
            }
        }
    }
    None
}

fn parse_possibly_relative(link: &str) -> Option<Url> {
    if link.is_empty() {
        return None;
    }
    if link.starts_with("//") {
        return Url::parse(&format!("https:{link}")).ok();
    }
    Url::parse(link).ok().or_else(|| {
        Url::parse("https://listing.invalid/")
            .ok()
            .and_then(|base| base.join(link).ok())
    })
}

fn strip_html_suffix(segment: &str) -> &str {
    segment
        .strip_suffix(".html")
        .or_else(|| segment.strip_suffix(".htm"))
        .unwrap_or(segment)
}

/// Ids must be opaque tokens with at least one digit; slugs like `blue-lamp` are not ids
fn is_well_formed_id(candidate: &str) -> bool {
    (LINK_ID_MIN_LEN..=LINK_ID_MAX_LEN).contains(&candidate.len())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && candidate.chars().any(|c| c.is_ascii_digit())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First number of a price text without grouping separators or trailing zeros
#[must_use]
pub fn normalize_price(price: &str) -> String {
    let Some(found) = PRICE_NUMBER.find(price) else {
        return String::new();
    };
    let mut number: String = found.as_str().chars().filter(|c| *c != ',').collect();
    if number.contains('.') {
        while number.ends_with('0') {
            number.pop();
        }
        if number.ends_with('.') {
            number.pop();
        }
    }
    number
}

/// File name of an image reference up to its first dot
#[must_use]
pub fn image_stem(image: &str) -> String {
    let without_query = image.split(['?', '#']).next().unwrap_or_default();
    let file_name = without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default();
    file_name.split('.').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parameter_id() {
        assert_eq!(
            parse_link_id("https://shop.example.com/detail?spm=a1&id=6789012").as_deref(),
            Some("6789012")
        );
    }

    #[test]
    fn keyword_path_id() {
        assert_eq!(parse_link_id("/item/A1B2C3D4.html").as_deref(), Some("A1B2C3D4"));
        assert_eq!(
            parse_link_id("https://m.example.com/dp/B07XJ8C8F5").as_deref(),
            Some("B07XJ8C8F5")
        );
    }

    #[test]
    fn trailing_digit_segment() {
        assert_eq!(parse_link_id("/goods-601099512345.html").as_deref(), Some("601099512345"));
        assert_eq!(
            parse_link_id("//example.com/some-title-i.4211.99871").as_deref(),
            Some("4211.99871")
        );
    }

    #[test]
    fn slugs_are_not_ids() {
        assert_eq!(parse_link_id("/product/blue-lamp"), None);
        assert_eq!(parse_link_id("/search?q=lamp"), None);
        assert_eq!(parse_link_id(""), None);
    }

    #[test]
    fn same_link_id_same_fingerprint() {
        let generator = FingerprintGenerator::new();
        let a = DraftRecord::new()
            .with(RecordField::Link, "/item/998877?from=list")
            .with(RecordField::Title, "first render");
        let b = DraftRecord::new()
            .with(RecordField::Link, "https://www.example.com/item/998877")
            .with(RecordField::Title, "title changed after enrichment");
        assert_eq!(generator.fingerprint(&a), generator.fingerprint(&b));
        assert!(generator.fingerprint(&a).is_link_id());
    }

    #[test]
    fn composite_truncates_title_and_normalizes_parts() {
        let fp = Fingerprint::composite(
            Some("Ultra   bright LED desk lamp with wireless charger base"),
            Some("¥1,299.50"),
            Some("https://img.example.com/a/b/O1CN01abc.jpg_220x220.jpg?x=1"),
        );
        let Fingerprint::Composite(key) = &fp else { panic!("expected composite") };
        let parts: Vec<&str> = key.split(COMPOSITE_SEPARATOR).collect();
        assert_eq!(parts[0], "Ultra bright LED desk lamp wit");
        assert_eq!(parts[1], "1299.5");
        assert_eq!(parts[2], "O1CN01abc");
    }

    #[test]
    fn composite_tolerates_missing_parts() {
        let fp = Fingerprint::composite(None, Some("$4.00"), None);
        assert_eq!(fp.to_key(), format!("cmp:{COMPOSITE_SEPARATOR}4{COMPOSITE_SEPARATOR}"));
    }

    #[test]
    fn key_round_trips() {
        let fp = Fingerprint::composite(Some("Mug"), Some("3"), Some("m.png"));
        assert_eq!(Fingerprint::try_from(fp.to_key()).unwrap(), fp);
    }
}
