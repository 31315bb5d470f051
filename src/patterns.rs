//! Declarative table of the text-scanned product fields.
//!
//! Each entry pairs a label pattern with a value pattern and says how the
//! captured value is parsed. Localizing to another storefront means editing
//! this table, not the extractor.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ArticleNumber,
    Ean,
    PriceExVat,
    AvailableInStores,
    Rating,
    ReviewCount,
}

/// Whether the label precedes or follows the value in the page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPosition {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueParser {
    /// Digit string kept as text, whitespace removed (identifiers).
    Digits,
    /// Integer, whitespace thousand separators tolerated.
    Integer,
    /// Norwegian decimal: "1 039,20" -> 1039.2
    LocaleDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
}

pub struct FieldPattern {
    pub field: Field,
    label: &'static str,
    value: &'static str,
    position: LabelPosition,
    parser: ValueParser,
    regex: Regex,
}

impl FieldPattern {
    pub fn new(
        field: Field,
        label: &'static str,
        value: &'static str,
        position: LabelPosition,
        parser: ValueParser,
    ) -> Result<Self, regex::Error> {
        let source = match position {
            LabelPosition::Before => format!(r"(?i)(?:{})[:\s]*({})", label, value),
            LabelPosition::After => format!(r"(?i)({})\s*(?:{})", value, label),
        };
        Ok(FieldPattern {
            field,
            label,
            value,
            position,
            parser,
            regex: Regex::new(&source)?,
        })
    }

    /// First match in `text`, parsed. Unparseable captures yield `None`.
    pub fn extract(&self, text: &str) -> Option<FieldValue> {
        let captured = self.regex.captures(text)?.get(1)?.as_str();
        debug!(
            "{:?}: {:?} matched /{}/ ({:?} label /{}/)",
            self.field, captured, self.value, self.position, self.label
        );
        self.parser.parse(captured)
    }
}

impl ValueParser {
    pub fn parse(&self, raw: &str) -> Option<FieldValue> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return None;
        }
        match self {
            ValueParser::Digits => Some(FieldValue::Text(compact)),
            ValueParser::Integer => compact.parse().ok().map(FieldValue::Integer),
            ValueParser::LocaleDecimal => parse_locale_decimal(&compact).map(FieldValue::Decimal),
        }
    }
}

/// Comma is the decimal separator; a period is accepted when no comma is present.
pub fn parse_locale_decimal(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = if compact.contains(',') {
        compact.replace('.', "").replace(',', ".")
    } else {
        compact
    };
    normalized.parse().ok()
}

const DECIMAL_AMOUNT: &str = r"\d+(?:[\s\x{a0}]\d{3})*(?:,\d{1,2})?";

lazy_static! {
    pub static ref FIELD_PATTERNS: Vec<FieldPattern> = vec![
        FieldPattern::new(
            Field::ArticleNumber,
            r"Art(?:ikkel)?\.?\s*nr\.?",
            r"\d+",
            LabelPosition::Before,
            ValueParser::Digits,
        ),
        FieldPattern::new(
            Field::Ean,
            r"EAN(?:-?kode)?",
            r"\d{13}\b",
            LabelPosition::Before,
            ValueParser::Digits,
        ),
        FieldPattern::new(
            Field::PriceExVat,
            r"eks(?:kl)?\.?\s*mva\.?",
            DECIMAL_AMOUNT,
            LabelPosition::Before,
            ValueParser::LocaleDecimal,
        ),
        FieldPattern::new(
            Field::AvailableInStores,
            r"p[åa] lager i|tilgjengelig i",
            r"\d+",
            LabelPosition::Before,
            ValueParser::Integer,
        ),
        FieldPattern::new(
            Field::Rating,
            r"(?:av|/)\s*5\b",
            r"\d(?:[.,]\d{1,2})?",
            LabelPosition::After,
            ValueParser::LocaleDecimal,
        ),
        FieldPattern::new(
            Field::ReviewCount,
            r"anmeldelser|omtaler|vurderinger",
            r"\d+",
            LabelPosition::After,
            ValueParser::Integer,
        ),
    ]
    .into_iter()
    .collect::<Result<_, _>>()
    .expect("field pattern table must compile");
}
