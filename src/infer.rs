//! Type inference: per-cell classification and column-level consensus.
//!
//! Cells are tested against numeric, timestamp, and date shapes in that
//! order; anything else is text. Locale-dependent shapes such as
//! `03/04/2024` or `04-MAR-2024` are never guessed and stay text.
//!
//! A column's type is the unanimous vote of its non-blank cells. Dates and
//! timestamps agree with each other (the column becomes a timestamp if any
//! cell carries a time); every other disagreement falls back to text.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const DECIMAL_MAX_DIGITS: usize = 28;

static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("integer pattern"));
static GROUPED_DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[0-9]{1,3}(,[0-9]{3})*(\.[0-9]+)?$").expect("grouped decimal pattern")
});
static PLAIN_DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+\.[0-9]+$").expect("plain decimal pattern"));
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}[T ][0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?(Z|[+-][0-9]{2}:?[0-9]{2})?$",
    )
    .expect("timestamp pattern")
});
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Text,
    IntegerOrDecimal,
    Date,
    DateTime,
    /// Blank cell. Never a final column type.
    Unknown,
}

impl SemanticType {
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticType::Text => "text",
            SemanticType::IntegerOrDecimal => "integer_or_decimal",
            SemanticType::Date => "date",
            SemanticType::DateTime => "datetime",
            SemanticType::Unknown => "unknown",
        }
    }

    pub fn is_resolved(self) -> bool {
        !matches!(self, SemanticType::Unknown)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column-level decision: type plus numeric precision/scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecision {
    pub semantic_type: SemanticType,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl TypeDecision {
    pub const fn text() -> Self {
        Self {
            semantic_type: SemanticType::Text,
            precision: None,
            scale: None,
        }
    }

    const fn bare(semantic_type: SemanticType) -> Self {
        Self {
            semantic_type,
            precision: None,
            scale: None,
        }
    }
}

pub fn classify_cell(value: &str) -> SemanticType {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return SemanticType::Unknown;
    }
    if is_numeric(trimmed) {
        SemanticType::IntegerOrDecimal
    } else if TIMESTAMP_RE.is_match(trimmed) {
        SemanticType::DateTime
    } else if DATE_RE.is_match(trimmed) {
        SemanticType::Date
    } else {
        SemanticType::Text
    }
}

fn is_numeric(trimmed: &str) -> bool {
    INTEGER_RE.is_match(trimmed)
        || GROUPED_DECIMAL_RE.is_match(trimmed)
        || PLAIN_DECIMAL_RE.is_match(trimmed)
}

pub fn classify_column<I, S>(values: I) -> TypeDecision
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut consensus = Consensus::default();
    for value in values {
        consensus.observe(value.as_ref());
    }
    consensus.decide()
}

/// Precision and scale of one numeric cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericShape {
    /// Significant digits.
    pub precision: u32,
    /// Digits right of the decimal point.
    pub scale: u32,
}

impl NumericShape {
    pub fn integer_digits(self) -> u32 {
        self.precision.saturating_sub(self.scale)
    }
}

/// Measures a numeric cell exactly. Grouping commas are ignored; leading
/// zeros are not significant. Returns `None` for non-numeric input.
pub fn numeric_shape(value: &str) -> Option<NumericShape> {
    let trimmed = value.trim();
    if !is_numeric(trimmed) {
        return None;
    }
    let cleaned = trimmed.replace(',', "");
    let digit_count = cleaned.bytes().filter(u8::is_ascii_digit).count();
    if digit_count <= DECIMAL_MAX_DIGITS
        && let Ok(decimal) = Decimal::from_str(&cleaned)
    {
        let mantissa = decimal.mantissa().unsigned_abs();
        let digits = if mantissa == 0 {
            1
        } else {
            mantissa.ilog10() + 1
        };
        let scale = decimal.scale();
        return Some(NumericShape {
            precision: digits.max(scale),
            scale,
        });
    }
    Some(textual_shape(&cleaned))
}

// Values wider than the 96-bit decimal range are measured from the digits
// directly so nothing is rounded.
fn textual_shape(cleaned: &str) -> NumericShape {
    let unsigned = cleaned.trim_start_matches('-');
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let integer = integer.trim_start_matches('0');
    let digits = if integer.is_empty() {
        fraction.trim_start_matches('0').len()
    } else {
        integer.len() + fraction.len()
    };
    let scale = fraction.len() as u32;
    NumericShape {
        precision: (digits.max(1) as u32).max(scale),
        scale,
    }
}

/// Streaming form of [`classify_column`]: feed cells one at a time, then
/// [`decide`](Consensus::decide). Only counts and maxima are kept, so the
/// outcome does not depend on the order cells arrive in.
#[derive(Debug, Clone, Default)]
pub struct Consensus {
    numeric: usize,
    date: usize,
    datetime: usize,
    text: usize,
    max_precision: u32,
    max_scale: u32,
    max_integer_digits: u32,
}

impl Consensus {
    pub fn observe(&mut self, value: &str) {
        match classify_cell(value) {
            SemanticType::Unknown => {}
            SemanticType::IntegerOrDecimal => {
                self.numeric += 1;
                if let Some(shape) = numeric_shape(value) {
                    self.max_precision = self.max_precision.max(shape.precision);
                    self.max_scale = self.max_scale.max(shape.scale);
                    self.max_integer_digits = self.max_integer_digits.max(shape.integer_digits());
                }
            }
            SemanticType::Date => self.date += 1,
            SemanticType::DateTime => self.datetime += 1,
            SemanticType::Text => self.text += 1,
        }
    }

    pub fn votes(&self) -> usize {
        self.numeric + self.date + self.datetime + self.text
    }

    pub fn decide(&self) -> TypeDecision {
        let votes = self.votes();
        if votes == 0 {
            return TypeDecision::text();
        }
        if self.numeric == votes {
            // Widen so that the declared (precision, scale) holds both the
            // longest integer part and the longest fraction seen.
            let precision = self
                .max_precision
                .max(self.max_integer_digits + self.max_scale)
                .max(1);
            return TypeDecision {
                semantic_type: SemanticType::IntegerOrDecimal,
                precision: Some(precision),
                scale: (self.max_scale > 0).then_some(self.max_scale),
            };
        }
        if self.date + self.datetime == votes {
            return if self.datetime > 0 {
                TypeDecision::bare(SemanticType::DateTime)
            } else {
                TypeDecision::bare(SemanticType::Date)
            };
        }
        TypeDecision::text()
    }
}
