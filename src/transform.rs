//! Row transformer: raw cells to bind-ready values.
//!
//! Works from a [`LockedSchema`], so the value order of every
//! [`BoundRecord`] matches the locked insert statement's bind order.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    error::IngestError,
    infer::SemanticType,
    schema::LockedSchema,
    source::RowSource,
};

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Driver-level bind type for one named bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BindType {
    Varchar,
    Number,
    Date,
    Timestamp,
}

impl BindType {
    pub fn as_str(self) -> &'static str {
        match self {
            BindType::Varchar => "VARCHAR",
            BindType::Number => "NUMBER",
            BindType::Date => "DATE",
            BindType::Timestamp => "TIMESTAMP",
        }
    }
}

impl From<SemanticType> for BindType {
    fn from(value: SemanticType) -> Self {
        match value {
            SemanticType::Text | SemanticType::Unknown => BindType::Varchar,
            SemanticType::IntegerOrDecimal => BindType::Number,
            SemanticType::Date => BindType::Date,
            SemanticType::DateTime => BindType::Timestamp,
        }
    }
}

impl fmt::Display for BindType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundValue {
    Null,
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl BoundValue {
    pub fn is_null(&self) -> bool {
        matches!(self, BoundValue::Null)
    }
}

impl fmt::Display for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundValue::Null => f.write_str("NULL"),
            BoundValue::Text(text) => f.write_str(text),
            BoundValue::Number(number) => write!(f, "{number}"),
            BoundValue::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            BoundValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Normalized values for one source row, in locked column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundRecord {
    /// One-based data row number in the source.
    pub row: usize,
    pub values: Vec<BoundValue>,
}

/// Converts one raw cell for binding as `semantic_type`.
///
/// Null bytes are dropped and blank cells become [`BoundValue::Null`].
/// Values that do not parse as their column type are passed through as
/// text and left for the database to reject.
pub fn normalize_cell(raw: &str, semantic_type: SemanticType) -> BoundValue {
    let cleaned: String = raw.chars().filter(|&c| c != '\0').collect();
    let value = cleaned.trim();
    if value.is_empty() {
        return BoundValue::Null;
    }
    match semantic_type {
        SemanticType::IntegerOrDecimal => to_number(value),
        SemanticType::Date => to_date(value),
        SemanticType::DateTime => to_timestamp(value),
        SemanticType::Text | SemanticType::Unknown => BoundValue::Text(value.to_string()),
    }
}

fn to_number(value: &str) -> BoundValue {
    let digits = value.replace(',', "");
    match Decimal::from_str(&digits) {
        Ok(number) => BoundValue::Number(number),
        Err(_) => BoundValue::Text(digits),
    }
}

fn to_date(value: &str) -> BoundValue {
    value
        .get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, DATE_FORMAT).ok())
        .map_or_else(|| BoundValue::Text(value.to_string()), BoundValue::Date)
}

fn to_timestamp(value: &str) -> BoundValue {
    let naive = strip_zone(value);
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map_or_else(|| BoundValue::Text(value.to_string()), BoundValue::Timestamp)
}

// Drops a trailing `Z` or `+HH:MM` / `-HHMM` offset; values bind time-zone naive.
fn strip_zone(value: &str) -> &str {
    if let Some(stripped) = value.strip_suffix(['Z', 'z']) {
        return stripped;
    }
    let bytes = value.as_bytes();
    for offset_len in [6usize, 5] {
        let Some(start) = bytes.len().checked_sub(offset_len) else {
            continue;
        };
        // Offsets only follow a time, never a bare date.
        if start < 19 {
            continue;
        }
        let tail = &bytes[start..];
        let sign = matches!(tail[0], b'+' | b'-');
        let digits_ok = match offset_len {
            6 => tail[3] == b':' && [1, 2, 4, 5].iter().all(|&i| tail[i].is_ascii_digit()),
            _ => tail[1..].iter().all(u8::is_ascii_digit),
        };
        if sign && digits_ok {
            return &value[..start];
        }
    }
    value
}

/// Maps source rows onto a locked schema.
#[derive(Debug)]
pub struct RowTransformer<'a> {
    schema: &'a LockedSchema,
    positions: Vec<usize>,
    types: Vec<SemanticType>,
    expected: usize,
}

impl<'a> RowTransformer<'a> {
    /// `headers` is the source's header list; each locked column is looked
    /// up there by its source key.
    pub fn new(schema: &'a LockedSchema, headers: &[String]) -> Result<Self, IngestError> {
        let positions = schema
            .columns()
            .iter()
            .map(|column| {
                headers
                    .iter()
                    .position(|h| *h == column.source_key)
                    .ok_or_else(|| {
                        IngestError::schema(format!(
                            "Column '{}' is not present in the source headers",
                            column.source_key
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            schema,
            positions,
            types: schema.columns().iter().map(|c| c.semantic_type).collect(),
            expected: headers.len(),
        })
    }

    pub fn schema(&self) -> &LockedSchema {
        self.schema
    }

    pub fn transform(&self, row: usize, cells: &[String]) -> Result<BoundRecord, IngestError> {
        if cells.len() != self.expected {
            return Err(IngestError::Alignment {
                row,
                expected: self.expected,
                got: cells.len(),
            });
        }
        let values = self
            .positions
            .iter()
            .zip(&self.types)
            .map(|(&position, &semantic_type)| normalize_cell(&cells[position], semantic_type))
            .collect();
        Ok(BoundRecord { row, values })
    }

    /// Streams every row of `source` through [`RowTransformer::transform`].
    pub fn records<'s>(
        &'s self,
        source: &'s dyn RowSource,
    ) -> Result<impl Iterator<Item = Result<BoundRecord, IngestError>> + 's, IngestError> {
        let rows = source.rows()?;
        Ok(rows.enumerate().map(move |(idx, row)| {
            let cells = row?;
            self.transform(idx + 1, &cells)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, TableSchema};
    use crate::source::MemorySource;

    fn dec(value: &str) -> BoundValue {
        BoundValue::Number(Decimal::from_str(value).unwrap())
    }

    fn ts(value: &str) -> BoundValue {
        BoundValue::Timestamp(NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").unwrap())
    }

    #[test]
    fn blanks_and_null_bytes() {
        assert_eq!(normalize_cell("", SemanticType::Text), BoundValue::Null);
        assert_eq!(normalize_cell(" \0 ", SemanticType::IntegerOrDecimal), BoundValue::Null);
        assert_eq!(
            normalize_cell(" Ac\0me ", SemanticType::Text),
            BoundValue::Text("Acme".to_string())
        );
    }

    #[test]
    fn numbers_keep_exact_scale() {
        assert_eq!(normalize_cell("1,234.56", SemanticType::IntegerOrDecimal), dec("1234.56"));
        assert_eq!(normalize_cell("-0.50", SemanticType::IntegerOrDecimal), dec("-0.50"));
        assert_eq!(
            normalize_cell("N/A", SemanticType::IntegerOrDecimal),
            BoundValue::Text("N/A".to_string())
        );
        let wide = "1".repeat(35);
        assert_eq!(
            normalize_cell(&wide, SemanticType::IntegerOrDecimal),
            BoundValue::Text(wide.clone())
        );
    }

    #[test]
    fn dates_use_the_leading_ten_characters() {
        let expected = BoundValue::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(normalize_cell("2024-01-31", SemanticType::Date), expected);
        assert_eq!(normalize_cell("2024-01-31T08:00:00", SemanticType::Date), expected);
        assert_eq!(
            normalize_cell("01/31/2024", SemanticType::Date),
            BoundValue::Text("01/31/2024".to_string())
        );
    }

    #[test]
    fn timestamps_drop_zone_information() {
        assert_eq!(
            normalize_cell("2024-01-02T10:00:00Z", SemanticType::DateTime),
            ts("2024-01-02 10:00:00")
        );
        assert_eq!(
            normalize_cell("2024-01-02T10:00:00.250Z", SemanticType::DateTime),
            ts("2024-01-02 10:00:00.250")
        );
        assert_eq!(
            normalize_cell("2024-01-02 10:00:00+05:30", SemanticType::DateTime),
            ts("2024-01-02 10:00:00")
        );
        assert_eq!(
            normalize_cell("2024-01-02T10:00:00-0800", SemanticType::DateTime),
            ts("2024-01-02 10:00:00")
        );
        assert_eq!(
            normalize_cell("2024-01-01", SemanticType::DateTime),
            ts("2024-01-01 00:00:00")
        );
        assert_eq!(
            normalize_cell("yesterday", SemanticType::DateTime),
            BoundValue::Text("yesterday".to_string())
        );
    }

    #[test]
    fn bind_types_cover_every_semantic_type() {
        assert_eq!(BindType::from(SemanticType::Text), BindType::Varchar);
        assert_eq!(BindType::from(SemanticType::Unknown), BindType::Varchar);
        assert_eq!(BindType::from(SemanticType::IntegerOrDecimal), BindType::Number);
        assert_eq!(BindType::from(SemanticType::Date), BindType::Date);
        assert_eq!(BindType::from(SemanticType::DateTime), BindType::Timestamp);
    }

    fn locked() -> LockedSchema {
        let mut schema = TableSchema::new("CONTACTS", "SALES");
        let mut name = ColumnSpec::new("Name", "NAME");
        name.semantic_type = SemanticType::Text;
        let mut amount = ColumnSpec::new("Amount", "AMOUNT");
        amount.semantic_type = SemanticType::IntegerOrDecimal;
        schema.push_column(name).unwrap();
        schema.push_column(amount).unwrap();
        schema.lock().unwrap()
    }

    #[test]
    fn transformer_follows_locked_order() {
        let schema = locked();
        let source = MemorySource::from_table("t", &[&["Amount", "Name"], &["12", "Smith"]]);
        let transformer = RowTransformer::new(&schema, source.headers()).unwrap();
        let records = transformer
            .records(&source)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].row, 1);
        assert_eq!(
            records[0].values,
            vec![BoundValue::Text("Smith".to_string()), dec("12")]
        );
    }

    #[test]
    fn transformer_rejects_misaligned_rows_and_missing_headers() {
        let schema = locked();
        let headers = vec!["Name".to_string(), "Amount".to_string()];
        let transformer = RowTransformer::new(&schema, &headers).unwrap();
        let err = transformer
            .transform(3, &["only".to_string()])
            .expect_err("short row");
        assert!(matches!(err, IngestError::Alignment { row: 3, expected: 2, got: 1 }));

        let err = RowTransformer::new(&schema, &["Name".to_string()]).expect_err("missing");
        assert!(matches!(err, IngestError::Schema { .. }));
    }
}
