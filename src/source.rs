//! Row sources: the ordered header list plus a restartable sequence of rows.
//!
//! Discovery reads every row once to learn the schema, then the loader reads
//! them again to transform and insert. [`RowSource::rows`] therefore starts
//! from the first data row on every call.
//!
//! - [`CsvSource`]: delimited text on disk, decoded through `encoding_rs`.
//! - [`SalesforceSource`]: a [`CsvSource`] that drops all-blank rows, which
//!   CRM exports sometimes append.
//! - [`MemorySource`]: rows already in memory.

use std::{
    fmt,
    fs::File,
    io::{BufReader, Read},
    iter,
    path::{Path, PathBuf},
    str::FromStr,
};

use csv::ByteRecord;
use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const BOM: char = '\u{feff}';

pub type RowResult = Result<Vec<String>, IngestError>;
pub type Rows<'a> = Box<dyn Iterator<Item = RowResult> + 'a>;

pub trait RowSource {
    /// Short label for logs and error-log entries.
    fn describe(&self) -> String;

    fn headers(&self) -> &[String];

    /// Iterates data rows from the top of the source.
    fn rows(&self) -> Result<Rows<'_>, IngestError>;

    /// Releases any held resources. Sources that hold nothing between
    /// [`RowSource::rows`] calls need not override this.
    fn close(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFlavor {
    #[default]
    Generic,
    Salesforce,
}

impl SourceFlavor {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFlavor::Generic => "generic",
            SourceFlavor::Salesforce => "salesforce",
        }
    }
}

impl fmt::Display for SourceFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceFlavor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "generic" | "csv" => Ok(SourceFlavor::Generic),
            "salesforce" | "sf" => Ok(SourceFlavor::Salesforce),
            other => Err(format!("Unknown source flavor '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    /// `None` picks tab for `.tsv` files and comma otherwise.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding, IngestError> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| IngestError::malformed(format!("Unknown encoding '{value}'"))),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Opens the source matching `flavor`.
pub fn open_source(
    path: &Path,
    flavor: SourceFlavor,
    options: CsvOptions,
) -> Result<Box<dyn RowSource>, IngestError> {
    Ok(match flavor {
        SourceFlavor::Generic => Box::new(CsvSource::open(path, options)?),
        SourceFlavor::Salesforce => Box::new(SalesforceSource::open(path, options)?),
    })
}

#[derive(Debug)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
    encoding: &'static Encoding,
    headers: Vec<String>,
    skip_blank_lines: bool,
}

impl CsvSource {
    /// Opens `path` and reads its header row. An empty file is rejected with
    /// [`IngestError::MissingHeaders`].
    pub fn open(path: impl Into<PathBuf>, options: CsvOptions) -> Result<Self, IngestError> {
        let path = path.into();
        let delimiter = resolve_input_delimiter(&path, options.delimiter);
        let mut reader = open_csv_reader(&path, delimiter)?;
        let raw = reader
            .byte_headers()
            .map_err(|err| malformed_at(&path, &err))?
            .clone();
        if raw.is_empty() {
            return Err(IngestError::MissingHeaders);
        }
        let headers = decode_record(&raw, options.encoding)?
            .into_iter()
            .enumerate()
            .map(|(idx, header)| {
                let header = if idx == 0 {
                    header.trim_start_matches(BOM).to_string()
                } else {
                    header
                };
                header.trim().to_string()
            })
            .collect();
        Ok(Self {
            path,
            delimiter,
            encoding: options.encoding,
            headers,
            skip_blank_lines: false,
        })
    }

    /// By default an empty line between records is reported as a row with
    /// no fields.
    pub fn skip_blank_lines(mut self, skip: bool) -> Self {
        self.skip_blank_lines = skip;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

impl RowSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn rows(&self) -> Result<Rows<'_>, IngestError> {
        let mut reader = open_csv_reader(&self.path, self.delimiter)?;
        reader
            .byte_headers()
            .map_err(|err| malformed_at(&self.path, &err))?;
        let encoding = self.encoding;
        let path = self.path.as_path();
        let expected = self.headers.len();
        let strict = !self.skip_blank_lines;
        let mut line = reader.position().line();
        let mut row = 0usize;
        let mut finished = false;
        Ok(Box::new(iter::from_fn(move || {
            if finished {
                return None;
            }
            let mut record = ByteRecord::new();
            match reader.read_byte_record(&mut record) {
                Ok(false) => None,
                Err(err) => {
                    finished = true;
                    Some(Err(malformed_at(path, &err)))
                }
                Ok(true) => {
                    row += 1;
                    let now = reader.position().line();
                    let consumed = now.saturating_sub(line);
                    line = now;
                    if strict && skipped_lines(&record, consumed) > 0 {
                        finished = true;
                        return Some(Err(IngestError::Alignment {
                            row,
                            expected,
                            got: 0,
                        }));
                    }
                    Some(decode_record(&record, encoding))
                }
            }
        })))
    }
}

/// CSV reader for CRM exports. Rows whose cells are all blank are skipped.
#[derive(Debug)]
pub struct SalesforceSource {
    inner: CsvSource,
}

impl SalesforceSource {
    pub fn open(path: impl Into<PathBuf>, options: CsvOptions) -> Result<Self, IngestError> {
        Ok(Self {
            inner: CsvSource::open(path, options)?.skip_blank_lines(true),
        })
    }
}

impl RowSource for SalesforceSource {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn headers(&self) -> &[String] {
        self.inner.headers()
    }

    fn rows(&self) -> Result<Rows<'_>, IngestError> {
        let rows = self.inner.rows()?;
        Ok(Box::new(rows.filter(|row| match row {
            Ok(cells) => cells.iter().any(|cell| !cell.trim().is_empty()),
            Err(_) => true,
        })))
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MemorySource {
    pub fn new<H, S>(name: impl Into<String>, headers: H, rows: Vec<Vec<String>>) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// First row is the header.
    pub fn from_table(name: impl Into<String>, table: &[&[&str]]) -> Self {
        let mut iter = table
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>());
        let headers = iter.next().unwrap_or_default();
        Self {
            name: name.into(),
            headers,
            rows: iter.collect(),
        }
    }
}

impl RowSource for MemorySource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn rows(&self) -> Result<Rows<'_>, IngestError> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }
}

fn open_csv_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>, IngestError> {
    let file = File::open(path).map_err(|err| IngestError::io(path, err))?;
    let reader: Box<dyn Read> = Box::new(BufReader::new(file));
    let mut builder = csv::ReaderBuilder::new();
    // Field-count mismatches are reported by discovery with row numbers.
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_reader(reader))
}

// The csv reader drops empty lines silently. Every `\n` it consumes is a
// record terminator, a newline inside a quoted field, or an empty line, so
// whatever is left after the first two counts the empty lines in front of
// `record`.
fn skipped_lines(record: &ByteRecord, consumed: u64) -> u64 {
    let embedded = record
        .iter()
        .flat_map(|field| field.iter())
        .filter(|&&byte| byte == b'\n')
        .count() as u64;
    consumed.saturating_sub(embedded + 1)
}

fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Result<Vec<String>, IngestError> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String, IngestError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(IngestError::malformed(format!(
            "Failed to decode text with encoding {}",
            encoding.name()
        )))
    } else {
        Ok(text.into_owned())
    }
}

fn malformed_at(path: &Path, err: &csv::Error) -> IngestError {
    IngestError::malformed(format!("{}: {err}", path.display()))
}
