//! Batch loader.
//!
//! Records are sent to the [`BatchTarget`] in `batch_size` chunks using the
//! locked insert statement, then committed once. Rows the database rejects
//! do not stop the load; they are appended to [`BATCH_ERROR_LOG`] in the
//! error directory, one line per row:
//!
//! ```text
//! 2024-01-15T09:30:00 | source=contacts.csv | row_offset=42 | code=ORA-12899 | msg=value too large
//! ```

use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use chrono::Utc;
use itertools::Itertools;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::{
    config::PipelineConfig,
    error::IngestError,
    remote::{BatchRowError, BatchTarget},
    schema::LockedSchema,
    transform::BoundRecord,
};

pub const BATCH_ERROR_LOG: &str = "ingest_batch_errors.log";
const UNKNOWN_CODE: &str = "UNKNOWN";

static ERROR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,5}-[0-9]{3,5}\b").expect("valid error code regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_attempted: usize,
    pub batches: usize,
    pub error_count: usize,
    pub error_log: Option<PathBuf>,
    pub all_rows_failed: bool,
}

impl LoadReport {
    pub fn rows_loaded(&self) -> usize {
        self.rows_attempted.saturating_sub(self.error_count)
    }
}

/// Streams `records` into `target` and commits.
///
/// `source_name` labels error-log lines. A failing record (for example a
/// misaligned row) or a remote failure aborts the load before the commit.
pub fn load<I>(
    records: I,
    schema: &LockedSchema,
    target: &mut dyn BatchTarget,
    source_name: &str,
    config: &PipelineConfig,
) -> Result<LoadReport, IngestError>
where
    I: IntoIterator<Item = Result<BoundRecord, IngestError>>,
{
    let statement = schema.insert_statement();
    let input_sizes = schema.input_sizes();
    let log = BatchErrorLog::new(&config.error_dir);
    let mut report = LoadReport::default();

    let chunks = records.into_iter().chunks(config.batch_size.max(1));
    for chunk in &chunks {
        let batch = chunk.collect::<Result<Vec<_>, _>>()?;
        let base_offset = report.rows_attempted;
        let errors = target
            .insert_batch(statement, &input_sizes, &batch)
            .map_err(|err| err.into_ingest(Some(statement)))?;
        report.batches += 1;
        report.rows_attempted += batch.len();
        debug!(
            "Batch {} sent {} row(s) to {} ({} rejected)",
            report.batches,
            batch.len(),
            schema.qualified_name(),
            errors.len()
        );
        if !errors.is_empty() {
            warn!(
                "{} row(s) rejected in batch {} for {}",
                errors.len(),
                report.batches,
                source_name
            );
            let path = log.append(source_name, base_offset, &errors)?;
            report.error_count += errors.len();
            report.error_log = Some(path);
        }
    }

    target
        .commit()
        .map_err(|err| err.into_ingest(None))?;
    report.all_rows_failed = report.rows_attempted > 0 && report.error_count >= report.rows_attempted;
    info!(
        "Loaded {} of {} row(s) into {} in {} batch(es)",
        report.rows_loaded(),
        report.rows_attempted,
        schema.qualified_name(),
        report.batches
    );
    Ok(report)
}

/// Append-only log of rejected rows, shared across files and runs.
#[derive(Debug, Clone)]
pub struct BatchErrorLog {
    path: PathBuf,
}

impl BatchErrorLog {
    pub fn new(error_dir: &Path) -> Self {
        Self {
            path: error_dir.join(BATCH_ERROR_LOG),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one line per error. `base_offset` is the file-level offset of
    /// the batch's first row.
    pub fn append(
        &self,
        source_name: &str,
        base_offset: usize,
        errors: &[BatchRowError],
    ) -> Result<PathBuf, IngestError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|err| IngestError::io(dir, err))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| IngestError::io(&self.path, err))?;
        let mut writer = BufWriter::new(file);
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S");
        for error in errors {
            writeln!(
                writer,
                "{timestamp} | source={source_name} | row_offset={} | code={} | msg={}",
                base_offset + error.offset,
                error_code(&error.message),
                error.message.trim()
            )
            .map_err(|err| IngestError::io(&self.path, err))?;
        }
        writer
            .flush()
            .map_err(|err| IngestError::io(&self.path, err))?;
        Ok(self.path.clone())
    }
}

/// First database error code in `message`, e.g. `ORA-12899`.
pub fn error_code(message: &str) -> &str {
    ERROR_CODE
        .find(message)
        .map_or(UNKNOWN_CODE, |found| found.as_str())
}
