//! Per-file orchestration.
//!
//! - [`validate`]: discovery only.
//! - [`dry_run`]: discovery plus reconciliation that returns DDL without
//!   executing it.
//! - [`ingest`]: discovery, reconciliation, transform and load, then the
//!   file moves to the processed directory.
//!
//! Failures before the load quarantine the file (I/O failures excepted,
//! since the file may not be movable). Load failures are reported but leave
//! the file in place: some rows may already be committed.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Serialize;

use crate::{
    catalog::CatalogSnapshot,
    config::PipelineConfig,
    discovery::{Discovery, sniff},
    error::IngestError,
    files::{mark_processed, quarantine_file},
    load::{LoadReport, load},
    reconcile::{ReconciliationResult, reconcile},
    remote::{BatchTarget, RemoteCatalog},
    schema::LockedSchema,
    source::{CsvOptions, RowSource, SourceFlavor, open_source},
    transform::RowTransformer,
};

/// One file and the table it feeds. Names are raw and get sanitized.
#[derive(Debug, Clone)]
pub struct Job {
    pub path: PathBuf,
    pub table: String,
    pub schema: String,
    pub flavor: SourceFlavor,
    pub options: CsvOptions,
}

impl Job {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
            schema: schema.into(),
            flavor: SourceFlavor::default(),
            options: CsvOptions::default(),
        }
    }

    pub fn with_flavor(mut self, flavor: SourceFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }

    fn open(&self) -> Result<Box<dyn RowSource>, IngestError> {
        open_source(&self.path, self.flavor, self.options)
    }
}

/// What `dry-run` reports: the plan and the schema it would lock.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub rows_scanned: usize,
    pub reconciliation: ReconciliationResult,
    pub schema: LockedSchema,
}

#[derive(Debug)]
pub struct PipelineResult {
    pub source: PathBuf,
    pub dry_run: bool,
    pub quarantined: bool,
    pub final_path: Option<PathBuf>,
    pub reconciliation: Option<ReconciliationResult>,
    pub load: Option<LoadReport>,
    pub error: Option<IngestError>,
}

impl PipelineResult {
    fn new(source: &Path, dry_run: bool) -> Self {
        Self {
            source: source.to_path_buf(),
            dry_run,
            quarantined: false,
            final_path: None,
            reconciliation: None,
            load: None,
            error: None,
        }
    }

    pub fn success(&self) -> bool {
        !self.quarantined && self.error.is_none()
    }
}

pub fn validate(job: &Job, config: &PipelineConfig) -> Result<Discovery, IngestError> {
    let mut source = job.open()?;
    let discovery = sniff(source.as_ref(), &job.table, &job.schema, &config.naming_rules());
    source.close();
    discovery
}

/// Reconciles in dry-run mode. Without a catalog the table is treated as
/// absent, so the plan is a CREATE.
pub fn dry_run(
    job: &Job,
    catalog: Option<&mut dyn RemoteCatalog>,
    config: &PipelineConfig,
) -> Result<Preview, IngestError> {
    let Discovery {
        schema,
        rows_scanned,
    } = validate(job, config)?;
    let mut empty = CatalogSnapshot::default();
    let remote: &mut dyn RemoteCatalog = match catalog {
        Some(catalog) => catalog,
        None => &mut empty,
    };
    let (schema, reconciliation) = reconcile(schema, remote, config, true)?;
    Ok(Preview {
        rows_scanned,
        reconciliation,
        schema,
    })
}

/// Runs one file end to end over a single database connection. Never
/// returns `Err`: every outcome, including quarantine, is described by the
/// returned [`PipelineResult`].
pub fn ingest<D>(job: &Job, db: &mut D, config: &PipelineConfig) -> PipelineResult
where
    D: RemoteCatalog + BatchTarget,
{
    let mut result = PipelineResult::new(&job.path, config.dry_run);

    let mut source = match job.open() {
        Ok(source) => source,
        Err(err) => return quarantine(result, err, config),
    };

    let locked = match schema_phase(source.as_ref(), job, db, config) {
        Ok((locked, reconciliation)) => {
            result.reconciliation = Some(reconciliation);
            locked
        }
        Err(err) => {
            source.close();
            return quarantine(result, err, config);
        }
    };
    if config.dry_run {
        info!("Dry run: skipping load for {}", job.path.display());
        source.close();
        return result;
    }

    let source_name = job
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.describe());
    let loaded = RowTransformer::new(&locked, source.headers()).and_then(|transformer| {
        let records = transformer.records(source.as_ref())?;
        load(records, &locked, db, &source_name, config)
    });
    source.close();

    match loaded {
        Ok(report) => {
            if report.all_rows_failed {
                warn!(
                    "All {} row(s) failed for {}; see {:?}",
                    report.rows_attempted, source_name, report.error_log
                );
            } else if report.error_count > 0 {
                warn!(
                    "{} row error(s) for {}; see {:?}",
                    report.error_count, source_name, report.error_log
                );
            }
            result.load = Some(report);
        }
        Err(err) => {
            error!("Load failed for {source_name}: {err}");
            result.error = Some(err);
            return result;
        }
    }

    match mark_processed(&job.path, &config.processed_dir) {
        Ok(dest) => result.final_path = Some(dest),
        Err(err) => warn!("Could not move {} to processed: {err}", job.path.display()),
    }
    result
}

fn schema_phase(
    source: &dyn RowSource,
    job: &Job,
    remote: &mut dyn RemoteCatalog,
    config: &PipelineConfig,
) -> Result<(LockedSchema, ReconciliationResult), IngestError> {
    let discovery = sniff(source, &job.table, &job.schema, &config.naming_rules())?;
    reconcile(discovery.schema, remote, config, config.dry_run)
}

fn quarantine(mut result: PipelineResult, err: IngestError, config: &PipelineConfig) -> PipelineResult {
    if err.is_quarantine() {
        match quarantine_file(&result.source, &config.error_dir, &err.to_string()) {
            Ok(dest) => {
                result.quarantined = true;
                result.final_path = Some(dest);
            }
            Err(move_err) => error!(
                "Could not quarantine {}: {move_err}",
                result.source.display()
            ),
        }
    } else {
        error!("{} failed: {err}", result.source.display());
    }
    result.error = Some(err);
    result
}
