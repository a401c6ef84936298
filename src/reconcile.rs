//! Schema reconciliation against the remote table.
//!
//! Two outcomes:
//!
//! - **Create**: the table does not exist. Every column is new and one
//!   `CREATE TABLE` covers them all.
//! - **Sync**: the table exists. Columns are matched by name
//!   (case-insensitively). Unmatched columns are added in a single
//!   `ALTER TABLE .. ADD`; matched text columns declared narrower than the
//!   longest observed value are widened one statement per column.
//!
//! Statements run in emission order and stop at the first failure, so a
//! failed create/add never leaves widen statements half applied. In dry-run
//! mode the same statements are returned but never sent. Either way the
//! schema is locked at the end: column names and order are fixed for the
//! rest of the file.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::PipelineConfig,
    ddl,
    error::IngestError,
    infer::SemanticType,
    remote::{RemoteCatalog, RemoteColumn},
    schema::{LockedSchema, TableSchema},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scenario {
    Create,
    Sync,
}

impl Scenario {
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Create => "CREATE",
            Scenario::Sync => "SYNC",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub scenario: Scenario,
    /// DDL in execution order: create or add first, then widen.
    pub statements: Vec<String>,
    pub added: Vec<String>,
    pub widened: Vec<String>,
    pub dry_run: bool,
}

impl ReconciliationResult {
    pub fn is_noop(&self) -> bool {
        self.statements.is_empty()
    }
}

pub fn reconcile(
    mut schema: TableSchema,
    remote: &mut dyn RemoteCatalog,
    config: &PipelineConfig,
    dry_run: bool,
) -> Result<(LockedSchema, ReconciliationResult), IngestError> {
    let exists = remote
        .table_exists(schema.schema_name(), schema.table_name())
        .map_err(|err| err.into_ingest(None))?;

    let result = if exists {
        let columns = remote
            .table_columns(schema.schema_name(), schema.table_name())
            .map_err(|err| err.into_ingest(None))?;
        plan_sync(&mut schema, &columns, config, dry_run)?
    } else {
        plan_create(&mut schema, config, dry_run)?
    };

    info!(
        "Reconciled {} as {} ({} statement(s), {} added, {} widened{})",
        schema.qualified_name(),
        result.scenario.as_str(),
        result.statements.len(),
        result.added.len(),
        result.widened.len(),
        if dry_run { ", dry run" } else { "" }
    );
    for statement in &result.statements {
        info!("DDL: {statement}");
        if !dry_run {
            remote
                .execute_ddl(statement)
                .map_err(|err| err.into_ingest(Some(statement)))?;
        }
    }

    Ok((schema.lock()?, result))
}

fn plan_create(
    schema: &mut TableSchema,
    config: &PipelineConfig,
    dry_run: bool,
) -> Result<ReconciliationResult, IngestError> {
    for column in schema.columns_mut() {
        column.resolved_name = column.candidate_name.clone();
        column.is_new = true;
    }
    let statement = ddl::create_table(schema, config)?;
    Ok(ReconciliationResult {
        scenario: Scenario::Create,
        statements: vec![statement],
        added: schema
            .columns()
            .iter()
            .map(|c| c.resolved_name.clone())
            .collect(),
        widened: Vec::new(),
        dry_run,
    })
}

fn plan_sync(
    schema: &mut TableSchema,
    remote_columns: &[RemoteColumn],
    config: &PipelineConfig,
    dry_run: bool,
) -> Result<ReconciliationResult, IngestError> {
    let by_name: HashMap<String, &RemoteColumn> = remote_columns
        .iter()
        .map(|column| (column.name.to_uppercase(), column))
        .collect();

    let mut pending_add = Vec::new();
    let mut pending_widen = Vec::new();
    for (idx, column) in schema.columns_mut().iter_mut().enumerate() {
        let Some(existing) = by_name.get(&column.candidate_name.to_uppercase()) else {
            column.resolved_name = column.candidate_name.clone();
            column.is_new = true;
            pending_add.push(idx);
            continue;
        };
        column.resolved_name = existing.name.clone();
        column.is_new = false;
        column.nullable = existing.nullable;

        if existing.is_text() {
            if column.semantic_type != SemanticType::Text {
                debug!(
                    "Column {} is {} remotely; binding {} values as text",
                    column.resolved_name, existing.data_type, column.semantic_type
                );
                column.semantic_type = SemanticType::Text;
                column.numeric_precision = None;
                column.numeric_scale = None;
            }
            if existing.needs_widening(column.observed_max_length) {
                pending_widen.push(idx);
            } else if existing.is_narrower_than(column.observed_max_length) {
                warn!(
                    "Column {} is {}({}) remotely and holds values of {} characters; not widened",
                    column.resolved_name,
                    existing.data_type,
                    existing.char_length.unwrap_or(0),
                    column.observed_max_length
                );
            }
        } else if column.semantic_type == SemanticType::Text && column.observed_max_length > 0 {
            warn!(
                "Column {} is {} remotely but holds text values; rows may be rejected",
                column.resolved_name, existing.data_type
            );
        }
    }

    let mut statements = Vec::with_capacity(pending_widen.len() + 1);
    let columns = schema.columns();
    if !pending_add.is_empty() {
        let new_columns: Vec<_> = pending_add.iter().map(|&idx| &columns[idx]).collect();
        statements.push(ddl::add_columns(schema, &new_columns, config)?);
    }
    for &idx in &pending_widen {
        statements.push(ddl::widen_column(schema, &columns[idx], config)?);
    }

    Ok(ReconciliationResult {
        scenario: Scenario::Sync,
        statements,
        added: pending_add
            .iter()
            .map(|&idx| columns[idx].resolved_name.clone())
            .collect(),
        widened: pending_widen
            .iter()
            .map(|&idx| columns[idx].resolved_name.clone())
            .collect(),
        dry_run,
    })
}
