//! Schema model: per-column knowledge and the table it belongs to.
//!
//! A [`TableSchema`] is the mutable builder used while a file is being
//! scanned and reconciled. Its column order is the order headers were read
//! and is never rearranged. It caches the parameterized insert statement
//! derived from that order; any mutable access to the columns drops the
//! cache.
//!
//! [`TableSchema::lock`] consumes the builder, regenerates the statement
//! exactly once, and returns a [`LockedSchema`]: a read-only view that the
//! row transformer and loader work from for the rest of the file.

use serde::Serialize;

use crate::{
    error::IngestError,
    infer::{SemanticType, TypeDecision},
    transform::BindType,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    /// Header text exactly as read; the lookup key into each row.
    pub source_key: String,
    /// Sanitized identifier derived from `source_key`.
    pub candidate_name: String,
    /// Identifier confirmed against (or to be created in) the remote table.
    /// Only trustworthy after reconciliation.
    pub resolved_name: String,
    pub semantic_type: SemanticType,
    /// Longest value seen, in characters.
    pub observed_max_length: usize,
    /// Longest value seen, in UTF-8 bytes.
    pub observed_max_byte_length: usize,
    pub numeric_precision: Option<u32>,
    pub numeric_scale: Option<u32>,
    pub nullable: bool,
    pub is_new: bool,
}

impl ColumnSpec {
    pub fn new(source_key: impl Into<String>, candidate_name: impl Into<String>) -> Self {
        let candidate_name = candidate_name.into();
        Self {
            source_key: source_key.into(),
            resolved_name: candidate_name.clone(),
            candidate_name,
            semantic_type: SemanticType::Unknown,
            observed_max_length: 0,
            observed_max_byte_length: 0,
            numeric_precision: None,
            numeric_scale: None,
            nullable: true,
            is_new: true,
        }
    }

    /// Folds one cell's size into the running maxima and returns its
    /// character length.
    pub fn observe_size(&mut self, value: &str) -> usize {
        let chars = value.chars().count();
        self.observed_max_length = self.observed_max_length.max(chars);
        self.observed_max_byte_length = self.observed_max_byte_length.max(value.len());
        chars
    }

    pub fn apply_decision(&mut self, decision: TypeDecision) {
        self.semantic_type = decision.semantic_type;
        self.numeric_precision = decision.precision;
        self.numeric_scale = decision.scale;
    }

    pub fn bind_name(&self) -> String {
        format!(":{}", self.resolved_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum InsertStatement {
    #[default]
    Unbuilt,
    Built(String),
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    table_name: String,
    schema_name: String,
    columns: Vec<ColumnSpec>,
    insert: InsertStatement,
}

impl TableSchema {
    /// Both names must already be sanitized.
    pub fn new(table_name: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            schema_name: schema_name.into(),
            columns: Vec::new(),
            insert: InsertStatement::Unbuilt,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.schema_name, &self.table_name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, source_key: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.source_key == source_key)
    }

    pub fn column_mut(&mut self, source_key: &str) -> Option<&mut ColumnSpec> {
        self.invalidate_insert_statement();
        self.columns.iter_mut().find(|c| c.source_key == source_key)
    }

    pub fn columns_mut(&mut self) -> &mut [ColumnSpec] {
        self.invalidate_insert_statement();
        &mut self.columns
    }

    pub fn push_column(&mut self, column: ColumnSpec) -> Result<(), IngestError> {
        if self.column(&column.source_key).is_some() {
            return Err(IngestError::DuplicateHeader {
                header: column.source_key,
            });
        }
        self.invalidate_insert_statement();
        self.columns.push(column);
        Ok(())
    }

    pub fn invalidate_insert_statement(&mut self) {
        self.insert = InsertStatement::Unbuilt;
    }

    pub fn is_insert_statement_cached(&self) -> bool {
        matches!(self.insert, InsertStatement::Built(_))
    }

    /// Named-bind insert statement for the current columns, built on first
    /// use and cached until the columns are touched again.
    pub fn insert_statement(&mut self) -> Result<&str, IngestError> {
        if self.insert == InsertStatement::Unbuilt {
            let sql = render_insert(&self.qualified_name(), &self.columns)?;
            self.insert = InsertStatement::Built(sql);
        }
        match &self.insert {
            InsertStatement::Built(sql) => Ok(sql),
            InsertStatement::Unbuilt => Err(IngestError::schema("insert statement was not built")),
        }
    }

    /// Freezes the column list. The insert statement is regenerated here
    /// and nowhere else for the rest of the file.
    pub fn lock(mut self) -> Result<LockedSchema, IngestError> {
        self.invalidate_insert_statement();
        let insert_statement = render_insert(&self.qualified_name(), &self.columns)?;
        Ok(LockedSchema {
            table_name: self.table_name,
            schema_name: self.schema_name,
            columns: self.columns,
            insert_statement,
        })
    }
}

/// Column order and names frozen after reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct LockedSchema {
    table_name: String,
    schema_name: String,
    columns: Vec<ColumnSpec>,
    insert_statement: String,
}

/// One named bind in insert order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindSpec {
    pub name: String,
    pub semantic_type: SemanticType,
}

impl LockedSchema {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.schema_name, &self.table_name)
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, source_key: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.source_key == source_key)
    }

    pub fn insert_statement(&self) -> &str {
        &self.insert_statement
    }

    pub fn binds(&self) -> Vec<BindSpec> {
        self.columns
            .iter()
            .map(|column| BindSpec {
                name: column.resolved_name.clone(),
                semantic_type: column.semantic_type,
            })
            .collect()
    }

    /// Bind type per named bind, in insert order.
    pub fn input_sizes(&self) -> Vec<(String, BindType)> {
        self.columns
            .iter()
            .map(|column| (column.resolved_name.clone(), column.semantic_type.into()))
            .collect()
    }

    pub fn resolved_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.resolved_name.as_str())
            .collect()
    }
}

pub(crate) fn qualify(schema_name: &str, table_name: &str) -> String {
    format!("{schema_name}.{table_name}")
}

fn render_insert(qualified_name: &str, columns: &[ColumnSpec]) -> Result<String, IngestError> {
    if columns.is_empty() {
        return Err(IngestError::schema(format!(
            "Cannot build an insert statement for {qualified_name}: no columns defined"
        )));
    }
    let names = columns
        .iter()
        .map(|c| c.resolved_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let binds = columns
        .iter()
        .map(ColumnSpec::bind_name)
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "INSERT INTO {qualified_name} ({names})\nVALUES ({binds})"
    ))
}
