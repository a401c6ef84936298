//! Contracts for the database side of the pipeline.
//!
//! The engine never opens a connection itself. Callers hand it a
//! [`RemoteCatalog`] for metadata queries and DDL, and a [`BatchTarget`] for
//! inserts. [`crate::catalog::CatalogSnapshot`] implements the former
//! offline for previews.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::IngestError,
    transform::{BindType, BoundRecord},
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    /// Database error code such as `ORA-00904`, when the driver reports one.
    pub code: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Wraps the failure for the caller, naming the statement that failed.
    pub fn into_ingest(self, statement: Option<&str>) -> IngestError {
        let message = match self.code {
            Some(code) if !self.message.contains(&code) => format!("{code}: {}", self.message),
            _ => self.message,
        };
        IngestError::Remote {
            message,
            statement: statement.map(str::to_string),
        }
    }
}

/// One row of the remote column listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteColumn {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub char_length: Option<usize>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Length is declared in characters rather than bytes.
    #[serde(default = "default_char_semantics")]
    pub char_semantics: bool,
    #[serde(default)]
    pub position: usize,
}

fn default_nullable() -> bool {
    true
}

fn default_char_semantics() -> bool {
    true
}

impl RemoteColumn {
    pub fn is_text(&self) -> bool {
        matches!(
            self.data_type.trim().to_ascii_uppercase().as_str(),
            "VARCHAR2" | "NVARCHAR2"
        )
    }

    /// Declared width in characters is below `observed`.
    pub fn is_narrower_than(&self, observed: usize) -> bool {
        self.is_text() && self.char_length.unwrap_or(0) < observed
    }

    /// Whether the column can be widened to `observed` characters with a
    /// `VARCHAR2(n CHAR)` modify. Other text types are left alone so the
    /// column keeps its type.
    pub fn needs_widening(&self, observed: usize) -> bool {
        self.data_type.trim().eq_ignore_ascii_case("VARCHAR2")
            && self.char_semantics
            && self.is_narrower_than(observed)
    }
}

pub trait RemoteCatalog {
    fn table_exists(&mut self, schema: &str, table: &str) -> Result<bool, RemoteError>;

    /// Columns of `schema.table`, ordered by position.
    fn table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<RemoteColumn>, RemoteError>;

    fn execute_ddl(&mut self, statement: &str) -> Result<(), RemoteError>;
}

/// A row the database rejected inside an otherwise accepted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRowError {
    /// Zero-based position of the row within the batch.
    pub offset: usize,
    pub message: String,
}

pub trait BatchTarget {
    /// Inserts `rows` with `statement`, binding values in `input_sizes`
    /// order. Rows the database rejects are reported back instead of failing
    /// the whole batch.
    fn insert_batch(
        &mut self,
        statement: &str,
        input_sizes: &[(String, BindType)],
        rows: &[BoundRecord],
    ) -> Result<Vec<BatchRowError>, RemoteError>;

    fn commit(&mut self) -> Result<(), RemoteError>;
}
