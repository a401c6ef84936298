//! Offline stand-in for the remote catalog.
//!
//! A snapshot lists existing tables and their columns in YAML:
//!
//! ```yaml
//! tables:
//!   - schema: SALES
//!     name: CONTACTS
//!     columns:
//!       - name: NOTES
//!         data_type: VARCHAR2
//!         char_length: 100
//! ```
//!
//! `dry-run` reconciles against it to preview SYNC plans without a
//! database. DDL sent to a snapshot is recorded, not applied.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::remote::{RemoteCatalog, RemoteColumn, RemoteError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub tables: Vec<CatalogTable>,
    #[serde(skip)]
    executed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTable {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<RemoteColumn>,
}

impl CatalogSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening catalog file {path:?}"))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing catalog file {path:?}"))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Parsing catalog snapshot")
    }

    pub fn with_table(mut self, schema: &str, name: &str, columns: Vec<RemoteColumn>) -> Self {
        self.tables.push(CatalogTable {
            schema: schema.to_string(),
            name: name.to_string(),
            columns,
        });
        self
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<&CatalogTable> {
        self.tables
            .iter()
            .find(|t| t.schema.eq_ignore_ascii_case(schema) && t.name.eq_ignore_ascii_case(name))
    }

    /// Statements received through [`RemoteCatalog::execute_ddl`].
    pub fn executed(&self) -> &[String] {
        &self.executed
    }
}

impl RemoteCatalog for CatalogSnapshot {
    fn table_exists(&mut self, schema: &str, table: &str) -> Result<bool, RemoteError> {
        Ok(self.table(schema, table).is_some())
    }

    fn table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<RemoteColumn>, RemoteError> {
        let found = self.table(schema, table).ok_or_else(|| {
            RemoteError::new(format!("table or view {schema}.{table} does not exist"))
                .with_code("ORA-00942")
        })?;
        let mut columns = found.columns.clone();
        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }

    fn execute_ddl(&mut self, statement: &str) -> Result<(), RemoteError> {
        self.executed.push(statement.to_string());
        Ok(())
    }
}
