#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use csv_ingest::{
    config::PipelineConfig,
    remote::{BatchRowError, BatchTarget, RemoteCatalog, RemoteColumn, RemoteError},
    transform::{BindType, BoundRecord},
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` under the workspace's `inbound/` directory.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let dir = self.path().join("inbound");
        fs::create_dir_all(&dir).expect("create inbound dir");
        let path = dir.join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Default configuration with processed and error directories inside the
    /// workspace.
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            processed_dir: self.path().join("processed"),
            error_dir: self.path().join("error"),
            ..PipelineConfig::default()
        }
    }
}

/// In-memory database that records every call.
#[derive(Debug, Default)]
pub struct MockDatabase {
    pub tables: Vec<(String, String, Vec<RemoteColumn>)>,
    pub ddl: Vec<String>,
    pub inserted: Vec<BoundRecord>,
    pub statements: Vec<String>,
    pub input_sizes: Vec<(String, BindType)>,
    pub commits: usize,
    /// Rows (one-based source row numbers) the database rejects.
    pub reject_rows: Vec<usize>,
    /// DDL containing this text fails.
    pub fail_ddl_containing: Option<String>,
    pub fail_inserts: bool,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, schema: &str, table: &str, columns: Vec<RemoteColumn>) -> Self {
        self.tables
            .push((schema.to_string(), table.to_string(), columns));
        self
    }

    pub fn connection_calls(&self) -> usize {
        self.ddl.len() + self.statements.len() + self.commits
    }
}

pub fn varchar(name: &str, length: usize, position: usize) -> RemoteColumn {
    RemoteColumn {
        name: name.to_string(),
        data_type: "VARCHAR2".to_string(),
        char_length: Some(length),
        precision: None,
        scale: None,
        nullable: true,
        char_semantics: true,
        position,
    }
}

pub fn number(name: &str, precision: u32, scale: u32, position: usize) -> RemoteColumn {
    RemoteColumn {
        name: name.to_string(),
        data_type: "NUMBER".to_string(),
        char_length: None,
        precision: Some(precision),
        scale: Some(scale),
        nullable: true,
        char_semantics: false,
        position,
    }
}

impl RemoteCatalog for MockDatabase {
    fn table_exists(&mut self, schema: &str, table: &str) -> Result<bool, RemoteError> {
        Ok(self
            .tables
            .iter()
            .any(|(s, t, _)| s == schema && t == table))
    }

    fn table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<RemoteColumn>, RemoteError> {
        self.tables
            .iter()
            .find(|(s, t, _)| s == schema && t == table)
            .map(|(_, _, columns)| columns.clone())
            .ok_or_else(|| RemoteError::new("table or view does not exist").with_code("ORA-00942"))
    }

    fn execute_ddl(&mut self, statement: &str) -> Result<(), RemoteError> {
        if let Some(marker) = &self.fail_ddl_containing
            && statement.contains(marker.as_str())
        {
            return Err(RemoteError::new("ORA-01430: column being added already exists in table"));
        }
        self.ddl.push(statement.to_string());
        Ok(())
    }
}

impl BatchTarget for MockDatabase {
    fn insert_batch(
        &mut self,
        statement: &str,
        input_sizes: &[(String, BindType)],
        rows: &[BoundRecord],
    ) -> Result<Vec<BatchRowError>, RemoteError> {
        if self.fail_inserts {
            return Err(RemoteError::new("ORA-03113: end-of-file on communication channel"));
        }
        self.statements.push(statement.to_string());
        self.input_sizes = input_sizes.to_vec();
        let mut errors = Vec::new();
        for (offset, record) in rows.iter().enumerate() {
            if self.reject_rows.contains(&record.row) {
                errors.push(BatchRowError {
                    offset,
                    message: "ORA-12899: value too large for column".to_string(),
                });
            } else {
                self.inserted.push(record.clone());
            }
        }
        Ok(errors)
    }

    fn commit(&mut self) -> Result<(), RemoteError> {
        self.commits += 1;
        Ok(())
    }
}
