//! Error taxonomy for the schema engine.
//!
//! Every variant aborts the current file only. [`IngestError::kind`] lets a
//! reporting layer tell "quarantine the file" apart from "alert an operator
//! about a DDL failure" without matching on message text.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Row {row} has {got} fields, expected {expected}")]
    Alignment {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("Input has no header row")]
    MissingHeaders,
    #[error("Header at position {position} is blank")]
    BlankHeader { position: usize },
    #[error("Header '{header}' appears more than once")]
    DuplicateHeader { header: String },
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },
    #[error(
        "Column '{column}' holds a value of {observed_length} characters, above the limit of {limit}"
    )]
    SizeBreach {
        column: String,
        observed_length: usize,
        limit: usize,
    },
    #[error("Schema error: {message}")]
    Schema { message: String },
    #[error("Invalid identifier {raw:?}: {reason}")]
    InvalidIdentifier { raw: String, reason: String },
    #[error("Remote failure: {message}{}", statement_suffix(.statement))]
    Remote {
        message: String,
        statement: Option<String>,
    },
    #[error("I/O failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Structural,
    SizeBreach,
    Schema,
    InvalidIdentifier,
    Remote,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Structural => "structural",
            ErrorKind::SizeBreach => "size-breach",
            ErrorKind::Schema => "schema",
            ErrorKind::InvalidIdentifier => "invalid-identifier",
            ErrorKind::Remote => "remote",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn statement_suffix(statement: &Option<String>) -> String {
    statement
        .as_deref()
        .map(|sql| format!(" | statement={sql}"))
        .unwrap_or_default()
}

impl IngestError {
    pub fn schema(message: impl Into<String>) -> Self {
        IngestError::Schema {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        IngestError::MalformedInput {
            message: message.into(),
        }
    }

    pub fn invalid_identifier(raw: &str, reason: impl Into<String>) -> Self {
        IngestError::InvalidIdentifier {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Alignment { .. }
            | IngestError::MissingHeaders
            | IngestError::BlankHeader { .. }
            | IngestError::DuplicateHeader { .. }
            | IngestError::MalformedInput { .. } => ErrorKind::Structural,
            IngestError::SizeBreach { .. } => ErrorKind::SizeBreach,
            IngestError::Schema { .. } => ErrorKind::Schema,
            IngestError::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            IngestError::Remote { .. } => ErrorKind::Remote,
            IngestError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Whether the source file should be moved to the error directory.
    pub fn is_quarantine(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_message_carries_context() {
        let err = IngestError::Alignment {
            row: 4,
            expected: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "Row 4 has 2 fields, expected 3");
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(err.is_quarantine());
    }

    #[test]
    fn remote_message_includes_statement_when_present() {
        let err = IngestError::Remote {
            message: "ORA-01430: column being added already exists".to_string(),
            statement: Some("ALTER TABLE S.T ADD (A NUMBER NULL)".to_string()),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("ORA-01430"));
        assert!(rendered.contains("statement=ALTER TABLE S.T"));

        let bare = IngestError::Remote {
            message: "connection reset".to_string(),
            statement: None,
        };
        assert_eq!(bare.to_string(), "Remote failure: connection reset");
    }

    #[test]
    fn io_errors_do_not_quarantine() {
        let err = IngestError::io(
            "missing.csv",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!err.is_quarantine());
    }
}
