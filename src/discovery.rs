//! Local discovery: one full pass over a source before any remote contact.
//!
//! Headers become [`ColumnSpec`]s in file order. Every data row is checked
//! for alignment and every cell for the text-width ceiling, and every cell
//! votes in its column's [`Consensus`]. Types are written onto the columns
//! only once the whole file has been read.

use log::{debug, info};

use crate::{
    config::{MAX_TEXT_WIDTH, NamingRules},
    error::IngestError,
    infer::Consensus,
    sanitize::{UniqueNames, sanitize},
    schema::{ColumnSpec, TableSchema},
    source::RowSource,
};

#[derive(Debug)]
pub struct Discovery {
    pub schema: TableSchema,
    pub rows_scanned: usize,
}

/// Scans `source` end to end and returns the inferred, unreconciled schema.
///
/// Fails on the first structural problem or oversized cell; nothing is
/// inferred for a file that fails.
pub fn sniff(
    source: &dyn RowSource,
    table: &str,
    schema_name: &str,
    rules: &NamingRules,
) -> Result<Discovery, IngestError> {
    let mut schema = TableSchema::new(sanitize(table, rules)?, sanitize(schema_name, rules)?);
    let headers = source.headers();
    ingest_headers(&mut schema, headers, rules)?;

    let expected = headers.len();
    let mut votes: Vec<Consensus> = vec![Consensus::default(); expected];
    let mut rows_scanned = 0usize;

    for (idx, row) in source.rows()?.enumerate() {
        let row = row?;
        let row_number = idx + 1;
        if row.len() != expected {
            return Err(IngestError::Alignment {
                row: row_number,
                expected,
                got: row.len(),
            });
        }
        for ((column, consensus), cell) in schema.columns_mut().iter_mut().zip(&mut votes).zip(&row) {
            let length = column.observe_size(cell);
            if length > MAX_TEXT_WIDTH {
                return Err(IngestError::SizeBreach {
                    column: column.candidate_name.clone(),
                    observed_length: length,
                    limit: MAX_TEXT_WIDTH,
                });
            }
            consensus.observe(cell);
        }
        rows_scanned = row_number;
    }

    for (column, consensus) in schema.columns_mut().iter_mut().zip(&votes) {
        let decision = consensus.decide();
        debug!(
            "Column '{}' -> {} ({} vote(s), max length {}, precision {:?}, scale {:?})",
            column.source_key,
            decision.semantic_type,
            consensus.votes(),
            column.observed_max_length,
            decision.precision,
            decision.scale
        );
        column.apply_decision(decision);
    }

    info!(
        "Scanned {} row(s) across {} column(s) from {} for {}",
        rows_scanned,
        schema.len(),
        source.describe(),
        schema.qualified_name()
    );
    Ok(Discovery {
        schema,
        rows_scanned,
    })
}

fn ingest_headers(
    schema: &mut TableSchema,
    headers: &[String],
    rules: &NamingRules,
) -> Result<(), IngestError> {
    if headers.is_empty() {
        return Err(IngestError::MissingHeaders);
    }
    if let Some(position) = headers.iter().position(|h| h.trim().is_empty()) {
        return Err(IngestError::BlankHeader {
            position: position + 1,
        });
    }
    let mut names = UniqueNames::new(rules);
    for header in headers {
        if schema.column(header).is_some() {
            return Err(IngestError::DuplicateHeader {
                header: header.clone(),
            });
        }
        let candidate = names.assign(header)?;
        schema.push_column(ColumnSpec::new(header.clone(), candidate))?;
    }
    Ok(())
}
