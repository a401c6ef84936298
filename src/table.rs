//! Plain-text tables for CLI reports.

use std::fmt::Write as _;

use crate::{config::PipelineConfig, ddl, schema::ColumnSpec};

const COLUMN_HEADERS: [&str; 8] = [
    "#", "header", "column", "type", "declared", "max_chars", "max_bytes", "new",
];

/// Renders one line per column: the inferred type, the declared type the
/// DDL generator would emit, and the observed sizes.
pub fn render_columns(columns: &[ColumnSpec], config: &PipelineConfig) -> String {
    let headers = COLUMN_HEADERS.map(str::to_string);
    let rows = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let declared = ddl::type_clause(column, config).unwrap_or_else(|err| format!("<{err}>"));
            vec![
                (idx + 1).to_string(),
                column.source_key.clone(),
                column.resolved_name.clone(),
                column.semantic_type.to_string(),
                declared,
                column.observed_max_length.to_string(),
                column.observed_max_byte_length.to_string(),
                if column.is_new { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat((*w).max(1))).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = flatten(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

// Headers can carry embedded line breaks; keep each row on one line.
fn flatten(value: &str) -> String {
    value
        .chars()
        .map(|ch| if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::SemanticType;

    #[test]
    fn table_pads_columns_and_trims_lines() {
        let headers = vec!["a".to_string(), "long header".to_string()];
        let rows = vec![vec!["value".to_string(), "x".to_string()]];
        let rendered = render_table(&headers, &rows);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "a      long header");
        assert_eq!(lines[1], "-----  -----------");
        assert_eq!(lines[2], "value  x");
    }

    #[test]
    fn column_report_shows_declared_types() {
        let mut notes = ColumnSpec::new("Notes\n(free text)", "NOTES");
        notes.semantic_type = SemanticType::Text;
        notes.observed_max_length = 10;
        notes.observed_max_byte_length = 12;
        let unresolved = ColumnSpec::new("Mystery", "MYSTERY");
        let rendered = render_columns(&[notes, unresolved], &PipelineConfig::default());
        assert!(rendered.contains("Notes (free text)"));
        assert!(rendered.contains("VARCHAR2(60 CHAR)"));
        assert!(rendered.contains("<Schema error"));
        assert_eq!(rendered.lines().count(), 4);
    }
}
