//! DDL text for the target dialect.
//!
//! Pure string building: nothing here touches the database, so the same
//! statements serve both execution and dry-run previews.
//!
//! | Semantic type        | Column type            |
//! |----------------------|------------------------|
//! | `Text`               | `VARCHAR2(n CHAR)`     |
//! | `IntegerOrDecimal`   | `NUMBER(p, s)` / `NUMBER(p)` / `NUMBER` |
//! | `Date`               | `DATE`                 |
//! | `DateTime`           | `TIMESTAMP`            |
//!
//! Text widths follow [`PipelineConfig::text_width`]; a column whose type
//! was never resolved is refused.

use itertools::Itertools;

use crate::{
    config::{MAX_NUMERIC_PRECISION, PipelineConfig},
    error::IngestError,
    infer::SemanticType,
    schema::{ColumnSpec, TableSchema},
};

pub fn column_definition(
    column: &ColumnSpec,
    config: &PipelineConfig,
) -> Result<String, IngestError> {
    let nullability = if column.nullable { "NULL" } else { "NOT NULL" };
    Ok(format!(
        "{} {} {nullability}",
        column.resolved_name,
        type_clause(column, config)?
    ))
}

pub fn type_clause(column: &ColumnSpec, config: &PipelineConfig) -> Result<String, IngestError> {
    match column.semantic_type {
        SemanticType::Text => text_clause(column, config),
        SemanticType::IntegerOrDecimal => Ok(number_clause(column.numeric_precision, column.numeric_scale)),
        SemanticType::Date => Ok("DATE".to_string()),
        SemanticType::DateTime => Ok("TIMESTAMP".to_string()),
        SemanticType::Unknown => Err(IngestError::schema(format!(
            "Cannot generate DDL for column '{}': type was never resolved",
            column.resolved_name
        ))),
    }
}

fn text_clause(column: &ColumnSpec, config: &PipelineConfig) -> Result<String, IngestError> {
    let width = config.text_width(&column.resolved_name, column.observed_max_length)?;
    Ok(format!("VARCHAR2({width} CHAR)"))
}

fn number_clause(precision: Option<u32>, scale: Option<u32>) -> String {
    match (precision, scale) {
        (Some(p), _) if p > MAX_NUMERIC_PRECISION => "NUMBER".to_string(),
        (Some(p), Some(s)) => format!("NUMBER({p}, {s})"),
        (Some(p), None) => format!("NUMBER({p})"),
        (None, _) => "NUMBER".to_string(),
    }
}

pub fn create_table(schema: &TableSchema, config: &PipelineConfig) -> Result<String, IngestError> {
    if schema.is_empty() {
        return Err(IngestError::schema(format!(
            "Cannot generate CREATE TABLE for {}: no columns defined",
            schema.qualified_name()
        )));
    }
    let definitions = schema
        .columns()
        .iter()
        .map(|column| column_definition(column, config).map(|def| format!("    {def}")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(
        "CREATE TABLE {} (\n{}\n)",
        schema.qualified_name(),
        definitions.join(",\n")
    ))
}

/// One statement covering every column in `new_columns`.
pub fn add_columns(
    schema: &TableSchema,
    new_columns: &[&ColumnSpec],
    config: &PipelineConfig,
) -> Result<String, IngestError> {
    if new_columns.is_empty() {
        return Err(IngestError::schema(format!(
            "No new columns to add to {}",
            schema.qualified_name()
        )));
    }
    let definitions: Vec<String> = new_columns
        .iter()
        .map(|column| column_definition(column, config))
        .try_collect()?;
    Ok(format!(
        "ALTER TABLE {} ADD ({})",
        schema.qualified_name(),
        definitions.join(", ")
    ))
}

/// Resizes one text column. Numeric and date columns are never widened
/// automatically.
pub fn widen_column(
    schema: &TableSchema,
    column: &ColumnSpec,
    config: &PipelineConfig,
) -> Result<String, IngestError> {
    if column.semantic_type != SemanticType::Text {
        return Err(IngestError::schema(format!(
            "Cannot widen column '{}' of type {}: only text columns are resized",
            column.resolved_name, column.semantic_type
        )));
    }
    Ok(format!(
        "ALTER TABLE {} MODIFY ({} {})",
        schema.qualified_name(),
        column.resolved_name,
        text_clause(column, config)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_TEXT_WIDTH;

    fn column(name: &str, semantic_type: SemanticType) -> ColumnSpec {
        let mut column = ColumnSpec::new(name, name);
        column.semantic_type = semantic_type;
        column
    }

    fn numeric(name: &str, precision: Option<u32>, scale: Option<u32>) -> ColumnSpec {
        let mut column = column(name, SemanticType::IntegerOrDecimal);
        column.numeric_precision = precision;
        column.numeric_scale = scale;
        column
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn text_columns_use_character_semantics_plus_buffer() {
        let mut notes = column("NOTES", SemanticType::Text);
        notes.observed_max_length = 100;
        assert_eq!(
            column_definition(&notes, &config()).unwrap(),
            "NOTES VARCHAR2(150 CHAR) NULL"
        );
    }

    #[test]
    fn text_width_is_clamped_to_ceiling() {
        let mut body = column("BODY", SemanticType::Text);
        body.observed_max_length = MAX_TEXT_WIDTH - 10;
        assert_eq!(type_clause(&body, &config()).unwrap(), "VARCHAR2(4000 CHAR)");
    }

    #[test]
    fn oversized_text_is_a_breach() {
        let mut body = column("BODY", SemanticType::Text);
        body.observed_max_length = MAX_TEXT_WIDTH + 1;
        let err = column_definition(&body, &config()).expect_err("breach");
        assert!(matches!(err, IngestError::SizeBreach { observed_length: 4001, .. }));
    }

    #[test]
    fn numeric_clauses() {
        let cfg = config();
        assert_eq!(type_clause(&numeric("A", Some(12), Some(2)), &cfg).unwrap(), "NUMBER(12, 2)");
        assert_eq!(type_clause(&numeric("A", Some(5), None), &cfg).unwrap(), "NUMBER(5)");
        assert_eq!(type_clause(&numeric("A", None, None), &cfg).unwrap(), "NUMBER");
        assert_eq!(type_clause(&numeric("A", Some(40), Some(1)), &cfg).unwrap(), "NUMBER");
    }

    #[test]
    fn temporal_clauses_and_nullability() {
        let cfg = config();
        let mut created = column("CREATED", SemanticType::Date);
        created.nullable = false;
        assert_eq!(column_definition(&created, &cfg).unwrap(), "CREATED DATE NOT NULL");
        assert_eq!(
            column_definition(&column("MODIFIED", SemanticType::DateTime), &cfg).unwrap(),
            "MODIFIED TIMESTAMP NULL"
        );
    }

    #[test]
    fn unresolved_columns_are_refused() {
        let err = column_definition(&column("X", SemanticType::Unknown), &config()).expect_err("unknown");
        assert!(matches!(err, IngestError::Schema { .. }));
    }

    #[test]
    fn create_table_lists_columns_in_order() {
        let mut schema = TableSchema::new("CONTACTS", "SALES");
        let mut name = column("LAST_NAME", SemanticType::Text);
        name.observed_max_length = 5;
        schema.push_column(name).unwrap();
        schema.push_column(numeric("AMOUNT", Some(6), Some(2))).unwrap();
        assert_eq!(
            create_table(&schema, &config()).unwrap(),
            "CREATE TABLE SALES.CONTACTS (\n    LAST_NAME VARCHAR2(55 CHAR) NULL,\n    AMOUNT NUMBER(6, 2) NULL\n)"
        );
        assert!(create_table(&TableSchema::new("E", "S"), &config()).is_err());
    }

    #[test]
    fn add_columns_emits_one_statement() {
        let schema = TableSchema::new("CONTACTS", "SALES");
        let email = column("EMAIL", SemanticType::Text);
        let score = numeric("SCORE", Some(3), None);
        assert_eq!(
            add_columns(&schema, &[&email, &score], &config()).unwrap(),
            "ALTER TABLE SALES.CONTACTS ADD (EMAIL VARCHAR2(50 CHAR) NULL, SCORE NUMBER(3) NULL)"
        );
        assert!(add_columns(&schema, &[], &config()).is_err());
    }

    #[test]
    fn widen_only_applies_to_text() {
        let schema = TableSchema::new("CONTACTS", "SALES");
        let mut notes = column("NOTES", SemanticType::Text);
        notes.observed_max_length = 300;
        assert_eq!(
            widen_column(&schema, &notes, &config()).unwrap(),
            "ALTER TABLE SALES.CONTACTS MODIFY (NOTES VARCHAR2(350 CHAR))"
        );
        let err = widen_column(&schema, &numeric("AMOUNT", Some(4), None), &config())
            .expect_err("numeric");
        assert!(matches!(err, IngestError::Schema { .. }));
    }
}
