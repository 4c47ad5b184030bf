// =====================================================
// SQL UTILITIES MODULE
// Dialect-specific quoting, literals, DDL and call syntax
// =====================================================

use crate::data_transfer::models::{ColumnKind, StagingColumn};
use crate::db_types::EngineKind;
use serde_json::Value;

/// SQL Server rejects more than 1000 row constructors in one VALUES list.
pub const INSERT_STATEMENT_ROWS: usize = 1_000;

pub fn quote_identifier_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub fn quote_identifier_mssql(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

pub fn quote_identifier(engine: EngineKind, name: &str) -> String {
    match engine {
        EngineKind::MySQL => quote_identifier_mysql(name),
        EngineKind::MSSQL => quote_identifier_mssql(name),
    }
}

pub fn split_table_name(table: &str) -> (Option<&str>, &str) {
    match table.find('.') {
        Some(pos) => (Some(&table[..pos]), &table[pos + 1..]),
        None => (None, table),
    }
}

pub fn qualified_table_name(engine: EngineKind, table: &str) -> String {
    match split_table_name(table.trim()) {
        (Some(schema), name) => format!(
            "{}.{}",
            quote_identifier(engine, schema),
            quote_identifier(engine, name)
        ),
        (None, name) => quote_identifier(engine, name),
    }
}

pub fn escape_sql_string(engine: EngineKind, value: &str) -> String {
    match engine {
        EngineKind::MySQL => value.replace('\\', "\\\\").replace('\'', "''"),
        EngineKind::MSSQL => value.replace('\'', "''"),
    }
}

fn string_literal(engine: EngineKind, value: &str) -> String {
    match engine {
        EngineKind::MySQL => format!("'{}'", escape_sql_string(engine, value)),
        EngineKind::MSSQL => format!("N'{}'", escape_sql_string(engine, value)),
    }
}

pub fn value_to_sql_literal(engine: EngineKind, value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => {
            if *v {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        Value::Number(num) => num.to_string(),
        Value::String(s) => string_literal(engine, s),
        other => string_literal(engine, &other.to_string()),
    }
}

pub fn column_type_sql(engine: EngineKind, kind: ColumnKind) -> &'static str {
    match (engine, kind) {
        (EngineKind::MySQL, ColumnKind::Boolean) => "BOOLEAN",
        (EngineKind::MySQL, ColumnKind::Integer) => "BIGINT",
        (EngineKind::MySQL, ColumnKind::Float) => "DOUBLE",
        (EngineKind::MySQL, ColumnKind::Text) => "LONGTEXT",
        (EngineKind::MSSQL, ColumnKind::Boolean) => "BIT",
        (EngineKind::MSSQL, ColumnKind::Integer) => "BIGINT",
        (EngineKind::MSSQL, ColumnKind::Float) => "FLOAT",
        (EngineKind::MSSQL, ColumnKind::Text) => "NVARCHAR(MAX)",
    }
}

pub fn drop_table_statement(engine: EngineKind, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified_table_name(engine, table))
}

pub fn create_table_statement(
    engine: EngineKind,
    table: &str,
    columns: &[StagingColumn],
) -> Result<String, String> {
    if columns.is_empty() {
        return Err("Cannot create a table without columns".to_string());
    }

    let definitions = columns
        .iter()
        .map(|column| {
            format!(
                "{} {} NULL",
                quote_identifier(engine, &column.name),
                column_type_sql(engine, column.kind)
            )
        })
        .collect::<Vec<String>>()
        .join(", ");

    Ok(format!(
        "CREATE TABLE {} ({})",
        qualified_table_name(engine, table),
        definitions
    ))
}

/// Literal for `value` stored in a column of `kind`. Text columns quote every
/// non-null value so one VALUES list never mixes numeric and string literals.
pub fn column_literal(engine: EngineKind, kind: ColumnKind, value: &Value) -> String {
    match (kind, value) {
        (_, Value::Null) => "NULL".to_string(),
        (ColumnKind::Text, Value::String(s)) => string_literal(engine, s),
        (ColumnKind::Text, other) => string_literal(engine, &other.to_string()),
        (_, other) => value_to_sql_literal(engine, other),
    }
}

/// Multi-row INSERT statements for `rows`, at most
/// [`INSERT_STATEMENT_ROWS`] rows each. Short rows are padded with NULL.
pub fn build_insert_statements(
    engine: EngineKind,
    table: &str,
    columns: &[StagingColumn],
    rows: &[Vec<Value>],
) -> Vec<String> {
    if columns.is_empty() || rows.is_empty() {
        return Vec::new();
    }

    let qualified_table = qualified_table_name(engine, table);
    let quoted_columns = columns
        .iter()
        .map(|col| quote_identifier(engine, &col.name))
        .collect::<Vec<String>>()
        .join(", ");

    rows.chunks(INSERT_STATEMENT_ROWS)
        .map(|chunk| {
            let tuples = chunk
                .iter()
                .map(|row| {
                    let values = columns
                        .iter()
                        .enumerate()
                        .map(|(index, col)| {
                            column_literal(engine, col.kind, row.get(index).unwrap_or(&Value::Null))
                        })
                        .collect::<Vec<String>>()
                        .join(", ");
                    format!("({})", values)
                })
                .collect::<Vec<String>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES {}",
                qualified_table, quoted_columns, tuples
            )
        })
        .collect()
}

/// Accepts `name` or `schema.name` made of letters, digits, `_` and `$`.
pub fn validate_procedure_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Procedure name is required".to_string());
    }

    let valid = trimmed.split('.').all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    });
    if !valid || trimmed.split('.').count() > 2 {
        return Err(format!("Invalid procedure name '{}'", trimmed));
    }

    Ok(())
}

pub fn procedure_call_statement(engine: EngineKind, name: &str) -> String {
    match engine {
        EngineKind::MySQL => format!("CALL {}()", name.trim()),
        EngineKind::MSSQL => format!("EXEC {}", name.trim()),
    }
}
