// =====================================================
// MySQL SESSION (via sqlx)
// =====================================================

use crate::data_transfer::models::StagingColumn;
use crate::data_transfer::session::{run_with_timeout, DatabaseSession};
use crate::db::connection_url::{parse_mysql_url, ConnectionParts};
use crate::db::sql_utils::{build_insert_statements, create_table_statement, drop_table_statement};
use crate::db_types::{ConnectionDescriptor, EngineKind, TabularResult};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Either, Row, TypeInfo, ValueRef};
use std::time::Duration;

pub struct MySqlSession {
    conn: MySqlConnection,
    statement_timeout: Option<Duration>,
}

// --- Connection ---

fn connect_options(parts: &ConnectionParts) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&parts.host)
        .port(parts.port.unwrap_or(EngineKind::MySQL.default_port()))
        .username(&parts.username)
        .password(&parts.password);

    if !parts.database.is_empty() {
        options = options.database(&parts.database);
    }

    options.log_statements(log::LevelFilter::Debug)
}

fn describe_connect_error(err_msg: &str, parts: &ConnectionParts) -> String {
    let port = parts.port.unwrap_or(EngineKind::MySQL.default_port());
    if err_msg.contains("os error 111") {
        return format!(
            "Connection Refused ({}). Check if MySQL is running on {}:{}",
            err_msg, parts.host, port
        );
    }
    format!("Connection failed: {}", err_msg)
}

pub async fn connect(
    descriptor: &ConnectionDescriptor,
    connect_timeout: Option<Duration>,
    statement_timeout: Option<Duration>,
) -> Result<MySqlSession, String> {
    let parts = parse_mysql_url(descriptor.url())?;
    let options = connect_options(&parts);

    let conn = run_with_timeout(
        async {
            options
                .connect()
                .await
                .map_err(|e| describe_connect_error(&e.to_string(), &parts))
        },
        connect_timeout,
        "Connection",
    )
    .await?;

    Ok(MySqlSession {
        conn,
        statement_timeout,
    })
}

// --- Row Decoding ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueClass {
    Boolean,
    Signed,
    Unsigned,
    Float,
    Binary,
    Text,
}

fn value_class(type_name: &str) -> ValueClass {
    let upper = type_name.trim().to_ascii_uppercase();
    let base = upper.split_whitespace().next().unwrap_or_default();
    let integer = matches!(
        base,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "YEAR"
    );

    match base {
        "BOOLEAN" | "BOOL" => ValueClass::Boolean,
        _ if integer && upper.contains("UNSIGNED") => ValueClass::Unsigned,
        _ if integer => ValueClass::Signed,
        "FLOAT" | "DOUBLE" => ValueClass::Float,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => ValueClass::Binary,
        // DECIMAL, temporal, character, JSON, ENUM and SET keep their text form.
        _ => ValueClass::Text,
    }
}

fn text_fallback(row: &MySqlRow, index: usize) -> Option<Value> {
    row.try_get_unchecked::<String, _>(index)
        .map(Value::String)
        .or_else(|_| {
            row.try_get_unchecked::<Vec<u8>, _>(index)
                .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).to_string()))
        })
        .ok()
}

fn decode_column(row: &MySqlRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    let class = row
        .columns()
        .get(index)
        .map(|column| value_class(column.type_info().name()))
        .unwrap_or(ValueClass::Text);

    let decoded = match class {
        ValueClass::Boolean => row
            .try_get_unchecked::<bool, _>(index)
            .map(|v| serde_json::json!(v))
            .ok(),
        ValueClass::Signed => row
            .try_get_unchecked::<i64, _>(index)
            .map(|v| serde_json::json!(v))
            .ok(),
        ValueClass::Unsigned => row
            .try_get_unchecked::<u64, _>(index)
            .map(|v| serde_json::json!(v))
            .ok(),
        ValueClass::Float => row
            .try_get_unchecked::<f64, _>(index)
            .map(|v| serde_json::json!(v))
            .ok(),
        ValueClass::Binary => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| serde_json::json!(format!("0x{}", hex::encode(bytes))))
            .ok(),
        ValueClass::Text => None,
    };

    decoded
        .or_else(|| text_fallback(row, index))
        .unwrap_or(Value::Null)
}

fn decode_row(row: &MySqlRow) -> Vec<Value> {
    (0..row.len()).map(|index| decode_column(row, index)).collect()
}

/// Rows of the first result set a statement produces. Each `Left` item ends a
/// result set (empty ones included); rows after the first one are dropped.
struct FirstResultSet<R> {
    rows: Vec<R>,
    closed: bool,
}

impl<R> FirstResultSet<R> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            closed: false,
        }
    }

    fn accept<L>(&mut self, item: Either<L, R>) {
        match item {
            Either::Left(_) => self.closed = true,
            Either::Right(row) => {
                if !self.closed {
                    self.rows.push(row);
                }
            }
        }
    }

    fn into_rows(self) -> Vec<R> {
        self.rows
    }
}

// --- Session ---

// Pins the executor/statement lifetimes so the future stays `Send` inside `#[async_trait]`.
fn execute_raw<'c>(
    conn: &'c mut MySqlConnection,
    statement: &'c str,
) -> futures::future::BoxFuture<'c, Result<sqlx::mysql::MySqlQueryResult, sqlx::Error>> {
    sqlx::Executor::execute(conn, sqlx::raw_sql(statement))
}

#[async_trait]
impl DatabaseSession for MySqlSession {
    fn engine(&self) -> EngineKind {
        EngineKind::MySQL
    }

    async fn fetch_result(&mut self, statement: &str) -> Result<TabularResult, String> {
        let timeout = self.statement_timeout;
        let conn = &mut self.conn;

        let drain = async move {
            let mut stream = sqlx::raw_sql(statement).fetch_many(conn);
            let mut first_set = FirstResultSet::new();

            while let Some(item) = stream
                .try_next()
                .await
                .map_err(|e| format!("Query error: {}", e))?
            {
                first_set.accept(item);
            }

            let rows = first_set.into_rows();
            let columns = rows
                .first()
                .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
                .unwrap_or_default();
            Ok(TabularResult::new(columns, rows.iter().map(decode_row).collect()))
        };

        run_with_timeout(drain, timeout, "Statement").await
    }

    async fn execute_committed(&mut self, statement: &str) -> Result<u64, String> {
        let timeout = self.statement_timeout;
        let conn = &mut self.conn;

        let work = async move {
            let mut tx = conn
                .begin()
                .await
                .map_err(|e| format!("Failed to begin transaction: {}", e))?;
            let done = execute_raw(&mut *tx, statement)
                .await
                .map_err(|e| format!("Statement failed: {}", e))?;
            tx.commit()
                .await
                .map_err(|e| format!("Failed to commit transaction: {}", e))?;
            Ok(done.rows_affected())
        };

        run_with_timeout(work, timeout, "Statement").await
    }

    async fn recreate_table(&mut self, table: &str, columns: &[StagingColumn]) -> Result<(), String> {
        let timeout = self.statement_timeout;
        let statements = vec![
            drop_table_statement(EngineKind::MySQL, table),
            create_table_statement(EngineKind::MySQL, table, columns)?,
        ];
        let conn = &mut self.conn;

        let work = async move {
            for statement in &statements {
                execute_raw(&mut *conn, statement)
                    .await
                    .map_err(|e| format!("Failed to replace table: {}", e))?;
            }
            Ok(())
        };

        run_with_timeout(work, timeout, "Table replace").await
    }

    async fn insert_batch(
        &mut self,
        table: &str,
        columns: &[StagingColumn],
        rows: &[Vec<Value>],
    ) -> Result<u64, String> {
        let timeout = self.statement_timeout;
        let statements = build_insert_statements(EngineKind::MySQL, table, columns, rows);
        let conn = &mut self.conn;

        let work = async move {
            let mut tx = conn
                .begin()
                .await
                .map_err(|e| format!("Failed to begin transaction: {}", e))?;
            let mut affected = 0u64;
            for statement in &statements {
                let done = execute_raw(&mut *tx, statement)
                    .await
                    .map_err(|e| format!("Insert failed: {}", e))?;
                affected = affected.saturating_add(done.rows_affected());
            }
            tx.commit()
                .await
                .map_err(|e| format!("Failed to commit batch: {}", e))?;
            Ok(affected)
        };

        run_with_timeout(work, timeout, "Batch insert").await
    }

    async fn close(self: Box<Self>) -> Result<(), String> {
        self.conn
            .close()
            .await
            .map_err(|e| format!("Failed to close MySQL connection: {}", e))
    }
}
