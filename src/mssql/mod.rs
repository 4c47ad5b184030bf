// =====================================================
// MSSQL SESSION (via Tiberius)
// =====================================================

use crate::data_transfer::models::StagingColumn;
use crate::data_transfer::session::{run_with_timeout, DatabaseSession};
use crate::db::connection_url::{parse_mssql_url, ConnectionParts};
use crate::db::sql_utils::{build_insert_statements, create_table_statement, drop_table_statement};
use crate::db_types::{ConnectionDescriptor, EngineKind, TabularResult};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use serde_json::Value;
use std::time::Duration;
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, Client, Config, QueryItem, Row, Uuid};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type TdsClient = Client<Compat<TcpStream>>;

pub struct MssqlSession {
    client: TdsClient,
    statement_timeout: Option<Duration>,
}

// --- Connection ---

fn build_config(parts: &ConnectionParts, trust_server_certificate: bool) -> Config {
    let mut tiberius_config = Config::new();
    tiberius_config.host(&parts.host);
    tiberius_config.port(parts.port.unwrap_or(EngineKind::MSSQL.default_port()));
    tiberius_config.authentication(AuthMethod::sql_server(&parts.username, &parts.password));

    if !parts.database.is_empty() {
        tiberius_config.database(&parts.database);
    }
    if trust_server_certificate {
        tiberius_config.trust_cert();
    }

    tiberius_config
}

async fn open_stream(config: &Config) -> Result<Compat<TcpStream>, String> {
    let addr = config.get_addr();
    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|e| format!("Failed to reach {}: {}", addr, e))?;
    tcp.set_nodelay(true).map_err(|e| e.to_string())?;
    Ok(tcp.compat_write())
}

async fn open_client(config: Config) -> Result<TdsClient, String> {
    let stream = open_stream(&config).await?;

    match Client::connect(config.clone(), stream).await {
        Ok(client) => Ok(client),
        // Azure SQL gateways may hand the login over to another node.
        Err(tiberius::error::Error::Routing { host, port }) => {
            log::debug!("SQL Server redirected the connection to {}:{}", host, port);
            let mut routed = config;
            routed.host(&host);
            routed.port(port);
            let stream = open_stream(&routed).await?;
            Client::connect(routed, stream)
                .await
                .map_err(|e| format!("Connection failed: {}", e))
        }
        Err(e) => Err(format!("Connection failed: {}", e)),
    }
}

pub async fn connect(
    descriptor: &ConnectionDescriptor,
    connect_timeout: Option<Duration>,
    statement_timeout: Option<Duration>,
    trust_server_certificate: bool,
) -> Result<MssqlSession, String> {
    let parts = parse_mssql_url(descriptor.url())?;
    let config = build_config(&parts, trust_server_certificate);
    let client = run_with_timeout(open_client(config), connect_timeout, "Connection").await?;

    Ok(MssqlSession {
        client,
        statement_timeout,
    })
}

// --- Row Decoding ---

fn decode_column(row: &Row, i: usize) -> Value {
    if let Ok(Some(v)) = row.try_get::<bool, _>(i) {
        serde_json::json!(v)
    } else if let Ok(Some(v)) = row.try_get::<i64, _>(i) {
        serde_json::json!(v)
    } else if let Ok(Some(v)) = row.try_get::<i32, _>(i) {
        serde_json::json!(v)
    } else if let Ok(Some(v)) = row.try_get::<i16, _>(i) {
        serde_json::json!(v)
    } else if let Ok(Some(v)) = row.try_get::<u8, _>(i) {
        serde_json::json!(v)
    } else if let Ok(Some(v)) = row.try_get::<f64, _>(i) {
        serde_json::json!(v)
    } else if let Ok(Some(v)) = row.try_get::<f32, _>(i) {
        serde_json::json!(v)
    } else if let Ok(Some(v)) = row.try_get::<Numeric, _>(i) {
        serde_json::json!(v.to_string())
    } else if let Ok(Some(v)) = row.try_get::<NaiveDateTime, _>(i) {
        serde_json::json!(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    } else if let Ok(Some(v)) = row.try_get::<DateTime<FixedOffset>, _>(i) {
        serde_json::json!(v.to_rfc3339())
    } else if let Ok(Some(v)) = row.try_get::<NaiveDate, _>(i) {
        serde_json::json!(v.format("%Y-%m-%d").to_string())
    } else if let Ok(Some(v)) = row.try_get::<NaiveTime, _>(i) {
        serde_json::json!(v.format("%H:%M:%S%.f").to_string())
    } else if let Ok(Some(v)) = row.try_get::<Uuid, _>(i) {
        serde_json::json!(v.to_string())
    } else if let Ok(Some(v)) = row.try_get::<&str, _>(i) {
        serde_json::json!(v)
    } else if let Ok(Some(v)) = row.try_get::<&[u8], _>(i) {
        serde_json::json!(format!("0x{}", hex::encode(v)))
    } else {
        Value::Null
    }
}

fn decode_row(row: &Row) -> Vec<Value> {
    (0..row.len()).map(|i| decode_column(row, i)).collect()
}

/// One round trip for a whole batch; XACT_ABORT rolls it back on any error.
fn transactional_batch(statements: &[String]) -> String {
    let mut batch = String::from("SET XACT_ABORT ON;\nBEGIN TRANSACTION;\n");
    for statement in statements {
        batch.push_str(statement);
        batch.push_str(";\n");
    }
    batch.push_str("COMMIT TRANSACTION;");
    batch
}

// --- Session ---

#[async_trait]
impl DatabaseSession for MssqlSession {
    fn engine(&self) -> EngineKind {
        EngineKind::MSSQL
    }

    async fn fetch_result(&mut self, statement: &str) -> Result<TabularResult, String> {
        let timeout = self.statement_timeout;
        let client = &mut self.client;

        let drain = async move {
            let mut stream = client
                .simple_query(statement)
                .await
                .map_err(|e| format!("Query error: {}", e))?;

            let mut columns: Vec<String> = Vec::new();
            let mut rows = Vec::new();
            let mut result_sets = 0usize;

            while let Some(item) = stream
                .try_next()
                .await
                .map_err(|e| format!("Query error: {}", e))?
            {
                match item {
                    QueryItem::Metadata(meta) => {
                        result_sets += 1;
                        if result_sets == 1 {
                            columns = meta.columns().iter().map(|c| c.name().to_string()).collect();
                        }
                    }
                    QueryItem::Row(row) => {
                        if result_sets <= 1 {
                            rows.push(decode_row(&row));
                        }
                    }
                }
            }

            Ok(TabularResult::new(columns, rows))
        };

        run_with_timeout(drain, timeout, "Statement").await
    }

    /// SQL Server runs in autocommit mode, so the call is committed once the
    /// server acknowledges it.
    async fn execute_committed(&mut self, statement: &str) -> Result<u64, String> {
        let timeout = self.statement_timeout;
        let client = &mut self.client;

        let work = async move {
            let result = client
                .execute(statement, &[])
                .await
                .map_err(|e| format!("Statement failed: {}", e))?;
            Ok(result.total())
        };

        run_with_timeout(work, timeout, "Statement").await
    }

    async fn recreate_table(&mut self, table: &str, columns: &[StagingColumn]) -> Result<(), String> {
        let timeout = self.statement_timeout;
        let statements = vec![
            drop_table_statement(EngineKind::MSSQL, table),
            create_table_statement(EngineKind::MSSQL, table, columns)?,
        ];
        let client = &mut self.client;

        let work = async move {
            for statement in statements {
                client
                    .execute(statement, &[])
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
        let statements = build_insert_statements(EngineKind::MSSQL, table, columns, rows);
        if statements.is_empty() {
            return Ok(0);
        }
        let batch = transactional_batch(&statements);
        let client = &mut self.client;

        let work = async move {
            let result = client
                .execute(batch, &[])
                .await
                .map_err(|e| format!("Insert failed: {}", e))?;
            Ok(result.total())
        };

        run_with_timeout(work, timeout, "Batch insert").await
    }

    async fn close(self: Box<Self>) -> Result<(), String> {
        self.client
            .close()
            .await
            .map_err(|e| format!("Failed to close SQL Server connection: {}", e))
    }
}
