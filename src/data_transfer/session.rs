use crate::data_transfer::models::StagingColumn;
use crate::db_types::{ConnectionDescriptor, EngineKind, TabularResult};
use crate::{mssql, mysql};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// An open, engine-tagged connection. Implemented by the MySQL and SQL Server
/// drivers; the provisioner owns the boxed session for its whole lifetime.
#[async_trait]
pub trait DatabaseSession: Send {
    fn engine(&self) -> EngineKind;

    /// Runs `statement` and drains the first result set it produces.
    async fn fetch_result(&mut self, statement: &str) -> Result<TabularResult, String>;

    /// Runs `statement` without reading rows and commits it before returning.
    async fn execute_committed(&mut self, statement: &str) -> Result<u64, String>;

    /// Drops `table` if present and creates it with `columns`.
    async fn recreate_table(&mut self, table: &str, columns: &[StagingColumn]) -> Result<(), String>;

    /// Inserts `rows` in one transaction and returns the affected row count.
    async fn insert_batch(
        &mut self,
        table: &str,
        columns: &[StagingColumn],
        rows: &[Vec<Value>],
    ) -> Result<u64, String>;

    async fn close(self: Box<Self>) -> Result<(), String>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn DatabaseSession>, String>;
}

/// Connects through the real drivers.
#[derive(Debug, Clone, Default)]
pub struct DriverConnector {
    pub connect_timeout: Option<Duration>,
    pub statement_timeout: Option<Duration>,
    pub trust_server_certificate: bool,
}

#[async_trait]
impl Connector for DriverConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn DatabaseSession>, String> {
        match descriptor.engine {
            EngineKind::MySQL => {
                let session =
                    mysql::connect(descriptor, self.connect_timeout, self.statement_timeout).await?;
                Ok(Box::new(session))
            }
            EngineKind::MSSQL => {
                let session = mssql::connect(
                    descriptor,
                    self.connect_timeout,
                    self.statement_timeout,
                    self.trust_server_certificate,
                )
                .await?;
                Ok(Box::new(session))
            }
        }
    }
}

/// Awaits `operation`, bounded by `limit` when one is configured.
pub(crate) async fn run_with_timeout<T, F>(
    operation: F,
    limit: Option<Duration>,
    label: &str,
) -> Result<T, String>
where
    F: Future<Output = Result<T, String>>,
{
    match limit {
        Some(duration) => tokio::time::timeout(duration, operation)
            .await
            .map_err(|_| format!("{} timed out after {} seconds", label, duration.as_secs()))?,
        None => operation.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_with_timeout_passes_through_without_limit() {
        let value = run_with_timeout(async { Ok::<_, String>(7) }, None, "Query").await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn run_with_timeout_reports_label_on_expiry() {
        let result = run_with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, String>(())
            },
            Some(Duration::from_millis(10)),
            "Statement",
        )
        .await;
        assert_eq!(result, Err("Statement timed out after 0 seconds".to_string()));
    }

    #[tokio::test]
    async fn run_with_timeout_keeps_inner_error() {
        let result = run_with_timeout(
            async { Err::<(), _>("boom".to_string()) },
            Some(Duration::from_secs(1)),
            "Statement",
        )
        .await;
        assert_eq!(result, Err("boom".to_string()));
    }
}
