//! In-memory connector used by the transfer tests.

use crate::config::TransferConfig;
use crate::data_transfer::models::StagingColumn;
use crate::data_transfer::session::{Connector, DatabaseSession};
use crate::db_types::{ConnectionDescriptor, EngineKind, TabularResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub connects: Vec<(EngineKind, String)>,
    pub releases: usize,
    pub statements: Vec<String>,
    pub committed: Vec<String>,
    pub tables: HashMap<String, TabularResult>,
    pub table_columns: HashMap<String, Vec<StagingColumn>>,
    pub batch_sizes: Vec<usize>,
    pub insert_columns: Vec<StagingColumn>,
    pub procedure_results: HashMap<String, TabularResult>,
    pub unreachable: HashSet<String>,
    pub failing_procedures: HashSet<String>,
    pub fail_insert_after: Option<usize>,
    pub session_engine: Option<EngineKind>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(self, procedure: &str, result: TabularResult) -> Self {
        self.state
            .lock()
            .unwrap()
            .procedure_results
            .insert(procedure.to_string(), result);
        self
    }

    pub fn failing_procedure(self, procedure: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_procedures
            .insert(procedure.to_string());
        self
    }

    pub fn unreachable(self, database: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .unreachable
            .insert(database.to_string());
        self
    }

    /// Lets `batches` insert batches succeed, then fails every later one.
    pub fn fail_insert_after(self, batches: usize) -> Self {
        self.state.lock().unwrap().fail_insert_after = Some(batches);
        self
    }

    /// Sessions report `engine` regardless of the descriptor they were opened for.
    pub fn sessions_report(self, engine: EngineKind) -> Self {
        self.state.lock().unwrap().session_engine = Some(engine);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects.len()
    }

    pub fn connected_databases(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .connects
            .iter()
            .map(|(_, database)| database.clone())
            .collect()
    }

    pub fn releases(&self) -> usize {
        self.state.lock().unwrap().releases
    }

    pub fn table(&self, name: &str) -> Option<TabularResult> {
        self.state.lock().unwrap().tables.get(name).cloned()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().batch_sizes.clone()
    }

    pub fn insert_columns(&self) -> Vec<StagingColumn> {
        self.state.lock().unwrap().insert_columns.clone()
    }

    pub fn committed(&self) -> Vec<String> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn DatabaseSession>, String> {
        let mut state = self.state.lock().unwrap();
        state
            .connects
            .push((descriptor.engine, descriptor.database.clone()));
        if state.unreachable.contains(&descriptor.database) {
            return Err(format!("{} is unreachable", descriptor.host));
        }
        Ok(Box::new(FakeSession {
            engine: state.session_engine.unwrap_or(descriptor.engine),
            state: Arc::clone(&self.state),
        }))
    }
}

pub(crate) struct FakeSession {
    pub engine: EngineKind,
    pub state: Arc<Mutex<FakeState>>,
}

fn procedure_in(statement: &str) -> String {
    statement
        .trim()
        .trim_start_matches("CALL ")
        .trim_start_matches("EXEC ")
        .trim_end_matches("()")
        .to_string()
}

#[async_trait]
impl DatabaseSession for FakeSession {
    fn engine(&self) -> EngineKind {
        self.engine
    }

    async fn fetch_result(&mut self, statement: &str) -> Result<TabularResult, String> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(statement.to_string());
        let procedure = procedure_in(statement);
        if state.failing_procedures.contains(&procedure) {
            return Err(format!("PROCEDURE {} does not exist", procedure));
        }
        Ok(state
            .procedure_results
            .get(&procedure)
            .cloned()
            .unwrap_or_default())
    }

    async fn execute_committed(&mut self, statement: &str) -> Result<u64, String> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(statement.to_string());
        let procedure = procedure_in(statement);
        if state.failing_procedures.contains(&procedure) {
            return Err(format!("Could not find stored procedure '{}'", procedure));
        }
        state.committed.push(procedure);
        Ok(0)
    }

    async fn recreate_table(&mut self, table: &str, columns: &[StagingColumn]) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        let names = columns.iter().map(|c| c.name.clone()).collect();
        state
            .tables
            .insert(table.to_string(), TabularResult::new(names, Vec::new()));
        state.table_columns.insert(table.to_string(), columns.to_vec());
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        table: &str,
        columns: &[StagingColumn],
        rows: &[Vec<Value>],
    ) -> Result<u64, String> {
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = state.fail_insert_after {
            if state.batch_sizes.len() >= limit {
                return Err("String or binary data would be truncated".to_string());
            }
        }
        let stored = state
            .tables
            .get_mut(table)
            .ok_or_else(|| format!("Invalid object name '{}'", table))?;
        stored.rows.extend(rows.iter().cloned());
        state.batch_sizes.push(rows.len());
        state.insert_columns = columns.to_vec();
        Ok(rows.len() as u64)
    }

    async fn close(self: Box<Self>) -> Result<(), String> {
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.releases += 1;
        }
    }
}

/// Default job settings with both credential pairs present.
pub(crate) fn test_config(batch_size: usize) -> TransferConfig {
    let batch = batch_size.to_string();
    let values: HashMap<&str, &str> = [
        ("DB_AMK_USER", "amk"),
        ("DB_AMK_PASSWORD", "amk pass"),
        ("DB_MI_USER", "mi"),
        ("DB_MI_PASSWORD", "mi;pass"),
        ("TRANSFER_BATCH_SIZE", batch.as_str()),
    ]
    .into_iter()
    .collect();
    TransferConfig::from_lookup(|key| values.get(key).map(|v| v.to_string())).unwrap()
}

pub(crate) fn sample_rows(count: usize) -> TabularResult {
    let rows = (0..count)
        .map(|i| {
            vec![
                serde_json::json!(i as i64),
                serde_json::json!(format!("job-{}", i)),
                serde_json::json!(i % 2 == 0),
            ]
        })
        .collect();
    TabularResult::new(
        vec!["id".to_string(), "name".to_string(), "active".to_string()],
        rows,
    )
}
