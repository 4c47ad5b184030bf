use crate::data_transfer::session::DatabaseSession;
use crate::db::sql_utils::{procedure_call_statement, validate_procedure_name};
use crate::db_types::{EngineKind, TabularResult};
use crate::error::TransferError;
use log::error;

/// Invokes a stored procedure with no arguments.
///
/// With `wants_result` the first result set is returned as-is; otherwise the
/// call is committed and `None` is returned.
pub async fn call_procedure(
    session: &mut dyn DatabaseSession,
    procedure: &str,
    engine: EngineKind,
    wants_result: bool,
) -> Result<Option<TabularResult>, TransferError> {
    let outcome = execute(session, procedure, engine, wants_result).await;
    if let Err(message) = &outcome {
        error!("Error executing stored procedure {}: {}", procedure, message);
    }
    outcome.map_err(|message| TransferError::Execution {
        procedure: procedure.trim().to_string(),
        message,
    })
}

async fn execute(
    session: &mut dyn DatabaseSession,
    procedure: &str,
    engine: EngineKind,
    wants_result: bool,
) -> Result<Option<TabularResult>, String> {
    validate_procedure_name(procedure)?;
    if session.engine() != engine {
        return Err(format!(
            "Engine mismatch: connection is {}, call requested {}",
            session.engine(),
            engine
        ));
    }

    let statement = procedure_call_statement(engine, procedure);
    if wants_result {
        session.fetch_result(&statement).await.map(Some)
    } else {
        session.execute_committed(&statement).await.map(|_| None)
    }
}

#[cfg(test)]
mod tests;
