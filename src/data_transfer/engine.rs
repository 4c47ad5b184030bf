// =====================================================
// TRANSFER PIPELINE
// source procedure -> staging table -> destination procedure
// =====================================================

use crate::config::TransferConfig;
use crate::data_transfer::connection_resolver::ConnectionProvisioner;
use crate::data_transfer::models::{LoadSummary, TransferSummary};
use crate::data_transfer::procedure::call_procedure;
use crate::data_transfer::session::Connector;
use crate::data_transfer::sink::replace_table;
use crate::db_types::{EngineKind, TabularResult};
use crate::error::TransferError;
use chrono::Utc;
use log::{debug, error, info};

/// How a run ended when the source phase succeeded.
#[derive(Debug)]
pub enum TransferOutcome {
    Completed(TransferSummary),
    /// The source procedure returned no rows; the destination was not touched.
    NothingToTransfer,
    /// The destination phase failed after a successful fetch. Already logged.
    DestinationFailed(TransferError),
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed(_))
    }
}

/// Process exit code for a finished run, and whether `completed` is printed.
/// A failed destination phase exits 0 unless `strict_destination` is set.
pub fn exit_status(
    outcome: &Result<TransferOutcome, TransferError>,
    strict_destination: bool,
) -> (i32, bool) {
    match outcome {
        Ok(TransferOutcome::Completed(_)) => (0, true),
        Ok(TransferOutcome::NothingToTransfer) => (0, false),
        Ok(TransferOutcome::DestinationFailed(_)) if strict_destination => (2, false),
        Ok(TransferOutcome::DestinationFailed(_)) => (0, false),
        Err(_) => (1, false),
    }
}

/// Runs one transfer. Source-phase failures are returned as `Err`;
/// destination-phase failures come back as [`TransferOutcome::DestinationFailed`].
pub async fn run_transfer(
    config: &TransferConfig,
    connector: &dyn Connector,
) -> Result<TransferOutcome, TransferError> {
    let started_at = Utc::now();
    let provisioner = ConnectionProvisioner::new(config, connector);

    let result = fetch_source(config, &provisioner).await.inspect_err(|e| {
        error!("Source phase failed: {}", e);
    })?;

    if result.is_empty() {
        info!(
            "Procedure {} returned no rows; nothing to transfer",
            config.source.procedure
        );
        return Ok(TransferOutcome::NothingToTransfer);
    }

    let source_rows = result.row_count();
    let load = match load_destination(config, &provisioner, result).await {
        Ok(load) => load,
        Err(e) => {
            error!("Destination phase failed: {}", e);
            return Ok(TransferOutcome::DestinationFailed(e));
        }
    };

    let summary = TransferSummary {
        source_procedure: config.source.procedure.clone(),
        source_rows,
        load,
        destination_procedure: config.destination.procedure.clone(),
        elapsed_ms: (Utc::now() - started_at).num_milliseconds(),
    };
    if let Ok(rendered) = serde_json::to_string(&summary) {
        debug!("Transfer summary: {}", rendered);
    }

    Ok(TransferOutcome::Completed(summary))
}

async fn fetch_source(
    config: &TransferConfig,
    provisioner: &ConnectionProvisioner<'_>,
) -> Result<TabularResult, TransferError> {
    let engine = config.source.target.engine.parse::<EngineKind>()?;
    let procedure = config.source.procedure.clone();

    provisioner
        .with_connection(&config.source.target, move |session| {
            Box::pin(async move {
                let result = call_procedure(session, &procedure, engine, true).await?;
                Ok(result.unwrap_or_default())
            })
        })
        .await
}

async fn load_destination(
    config: &TransferConfig,
    provisioner: &ConnectionProvisioner<'_>,
    result: TabularResult,
) -> Result<LoadSummary, TransferError> {
    let engine = config.destination.target.engine.parse::<EngineKind>()?;
    let table = config.staging_table.clone();
    let procedure = config.destination.procedure.clone();
    let batch_size = config.batch_size;

    provisioner
        .with_connection(&config.destination.target, move |session| {
            Box::pin(async move {
                let load = replace_table(result, &table, session, batch_size).await?;
                call_procedure(session, &procedure, engine, false).await?;
                Ok(load)
            })
        })
        .await
}
