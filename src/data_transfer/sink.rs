use crate::data_transfer::models::{ColumnKind, LoadSummary, StagingColumn};
use crate::data_transfer::session::DatabaseSession;
use crate::db_types::TabularResult;
use crate::error::TransferError;
use log::{debug, error, info};
use serde_json::Value;

fn value_kind(value: &Value) -> Option<ColumnKind> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(ColumnKind::Boolean),
        Value::Number(n) if n.is_i64() => Some(ColumnKind::Integer),
        // Unsigned values past i64::MAX do not fit BIGINT.
        Value::Number(n) if n.is_u64() => Some(ColumnKind::Text),
        Value::Number(_) => Some(ColumnKind::Float),
        _ => Some(ColumnKind::Text),
    }
}

/// Narrowest kind holding every non-null value of a column. All-null
/// columns are text.
pub fn infer_column_kind<'v>(values: impl IntoIterator<Item = &'v Value>) -> ColumnKind {
    let mut inferred: Option<ColumnKind> = None;

    for kind in values.into_iter().filter_map(value_kind) {
        inferred = Some(match (inferred, kind) {
            (None, kind) => kind,
            (Some(current), kind) if current == kind => current,
            (Some(ColumnKind::Integer), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Integer) => ColumnKind::Float,
            _ => return ColumnKind::Text,
        });
    }

    inferred.unwrap_or_default()
}

pub fn infer_staging_columns(result: &TabularResult) -> Vec<StagingColumn> {
    result
        .columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let kind = infer_column_kind(result.rows.iter().filter_map(|row| row.get(index)));
            StagingColumn::new(name.clone(), kind)
        })
        .collect()
}

/// Replaces `table` with the contents of `result`: drop, recreate, then
/// insert in committed batches of at most `batch_size` rows. A failing batch
/// leaves earlier batches in place.
pub async fn replace_table(
    result: TabularResult,
    table: &str,
    session: &mut dyn DatabaseSession,
    batch_size: usize,
) -> Result<LoadSummary, TransferError> {
    let outcome = load(&result, table, session, batch_size).await;
    match outcome {
        Ok(summary) => {
            info!(
                "Data imported to table {} successfully ({} rows)",
                table, summary.rows_written
            );
            Ok(summary)
        }
        Err(message) => {
            error!("Error importing data to table {}: {}", table, message);
            Err(TransferError::Load {
                table: table.to_string(),
                message,
            })
        }
    }
}

async fn load(
    result: &TabularResult,
    table: &str,
    session: &mut dyn DatabaseSession,
    batch_size: usize,
) -> Result<LoadSummary, String> {
    if batch_size == 0 {
        return Err("Batch size must be greater than zero".to_string());
    }
    if table.trim().is_empty() {
        return Err("Table name is required".to_string());
    }
    if result.columns.is_empty() {
        return Err("Result has no columns".to_string());
    }

    let columns = infer_staging_columns(result);
    session.recreate_table(table, &columns).await?;

    let mut summary = LoadSummary {
        table: table.to_string(),
        rows_written: 0,
        batches: 0,
    };
    for chunk in result.rows.chunks(batch_size) {
        session.insert_batch(table, &columns, chunk).await?;
        summary.batches += 1;
        summary.rows_written += chunk.len();
        debug!(
            "Committed batch {} into {} ({}/{} rows)",
            summary.batches,
            table,
            summary.rows_written,
            result.row_count()
        );
    }

    Ok(summary)
}
