use serde::{Deserialize, Serialize};

/// Storage class picked for a staging column from the values it holds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Boolean,
    Integer,
    Float,
    #[default]
    Text,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StagingColumn {
    pub name: String,
    pub kind: ColumnKind,
}

impl StagingColumn {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub table: String,
    pub rows_written: usize,
    pub batches: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub source_procedure: String,
    pub source_rows: usize,
    pub load: LoadSummary,
    pub destination_procedure: String,
    pub elapsed_ms: i64,
}
