// =====================================================
// TRANSFER ERROR TAXONOMY
// =====================================================

use thiserror::Error;

/// Failure classes of a transfer run. Driver modules report plain strings;
/// the provisioner, executor and loader wrap them here with the name of the
/// database, procedure or table involved.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Bad or missing setting. Raised before any network I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection to database '{database}' failed: {message}")]
    Connectivity { database: String, message: String },

    #[error("Stored procedure '{procedure}' failed: {message}")]
    Execution { procedure: String, message: String },

    #[error("Loading table '{table}' failed: {message}")]
    Load { table: String, message: String },
}

impl TransferError {
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::Configuration(_) => "configuration",
            TransferError::Connectivity { .. } => "connectivity",
            TransferError::Execution { .. } => "execution",
            TransferError::Load { .. } => "load",
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, TransferError::Configuration(_))
    }
}
