// =====================================================
// COMMON DATABASE TYPES AND STRUCTURES
// =====================================================

use crate::error::TransferError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- Engine Kind ---

/// The two database vendors a transfer can talk to. Every dialect decision
/// (connection string, call syntax, quoting, DDL) matches on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    MySQL,
    MSSQL,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::MySQL => "mysql",
            EngineKind::MSSQL => "sqlserver",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            EngineKind::MySQL => 3306,
            EngineKind::MSSQL => 1433,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = TransferError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(EngineKind::MySQL),
            "sqlserver" | "mssql" => Ok(EngineKind::MSSQL),
            other => Err(TransferError::Configuration(format!(
                "Unsupported database type: {}",
                other
            ))),
        }
    }
}

// --- Tabular Result ---

/// Column names plus rows aligned to them, in the order the engine returned
/// them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

// --- Credentials ---

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// --- Connection Descriptor ---

/// Everything needed for one connection attempt. The URL embeds the
/// credentials, so it is only handed to drivers and never rendered by
/// `Debug`.
#[derive(Clone)]
pub struct ConnectionDescriptor {
    pub engine: EngineKind,
    pub host: String,
    pub database: String,
    url: String,
}

impl ConnectionDescriptor {
    pub fn new(
        engine: EngineKind,
        host: impl Into<String>,
        database: impl Into<String>,
        url: String,
    ) -> Self {
        Self {
            engine,
            host: host.into(),
            database: database.into(),
            url,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("database", &self.database)
            .field("url", &"<redacted>")
            .finish()
    }
}
