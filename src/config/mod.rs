// =====================================================
// TRANSFER CONFIGURATION
// Built once at startup from the environment (+ optional .env file)
// and passed explicitly to every component.
// =====================================================

use crate::db_types::{Credentials, EngineKind};
use crate::error::TransferError;
use clap::Parser;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MYSQL_USER_VAR: &str = "DB_AMK_USER";
pub const MYSQL_PASSWORD_VAR: &str = "DB_AMK_PASSWORD";
pub const MSSQL_USER_VAR: &str = "DB_MI_USER";
pub const MSSQL_PASSWORD_VAR: &str = "DB_MI_PASSWORD";

pub const DEFAULT_BATCH_SIZE: usize = 5_000;
pub const DEFAULT_ODBC_DRIVER: &str = "ODBC Driver 17 for SQL Server";

const DEFAULT_SOURCE_ENGINE: &str = "mysql";
const DEFAULT_SOURCE_HOST: &str = "10.0.3.21";
const DEFAULT_SOURCE_DATABASE: &str = "arcus_internal";
const DEFAULT_SOURCE_PROCEDURE: &str = "ap_scheduled_data";
const DEFAULT_DESTINATION_ENGINE: &str = "sqlserver";
const DEFAULT_DESTINATION_HOST: &str = "vazmisql03.database.windows.net";
const DEFAULT_DESTINATION_DATABASE: &str = "MI_DStore";
const DEFAULT_STAGING_TABLE: &str = "stg_scheduled_data_import";
const DEFAULT_DESTINATION_PROCEDURE: &str = "ap_scheduled_data_import";

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Environment file loaded before settings are read (default: ./.env if present)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Rows per staging-table insert batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Exit with a non-zero status when the destination phase fails
    #[arg(long)]
    pub strict_destination: bool,
}

/// Where a connection goes. `engine` stays the raw configured tag so an
/// unsupported value is rejected by the provisioner, before any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub engine: String,
    pub host: String,
    pub database: String,
}

impl DatabaseTarget {
    pub fn new(
        engine: impl Into<String>,
        host: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            engine: engine.into(),
            host: host.into(),
            database: database.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub target: DatabaseTarget,
    pub procedure: String,
}

#[derive(Clone, Default, PartialEq, Eq)]
struct CredentialPair {
    username: Option<String>,
    password: Option<String>,
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub source: EndpointConfig,
    pub destination: EndpointConfig,
    pub staging_table: String,
    pub batch_size: usize,
    pub odbc_driver: String,
    pub trust_server_certificate: bool,
    pub connect_timeout: Option<Duration>,
    pub statement_timeout: Option<Duration>,
    pub strict_destination: bool,
    mysql_credentials: CredentialPair,
    mssql_credentials: CredentialPair,
}

/// Loads `path`, or `./.env` when no path is given. A missing default file is
/// not an error; variables already set in the process win.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, TransferError> {
    match path {
        Some(path) => dotenvy::from_path(path)
            .map(|_| Some(path.to_path_buf()))
            .map_err(|e| {
                TransferError::Configuration(format!(
                    "Failed to load environment file {}: {}",
                    path.display(),
                    e
                ))
            }),
        None => match dotenvy::dotenv() {
            Ok(loaded) => Ok(Some(loaded)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(TransferError::Configuration(format!(
                "Failed to load .env file: {}",
                e
            ))),
        },
    }
}

impl TransferConfig {
    pub fn from_env() -> Result<Self, TransferError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, TransferError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = |key: &str, default: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let batch_size = match optional("TRANSFER_BATCH_SIZE") {
            Some(raw) => parse_usize("TRANSFER_BATCH_SIZE", &raw)?,
            None => DEFAULT_BATCH_SIZE,
        };
        let trust_server_certificate = match optional("DB_MI_TRUST_SERVER_CERT") {
            Some(raw) => parse_bool("DB_MI_TRUST_SERVER_CERT", &raw)?,
            None => false,
        };
        let strict_destination = match optional("TRANSFER_STRICT_DESTINATION") {
            Some(raw) => parse_bool("TRANSFER_STRICT_DESTINATION", &raw)?,
            None => false,
        };
        let connect_timeout = optional("TRANSFER_CONNECT_TIMEOUT_SECS")
            .map(|raw| parse_timeout("TRANSFER_CONNECT_TIMEOUT_SECS", &raw))
            .transpose()?
            .flatten();
        let statement_timeout = optional("TRANSFER_STATEMENT_TIMEOUT_SECS")
            .map(|raw| parse_timeout("TRANSFER_STATEMENT_TIMEOUT_SECS", &raw))
            .transpose()?
            .flatten();

        Ok(Self {
            source: EndpointConfig {
                target: DatabaseTarget::new(
                    setting("TRANSFER_SOURCE_ENGINE", DEFAULT_SOURCE_ENGINE),
                    setting("TRANSFER_SOURCE_HOST", DEFAULT_SOURCE_HOST),
                    setting("TRANSFER_SOURCE_DATABASE", DEFAULT_SOURCE_DATABASE),
                ),
                procedure: setting("TRANSFER_SOURCE_PROCEDURE", DEFAULT_SOURCE_PROCEDURE),
            },
            destination: EndpointConfig {
                target: DatabaseTarget::new(
                    setting("TRANSFER_DESTINATION_ENGINE", DEFAULT_DESTINATION_ENGINE),
                    setting("TRANSFER_DESTINATION_HOST", DEFAULT_DESTINATION_HOST),
                    setting("TRANSFER_DESTINATION_DATABASE", DEFAULT_DESTINATION_DATABASE),
                ),
                procedure: setting(
                    "TRANSFER_DESTINATION_PROCEDURE",
                    DEFAULT_DESTINATION_PROCEDURE,
                ),
            },
            staging_table: setting("TRANSFER_STAGING_TABLE", DEFAULT_STAGING_TABLE),
            batch_size,
            odbc_driver: setting("DB_MI_ODBC_DRIVER", DEFAULT_ODBC_DRIVER),
            trust_server_certificate,
            connect_timeout,
            statement_timeout,
            strict_destination,
            mysql_credentials: CredentialPair {
                username: optional(MYSQL_USER_VAR),
                password: lookup(MYSQL_PASSWORD_VAR),
            },
            mssql_credentials: CredentialPair {
                username: optional(MSSQL_USER_VAR),
                password: lookup(MSSQL_PASSWORD_VAR),
            },
        })
    }

    pub fn merge_cli(&mut self, args: &CliArgs) {
        if let Some(batch_size) = args.batch_size {
            self.batch_size = batch_size;
        }
        if args.strict_destination {
            self.strict_destination = true;
        }
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        if self.batch_size == 0 {
            return Err(TransferError::Configuration(
                "Batch size must be greater than zero".to_string(),
            ));
        }
        if self.staging_table.trim().is_empty() {
            return Err(TransferError::Configuration(
                "Staging table name is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Credentials for `engine`. Checked lazily so a missing destination
    /// secret does not block the source fetch.
    pub fn credentials_for(&self, engine: EngineKind) -> Result<Credentials, TransferError> {
        let (pair, user_var, password_var) = match engine {
            EngineKind::MySQL => (&self.mysql_credentials, MYSQL_USER_VAR, MYSQL_PASSWORD_VAR),
            EngineKind::MSSQL => (&self.mssql_credentials, MSSQL_USER_VAR, MSSQL_PASSWORD_VAR),
        };

        let username = pair
            .username
            .clone()
            .ok_or_else(|| TransferError::Configuration(format!("{} is not set", user_var)))?;
        let password = pair
            .password
            .clone()
            .ok_or_else(|| TransferError::Configuration(format!("{} is not set", password_var)))?;

        Ok(Credentials::new(username, password))
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, TransferError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TransferError::Configuration(format!(
            "Invalid {} value '{}': expected true or false",
            key, raw
        ))),
    }
}

fn parse_usize(key: &str, raw: &str) -> Result<usize, TransferError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| TransferError::Configuration(format!("Invalid {} value '{}': {}", key, raw, e)))
}

/// Zero disables the timeout.
fn parse_timeout(key: &str, raw: &str) -> Result<Option<Duration>, TransferError> {
    let seconds = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| TransferError::Configuration(format!("Invalid {} value '{}': {}", key, raw, e)))?;
    Ok((seconds > 0).then(|| Duration::from_secs(seconds)))
}
