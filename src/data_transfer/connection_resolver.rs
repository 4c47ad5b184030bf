use crate::config::{DatabaseTarget, TransferConfig};
use crate::data_transfer::session::{Connector, DatabaseSession};
use crate::db::connection_url::connection_url;
use crate::db_types::{ConnectionDescriptor, EngineKind};
use crate::error::TransferError;
use futures::future::BoxFuture;
use log::{error, info, warn};

/// Turns configured targets into live sessions. Every session it hands out
/// is wrapped in a [`ConnectionScope`] so it is released exactly once.
pub struct ConnectionProvisioner<'a> {
    config: &'a TransferConfig,
    connector: &'a dyn Connector,
}

impl<'a> ConnectionProvisioner<'a> {
    pub fn new(config: &'a TransferConfig, connector: &'a dyn Connector) -> Self {
        Self { config, connector }
    }

    /// Validates `target` and builds its connection URL. Performs no I/O.
    pub fn descriptor(&self, target: &DatabaseTarget) -> Result<ConnectionDescriptor, TransferError> {
        let engine = target.engine.parse::<EngineKind>()?;

        let database = target.database.trim();
        if database.is_empty() {
            return Err(TransferError::Configuration(
                "Database name is required".to_string(),
            ));
        }
        let host = target.host.trim();
        if host.is_empty() {
            return Err(TransferError::Configuration(format!(
                "Host is required for database '{}'",
                database
            )));
        }

        let credentials = self.config.credentials_for(engine)?;
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(TransferError::Configuration(format!(
                "Credentials for {} are empty",
                engine
            )));
        }

        let url = connection_url(engine, &self.config.odbc_driver, host, database, &credentials);
        Ok(ConnectionDescriptor::new(engine, host, database, url))
    }

    pub async fn open(&self, target: &DatabaseTarget) -> Result<ConnectionScope, TransferError> {
        let database = target.database.trim().to_string();

        let descriptor = self.descriptor(target).inspect_err(|e| {
            error!("Error setting up database connection for {}: {}", database, e);
        })?;

        match self.connector.connect(&descriptor).await {
            Ok(session) => Ok(ConnectionScope {
                database,
                session: Some(session),
            }),
            Err(message) => {
                error!(
                    "Error setting up database connection for {}: {}",
                    database, message
                );
                Err(TransferError::Connectivity { database, message })
            }
        }
    }

    /// Opens a session for `target`, runs `body` with it and releases it
    /// whether `body` succeeds or not.
    pub async fn with_connection<T, F>(
        &self,
        target: &DatabaseTarget,
        body: F,
    ) -> Result<T, TransferError>
    where
        F: for<'s> FnOnce(&'s mut dyn DatabaseSession) -> BoxFuture<'s, Result<T, TransferError>>,
    {
        let mut scope = self.open(target).await?;
        let outcome = scope.run(body).await;
        scope.release().await;
        outcome
    }
}

/// Owns one open session. `release` closes it on the normal path; `Drop`
/// covers panics and cancelled futures.
pub struct ConnectionScope {
    database: String,
    session: Option<Box<dyn DatabaseSession>>,
}

impl ConnectionScope {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn run<T, F>(&mut self, body: F) -> Result<T, TransferError>
    where
        F: for<'s> FnOnce(&'s mut dyn DatabaseSession) -> BoxFuture<'s, Result<T, TransferError>>,
    {
        match self.session.as_deref_mut() {
            Some(session) => body(session).await,
            None => Err(TransferError::Connectivity {
                database: self.database.clone(),
                message: "Connection already released".to_string(),
            }),
        }
    }

    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Closing connection for {} reported: {}", self.database, e);
            }
            info!("Database connection for {} closed.", self.database);
        }
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session);
            info!("Database connection for {} closed.", self.database);
        }
    }
}
