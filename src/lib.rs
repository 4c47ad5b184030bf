//! Copies the rows returned by a MySQL stored procedure into a SQL Server
//! staging table, then runs a follow-up procedure on the SQL Server side.

pub mod config;
pub mod data_transfer;
pub mod db;
pub mod db_types;
pub mod error;
pub mod mssql;
pub mod mysql;

pub use data_transfer::engine::{exit_status, run_transfer, TransferOutcome};
pub use error::TransferError;
