use clap::Parser;
use log::{error, info};
use staging_transfer::config::{load_env_file, CliArgs, TransferConfig};
use staging_transfer::data_transfer::session::DriverConnector;
use staging_transfer::{exit_status, run_transfer};
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CliArgs::parse();

    // Loaded before the logger so RUST_LOG may come from the file.
    let env_file = load_env_file(args.env_file.as_deref());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match env_file {
        Ok(Some(path)) => info!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }

    let mut config = match TransferConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            process::exit(1);
        }
    };
    config.merge_cli(&args);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    let connector = DriverConnector {
        connect_timeout: config.connect_timeout,
        statement_timeout: config.statement_timeout,
        trust_server_certificate: config.trust_server_certificate,
    };

    let outcome = run_transfer(&config, &connector).await;
    if let Err(e) = &outcome {
        error!("Transfer aborted ({}): {}", e.kind(), e);
    }

    let (code, completed) = exit_status(&outcome, config.strict_destination);
    if completed {
        println!("completed");
    }
    if code != 0 {
        process::exit(code);
    }
}
