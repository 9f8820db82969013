//! CLI for mqbroker
//!
//! Subcommands:
//! - `server`: run the broker until Ctrl-C
//! - `client`: send a single request to a running broker

use std::sync::Arc;

use clap::{Parser, Subcommand};
use mqbroker::broker::Broker;
use mqbroker::client::BrokerClient;
use mqbroker::config::load_config;
use mqbroker::protocol::Command;
use mqbroker::transport::start_server;
use mqbroker::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "mqbroker", about = "Minimal in-memory publish/subscribe broker")]
enum Cli {
    /// Start the broker
    Server,
    /// Send one request to a running broker and print the response
    Client {
        /// Broker address
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: String,
        /// Application id sent with every request
        #[arg(long, default_value = "mqbroker-cli")]
        app_id: String,
        #[command(subcommand)]
        action: Action,
    },
}

#[derive(Subcommand)]
enum Action {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Publish { topic: String, message: String },
    Receive { topic: String },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.logging.level);

    let result: Result<(), Box<dyn std::error::Error>> = match cli {
        Cli::Server => {
            let broker = Arc::new(Broker::new());
            start_server(&config, broker, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {e}");
                }
                info!("Shutdown signal received. Exiting gracefully.");
            })
            .await
            .map_err(Into::into)
        }
        Cli::Client {
            addr,
            app_id,
            action,
        } => run_client(&addr, app_id, action).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_client(
    addr: &str,
    app_id: String,
    action: Action,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = BrokerClient::connect(addr, app_id.clone()).await?;

    let command = match action {
        Action::Subscribe { topic } => Command::Subscribe { app_id, topic },
        Action::Unsubscribe { topic } => Command::Unsubscribe { app_id, topic },
        Action::Publish { topic, message } => Command::Publish {
            app_id,
            topic,
            message,
        },
        Action::Receive { topic } => Command::Receive { app_id, topic },
    };
    let response = client.send(&command).await?;

    println!("{response}");
    Ok(())
}
