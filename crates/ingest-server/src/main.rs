use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use ingest::{Config, Server};
use ingest_server::{app::app, serve};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ingest-server")]
#[command(version, about = "Ingest - event-driven router", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "ingest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo application over HTTP (default)
    Serve {
        /// Host to bind, overrides [server] host
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overrides [server] port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Emit an event once and print the StatusResponse as JSON
    Resolve {
        /// Event name, e.g. "GET /blog/john/articles"
        event: String,

        /// Request data as a JSON object
        #[arg(short, long)]
        data: Option<String>,
    },

    /// List registered events and routes
    Routes,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    let server = Server::from_config(&config)?;
    server.use_plugin(app)?;

    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(server, &config.server).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve { event, data } => {
            let data = match data {
                Some(raw) => serde_json::from_str(&raw)
                    .with_context(|| format!("--data is not valid JSON: {}", raw))?,
                None => serde_json::json!({}),
            };
            let response = server.resolve(&event, data).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(if response.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Routes => {
            for key in server.keys() {
                println!("  {}", key);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
