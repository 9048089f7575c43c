//! fogmeshd: the fogmesh daemon.
//!
//! Single binary that assembles the orchestrator:
//! - Placement resolver (external logic-programming solver)
//! - Infrastructure watcher (platform node stream)
//! - Deployment manager + kubectl provisioner
//! - REST API
//!
//! # Usage
//!
//! ```text
//! fogmeshd run --config /etc/fogmesh/fogmesh.toml --port 8080
//! ```

mod daemon;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fogmeshd", about = "fogmesh placement daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the orchestrator against the configured cluster.
    Run {
        /// Path to fogmesh.toml; built-in defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// API port, overriding `[api] port`.
        #[arg(long)]
        port: Option<u16>,

        /// Directory holding the placement rule files, overriding `[solver] rules_dir`.
        #[arg(long)]
        rules_dir: Option<PathBuf>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        json_logs: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            rules_dir,
            json_logs,
        } => {
            init_tracing(json_logs);
            let config = daemon::load_config(config.as_deref(), port, rules_dir)?;
            daemon::run(config).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fogmeshd=debug,fogmesh=debug"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
