use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

use lanspeed::config::{mb_to_bytes, ProbeConfig};
use lanspeed::console::ConsoleObserver;
use lanspeed::menu::Menu;
use lanspeed::network;
use lanspeed::session::{Orchestrator, SessionConfig};
use lanspeed::throughput::engine::NullObserver;
use lanspeed::throughput::report::format_report;

#[derive(Parser)]
#[command(
    name = "lanspeed",
    about = "Raw TCP throughput probe for local networks",
    version,
    long_about = None
)]
struct Cli {
    /// TOML config file (otherwise LANSPEED_CONFIG or /etc/lanspeed/lanspeed.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Defaults to the interactive menu
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for one client and measure inbound throughput
    Server {
        /// Listening port
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Connect to a server and measure outbound throughput
    Client {
        /// Server address
        #[arg(long)]
        host: String,

        /// Server port
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        port: Option<u16>,

        /// Payload size in MB
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        size_mb: Option<u64>,

        /// Give up connecting after this many milliseconds
        #[arg(long)]
        connect_timeout_ms: Option<u64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Check that a server port accepts TCP connections
    Check {
        /// Server address
        #[arg(long)]
        host: String,

        /// Server port
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        port: Option<u16>,

        /// Timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Interactive server/client menu
    Menu,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing before config loads so fallback warnings are seen;
    // stdout is reserved for progress and reports.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let has_env_filter = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::load_or_default(),
    };

    // RUST_LOG wins over the configured level.
    if !has_env_filter {
        filter_handle.reload(EnvFilter::new(&config.logging.level))?;
    }

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Server { port, bind, json } => {
            let mut session = SessionConfig::server(&config)?;
            if let Some(port) = port {
                session = session.with_port(port);
            }
            if let Some(bind) = bind {
                session = session.with_bind_address(bind);
            }
            tracing::info!(port = session.port(), "Running server session");
            run_once(&session, json).await?;
        }
        Commands::Client {
            host,
            port,
            size_mb,
            connect_timeout_ms,
            json,
        } => {
            let payload_bytes = match size_mb {
                Some(mb) => mb_to_bytes(mb)?,
                None => config.default_payload_bytes()?,
            };
            let mut session = SessionConfig::client(&config, &host, payload_bytes)?;
            if let Some(port) = port {
                session = session.with_port(port);
            }
            if let Some(ms) = connect_timeout_ms {
                session = session.with_connect_timeout((ms > 0).then(|| Duration::from_millis(ms)));
            }
            tracing::info!(%host, port = session.port(), payload_bytes, "Running client session");
            run_once(&session, json).await?;
        }
        Commands::Check {
            host,
            port,
            timeout_ms,
        } => {
            let port = port.unwrap_or(config.network.port);
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.network.check_timeout());
            if network::check_connectivity(&host, port, timeout).await {
                println!("{}:{} is reachable", host, port);
            } else {
                anyhow::bail!("{}:{} is not reachable", host, port);
            }
        }
        Commands::Menu => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut menu = Menu::new(stdin, std::io::stdout(), config);
            menu.run().await?;
        }
    }

    Ok(())
}

/// Run one session and print its report.
async fn run_once(session: &SessionConfig, json: bool) -> Result<()> {
    let mut orchestrator = Orchestrator::new();

    let evaluation = if json {
        orchestrator.run(session, &mut NullObserver).await?
    } else {
        let mut console = ConsoleObserver::new(std::io::stdout());
        orchestrator.run(session, &mut console).await?
    };
    orchestrator.terminate();

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        println!();
        print!("{}", format_report(&evaluation));
    }
    Ok(())
}
