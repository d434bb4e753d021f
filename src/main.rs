// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! opslog main entry point - CLI and commands.

use std::collections::BTreeMap;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::{info, warn};

use opslog::config::{self, CliOptions, ResolvedConfig};
use opslog::dashboard::{self, Dashboard, WatchOptions, RENDER_TAIL};
use opslog::server::{self, HttpBackend};
use opslog::telemetry::{init_telemetry, RingBuffer, TelemetryConfig};
use opslog::types::LevelFilter;

/// opslog version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// opslog - capture a service's logs in memory and tail them over HTTP.
#[derive(Parser)]
#[command(name = "opslog")]
#[command(author, version, about = "In-process log capture and tailing", long_about = None)]
struct Cli {
    /// Show debug output from opslog itself
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available HTTP hosts.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    /// axum Router with a Query extractor
    Axum,
    /// Bare hyper connection loop over a route table
    Hyper,
}

impl From<BackendArg> for HttpBackend {
    fn from(backend: BackendArg) -> Self {
        match backend {
            BackendArg::Axum => HttpBackend::Axum,
            BackendArg::Hyper => HttpBackend::Hyper,
        }
    }
}

/// Subcommands for opslog.
#[derive(Subcommand)]
enum Commands {
    /// Host the /ops/logs endpoint, capturing this process's own logs
    Serve {
        /// HTTP host implementation
        #[arg(short, long, value_enum)]
        backend: Option<BackendArg>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,

        /// Ring buffer capacity
        #[arg(short, long)]
        capacity: Option<usize>,

        /// Service label stamped on every entry
        #[arg(short, long)]
        service: Option<String>,
    },

    /// Poll one or more endpoints and print new entries
    Watch {
        /// Backend to watch, as name=url (repeatable)
        #[arg(short, long = "target", value_name = "NAME=URL")]
        targets: Vec<String>,

        /// Only show entries at exactly this level (DEBUG, INFO, WARNING, ERROR, CRITICAL, ALL)
        #[arg(short, long)]
        level: Option<LevelFilter>,

        /// Poll interval in milliseconds (500-5000)
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Page size per fetch
        #[arg(long)]
        limit: Option<usize>,

        /// Poll once and exit
        #[arg(long)]
        once: bool,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Show version information
    Version,
}

/// Config subcommand actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let workspace_root = std::env::current_dir()?;

    match cli.command {
        Commands::Serve {
            backend,
            host,
            port,
            capacity,
            service,
        } => {
            let cli_options = CliOptions {
                backend: backend.map(HttpBackend::from),
                host,
                port,
                capacity,
                service,
                ..Default::default()
            };
            let config = config::load_config(&workspace_root, cli_options)
                .context("Failed to load configuration")?;
            run_serve(&config, cli.debug).await
        }
        Commands::Watch {
            targets,
            level,
            interval_ms,
            limit,
            once,
        } => {
            let cli_options = CliOptions {
                targets: parse_cli_targets(&targets)?,
                level,
                poll_interval_ms: interval_ms,
                limit,
                ..Default::default()
            };
            let config = config::load_config(&workspace_root, cli_options)
                .context("Failed to load configuration")?;
            run_watch(&config, once, cli.debug).await
        }
        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                let config = config::load_config(&workspace_root, CliOptions::default())?;
                let _guard = init_telemetry(&quiet_telemetry(cli.debug), None)
                    .context("Failed to initialize tracing")?;
                report_warnings(&config);
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
        },
        Commands::Version => {
            println!("opslog {}", VERSION);
            Ok(())
        }
    }
}

fn parse_cli_targets(targets: &[String]) -> anyhow::Result<Option<BTreeMap<String, String>>> {
    if targets.is_empty() {
        return Ok(None);
    }
    let parsed = targets
        .iter()
        .map(|pair| config::parse_target(pair))
        .collect::<Result<BTreeMap<_, _>, _>>()
        .context("Invalid --target")?;
    Ok(Some(parsed))
}

/// Telemetry for commands whose stdout belongs to the user.
fn quiet_telemetry(debug: bool) -> TelemetryConfig {
    if debug {
        TelemetryConfig::development()
    } else {
        TelemetryConfig::production()
    }
}

/// Log problems found while loading config. Call after telemetry is up.
fn report_warnings(config: &ResolvedConfig) {
    for warning in &config.warnings {
        warn!("{}", warning);
    }
}

fn telemetry_config(log_level: &str, debug: bool) -> TelemetryConfig {
    if debug {
        return TelemetryConfig::development();
    }
    let config = TelemetryConfig::default();
    // RUST_LOG wins over the configured level
    if std::env::var("RUST_LOG").is_ok() {
        config
    } else {
        config.with_filter(log_level)
    }
}

async fn run_serve(config: &ResolvedConfig, debug: bool) -> anyhow::Result<()> {
    let settings = &config.server;

    let ring = RingBuffer::new(settings.capacity, settings.service.clone())?.shared();
    let _guard = init_telemetry(&telemetry_config(&settings.log_level, debug), Some(ring.clone()))
        .context("Failed to initialize tracing")?;
    report_warnings(config);

    let addr = settings.bind_addr();
    let listener = server::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        service = %settings.service,
        capacity = settings.capacity,
        host = %ring.host(),
        "opslog {} starting",
        VERSION
    );

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
    };

    server::serve(settings.backend, listener, ring, shutdown).await?;
    Ok(())
}

async fn run_watch(config: &ResolvedConfig, once: bool, debug: bool) -> anyhow::Result<()> {
    // The dashboard owns stdout.
    let _guard =
        init_telemetry(&quiet_telemetry(debug), None).context("Failed to initialize tracing")?;
    report_warnings(config);

    let settings = &config.dashboard;
    if settings.targets.is_empty() {
        anyhow::bail!("No targets configured");
    }

    println!("{}", "📡 opslog watch".bright_blue().bold());
    for (name, url) in &settings.targets {
        println!("  {} {}", format!("{:<16}", name).magenta(), url.dimmed());
    }
    println!(
        "{}",
        format!(
            "level={} interval={}ms limit={}",
            settings.level,
            settings.poll_interval().as_millis(),
            settings.poll_settings().limit
        )
        .dimmed()
    );

    let mut dashboard = Dashboard::new(settings.poll_settings());
    dashboard.sync_backends(&settings.targets);

    let options = WatchOptions {
        interval: settings.poll_interval(),
        once,
        tail: RENDER_TAIL,
    };
    let mut out = std::io::stdout();
    dashboard::watch(&mut dashboard, options, &mut out).await?;
    Ok(())
}
