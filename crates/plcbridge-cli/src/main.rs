//! `plcbridge` – PLC telemetry bridge.
//!
//! Connects to the MQTT broker, persists every status word and temperature
//! the controllers publish, and serves the stored records plus a control
//! endpoint over HTTP.  Startup:
//!
//! 1. Loads `~/.plcbridge/config.toml` (written with defaults on first run).
//! 2. Opens the SQLite record store and resolves the topic table.
//! 3. Starts the MQTT link.  Inbound messages queue on a bounded bus lane and
//!    are dispatched on the blocking pool, a few at a time; a full queue
//!    pauses the broker poll loop instead of dropping messages.
//! 4. Serves the HTTP API until **Ctrl-C**, then drains the queue.

mod config;
mod telemetry;

use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use plcbridge_api::{ApiServer, ApiState};
use plcbridge_core::{
    CommandPublisher, DEFAULT_MAX_IN_FLIGHT, Dispatcher, HealthService, QueryService,
    TopicCounter, TopicTable, run_ingest,
};
use plcbridge_middleware::{DEFAULT_CAPACITY, MessageBus, MqttLink};
use plcbridge_store::{RecordStore, SqliteRecordStore};

const SERVICE_NAME: &str = "plcbridge";

/// How long shutdown waits for queued messages to be stored.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> ExitCode {
    let guard = telemetry::init_tracing(SERVICE_NAME);
    info!(otlp_export = guard.exporting(), "tracing initialised");

    print_banner();

    let cfg = load_config();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_signal.notify_one();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg, shutdown)) {
        Ok(()) => {
            println!("{}", "  ✓ Bridge stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "bridge failed");
            println!("{}: {}", "Bridge error".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  Default config written to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Config error".red(), e),
            }
            with_env(cfg)
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            with_env(config::Config::default())
        }
    }
}

fn with_env(mut cfg: config::Config) -> config::Config {
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

async fn run(cfg: config::Config, shutdown: Arc<Notify>) -> Result<(), String> {
    if let Some(parent) = Path::new(&cfg.database_path).parent()
        && !parent.exists()
    {
        config::ensure_private_dir(parent)?;
    }
    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteRecordStore::open(&cfg.database_path)
            .map_err(|e| format!("Failed to open database {}: {}", cfg.database_path, e))?,
    );

    let table = TopicTable::from_binding(&cfg.topics).map_err(|e| e.to_string())?;
    if table.is_empty() {
        warn!("no topics bound; nothing will be ingested");
    }
    let topics = table.topics();
    let counter = Arc::new(TopicCounter::new());
    let dispatcher = Arc::new(Dispatcher::new(table, store.clone(), counter.clone()));

    let (bus, inbound) = MessageBus::new(DEFAULT_CAPACITY);
    let ingest_task = tokio::spawn(run_ingest(inbound, dispatcher, DEFAULT_MAX_IN_FLIGHT));
    let settings = cfg.broker.settings();
    info!(?settings, ?topics, "connecting to broker");
    let mut link_tasks = MqttLink::start(&settings, topics, bus.clone());

    let state = Arc::new(ApiState {
        query: QueryService::new(store.clone()),
        commands: CommandPublisher::new(Arc::new(bus)),
        health: HealthService::new(SERVICE_NAME, store, counter),
    });
    let mut api_task = tokio::spawn(ApiServer::new(state).with_port(cfg.api_port).run());

    info!(
        broker = %format!("{}:{}", cfg.broker.host, cfg.broker.port),
        api_port = cfg.api_port,
        database = %cfg.database_path,
        "bridge started"
    );

    let outcome = tokio::select! {
        _ = shutdown.notified() => {
            info!("shutdown requested");
            Ok(())
        }
        result = &mut api_task => match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("API task failed: {e}")),
        },
    };

    // Dropping every bus handle closes the inbound queue; ingest then stores
    // what is already queued and returns.
    api_task.abort();
    link_tasks.shutdown().await;
    match tokio::time::timeout(DRAIN_TIMEOUT, ingest_task).await {
        Ok(Ok(dispatched)) => info!(dispatched, "ingest drained"),
        Ok(Err(e)) => warn!(error = %e, "ingest task failed"),
        Err(_) => warn!(timeout = ?DRAIN_TIMEOUT, "ingest did not drain in time"),
    }
    outcome
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___  __   _____  ___       _    __         "#.bold().cyan());
    println!("{}", r#"  / _ \/ /  / ___/ / _ )____(_)__/ /__ ____  "#.bold().cyan());
    println!("{}", r#" / ___/ /__/ /__  / _  / __/ / _  / _ `/ -_) "#.bold().cyan());
    println!("{}", r#"/_/  /____/\___/ /____/_/ /_/\_,_/\_, /\__/  "#.bold().cyan());
    println!("{}", r#"                                 /___/       "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "plcbridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  MQTT → SQLite telemetry bridge for WAGO and S7 controllers");
    println!();
}
