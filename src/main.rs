//! waitwatch - park wait-time client
//!
//! Command-line front end over the library core. Every subcommand calls the
//! same operations a UI would: refresh the presentation state, toggle a
//! favorite, arm or remove alerts, or run the alert checker.
//!
//! Module structure:
//! - `domain/` - Attraction, alert and view-ordering types
//! - `io/` - External interfaces (HTTP source, key-value store, notifier, Prometheus)
//! - `services/` - Repository, cache, presentation state, alerts
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use waitwatch::domain::{SortDirection, SortType, WaitTimeAlert};
use waitwatch::infra::{Config, Metrics};
use waitwatch::io::{FileStore, HttpWaitTimeSource, JsonlNotifier, KeyValueStore, LogNotifier, Notifier};
use waitwatch::services::{
    AlertChecker, AlertStore, CheckOutcome, PresentationState, RefreshOutcome, UiState, WaitTimeCache,
    WaitTimeRepository,
};

/// Park wait-time client with favorites and wait-time alerts
#[derive(Parser, Debug)]
#[command(
    name = "waitwatch",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about
)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/waitwatch.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print the current wait times
    List {
        /// Only show attractions that are open
        #[arg(long)]
        only_open: bool,
        #[arg(long, value_enum, default_value_t = SortArg::Name)]
        sort: SortArg,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Bypass the cache freshness window
        #[arg(long)]
        force: bool,
    },
    /// Toggle an attraction as favorite
    Favorite { code: String },
    /// Manage wait-time alerts
    Alert {
        #[command(subcommand)]
        action: AlertAction,
    },
    /// Run a single alert check
    Check,
    /// Run the alert checker until Ctrl+C
    Watch,
}

#[derive(Subcommand, Debug)]
enum AlertAction {
    /// Arm (or replace) the alert for an attraction
    Set {
        code: String,
        /// Target wait time in minutes
        target: u32,
        /// Display name; looked up in the cached list when omitted
        #[arg(long)]
        name: Option<String>,
    },
    Remove { code: String },
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Name,
    Wait,
}

impl From<SortArg> for SortType {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortType::Name,
            SortArg::Wait => SortType::WaitTime,
        }
    }
}

/// Components shared by every subcommand
struct App {
    config: Config,
    store: Arc<dyn KeyValueStore>,
    metrics: Arc<Metrics>,
    repository: Arc<WaitTimeRepository>,
    alerts: Arc<AlertStore>,
}

impl App {
    fn build(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.storage_path()));
        let metrics = Arc::new(Metrics::new());
        let source = HttpWaitTimeSource::from_config(&config).context("Failed to build HTTP client")?;
        info!(url = %source.url(), park = %config.api_park(), "source_initialized");
        let repository = Arc::new(
            WaitTimeRepository::new(Arc::new(source), WaitTimeCache::new(store.clone()), metrics.clone())
                .with_cache_ttl(config.cache_ttl()),
        );
        let alerts = Arc::new(AlertStore::new(store.clone()));
        Ok(Self { config, store, metrics, repository, alerts })
    }

    fn notifier(&self) -> Arc<dyn Notifier> {
        match self.config.notifications_file() {
            Some(path) => Arc::new(JsonlNotifier::new(path)),
            None => Arc::new(LogNotifier),
        }
    }

    fn checker(&self) -> AlertChecker {
        AlertChecker::new(
            self.repository.clone(),
            self.alerts.clone(),
            self.notifier(),
            self.metrics.clone(),
            self.config.check_interval(),
        )
    }

    fn presentation(&self) -> PresentationState {
        PresentationState::new(self.repository.clone(), self.store.clone())
    }
}

fn init_logging(json: bool) {
    // Default: WARN so command output stays readable, RUST_LOG=info for events
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_list(state: &UiState) {
    for item in &state.wait_times {
        let star = if state.preferences.is_favorite(&item.code) { "*" } else { " " };
        let wait = if item.is_open() { format!("{:>3} min", item.wait_time_minutes) } else { "   -   ".to_string() };
        println!("{} {:<6} {:<40} {} {}", star, item.code, item.name, wait, item.status);
    }

    if let Some(updated) = state.last_updated {
        println!("last updated: {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if state.is_offline_data {
        println!("offline: showing cached data");
    }
    if let Some(error) = &state.error {
        eprintln!("{}", error);
    }
}

async fn run_list(app: &App, only_open: bool, sort: SortArg, desc: bool, force: bool) -> anyhow::Result<()> {
    let presentation = app.presentation();
    let direction = if desc { SortDirection::Descending } else { SortDirection::Ascending };
    presentation.set_filter_only_open(only_open);
    presentation.change_sort_order(sort.into(), direction);

    let outcome = presentation.refresh(force).await;
    let state = presentation.state();
    print_list(&state);

    if outcome == RefreshOutcome::Failed && state.wait_times.is_empty() {
        anyhow::bail!("no wait times available");
    }
    Ok(())
}

/// Name for a new alert: explicit, else from the cached list, else the code
fn resolve_alert_name(app: &App, code: &str, name: Option<String>) -> String {
    if let Some(name) = name {
        return name;
    }
    app.repository
        .cache()
        .load()
        .ok()
        .flatten()
        .and_then(|entry| entry.payload.into_iter().find(|item| item.code == code))
        .map(|item| item.name)
        .unwrap_or_else(|| code.to_string())
}

fn run_alert(app: &App, action: AlertAction) -> anyhow::Result<()> {
    match action {
        AlertAction::Set { code, target, name } => {
            let name = resolve_alert_name(app, &code, name);
            app.alerts
                .upsert(WaitTimeAlert::new(&code, &name, target))
                .with_context(|| format!("Failed to arm alert for {}", code))?;
            println!("alert armed: {} ({}) at {} min or less", name, code, target);
        }
        AlertAction::Remove { code } => {
            if app.alerts.remove(&code).with_context(|| format!("Failed to remove alert for {}", code))? {
                println!("alert removed: {}", code);
            } else {
                println!("no alert for {}", code);
            }
        }
        AlertAction::List => {
            let alerts = app.alerts.get_all().context("Failed to read alerts")?;
            if alerts.is_empty() {
                println!("no alerts armed");
            }
            for alert in alerts {
                println!("{:<6} {:<40} <= {} min", alert.attraction_code, alert.attraction_name, alert.target_time);
            }
        }
    }
    Ok(())
}

async fn run_check(app: &App) -> anyhow::Result<()> {
    match app.checker().run_once().await {
        CheckOutcome::NoAlerts => println!("no alerts armed"),
        CheckOutcome::Evaluated { fired, source } => {
            for f in &fired {
                println!(
                    "fired: {} ({} min, target {})",
                    f.alert.attraction_name, f.attraction.wait_time_minutes, f.alert.target_time
                );
            }
            println!("{} alert(s) fired ({} data)", fired.len(), source.as_str());
        }
        CheckOutcome::Failed { reason } => anyhow::bail!("alert check failed: {}", reason),
    }
    Ok(())
}

async fn run_watch(app: &App) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start Prometheus metrics HTTP server (if port > 0)
    let metrics_port = app.config.metrics_port();
    if metrics_port > 0 {
        let prom_metrics = app.metrics.clone();
        let prom_park = app.config.api_park().to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) =
                waitwatch::io::prometheus::start_metrics_server(metrics_port, prom_metrics, prom_park, prom_shutdown)
                    .await
            {
                tracing::error!(error = %e, "Prometheus metrics server error");
            }
        });
    }

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    app.checker().run(shutdown_rx).await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(|| Config::resolve_config_path(&[]));
    let (config, config_error) = Config::load_from_path(&config_path);

    init_logging(config.log_json());
    if let Some(e) = config_error {
        warn!(config_file = %config_path, error = %format!("{:#}", e), "config_defaults_used");
    }
    info!(
        config_file = %config.config_file(),
        storage = %config.storage_path(),
        "config_loaded"
    );

    let app = App::build(config)?;

    match args.command {
        Command::List { only_open, sort, desc, force } => run_list(&app, only_open, sort, desc, force).await,
        Command::Favorite { code } => {
            let now_favorite = app.presentation().toggle_favorite(&code);
            println!("{} {}", code, if now_favorite { "added to favorites" } else { "removed from favorites" });
            Ok(())
        }
        Command::Alert { action } => run_alert(&app, action),
        Command::Check => run_check(&app).await,
        Command::Watch => run_watch(&app).await,
    }
}
