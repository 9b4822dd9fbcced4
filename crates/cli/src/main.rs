mod check_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    herald_channels::ChannelRegistry,
    herald_config::{HeraldConfig, LogFormat, Severity},
    herald_gateway::AppState,
    herald_routing::{ManagerOptions, RouteManager, YamlDirStore},
    tokio::net::TcpListener,
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "herald", about = "Herald, a scheduled alert router", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file. When unset, herald.{yml,yaml,toml,json} is searched for
    /// in the working directory and then /etc/herald/.
    #[arg(short, long, global = true, env = "HERALD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides the config value.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the alert router and its management API (default).
    Serve,
    /// Validate the configuration and persisted alert definitions.
    Check,
}

impl Cli {
    fn log_level<'a>(&'a self, config: &'a HeraldConfig) -> &'a str {
        self.log_level.as_deref().unwrap_or(&config.log_level)
    }

    fn json_logs(&self, config: &HeraldConfig) -> bool {
        self.json_logs || config.log_format == LogFormat::Json
    }

    fn listen_addr(&self, config: &HeraldConfig) -> String {
        let bind = self.bind.as_deref().unwrap_or(&config.server.bind);
        let port = self.port.unwrap_or(config.server.port);
        format!("{bind}:{port}")
    }
}

fn init_telemetry(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the config file if one is found, defaults otherwise.
fn load_config(cli: &Cli) -> anyhow::Result<(HeraldConfig, Option<PathBuf>)> {
    match herald_config::find_config_file(cli.config.as_deref()) {
        Some(path) => {
            let config = herald_config::load_config(&path)?;
            Ok((config, Some(path)))
        },
        None => Ok((HeraldConfig::default(), None)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Check) => check_commands::check(cli.config.as_deref()),
        Some(Commands::Serve) | None => serve(&cli).await,
    }
}

async fn serve(cli: &Cli) -> anyhow::Result<()> {
    let (config, source) = load_config(cli)?;
    init_telemetry(cli.log_level(&config), cli.json_logs(&config));

    match &source {
        Some(path) => info!(path = %path.display(), "loaded config"),
        None => warn!("no config file found, using defaults"),
    }

    let result = herald_config::validate(&config);
    for diag in &result.diagnostics {
        match diag.severity {
            Severity::Error => error!(path = %diag.path, "{}", diag.message),
            Severity::Warning => warn!(path = %diag.path, "{}", diag.message),
        }
    }
    if result.has_errors() {
        anyhow::bail!(
            "configuration has {} error(s), run `herald check` for details",
            result.count(Severity::Error)
        );
    }

    let registry = ChannelRegistry::from_config(&config.channels)
        .context("failed to initialize delivery channels")?;
    info!(channels = registry.len(), "delivery channels ready");

    let store = Arc::new(YamlDirStore::new(&config.alerts_path));
    let options = ManagerOptions::from_config(&config)?;
    let manager = RouteManager::new(Arc::new(registry), store, options);
    let loaded = manager.start().await?;
    info!(alerts = loaded, path = %config.alerts_path, "alert definitions loaded");

    let addr = cli.listen_addr(&config);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let served = herald_gateway::serve(
        listener,
        AppState::new(Arc::clone(&manager)),
        shutdown_signal(),
    )
    .await;
    manager.shutdown().await;
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
