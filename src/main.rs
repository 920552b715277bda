mod api;
mod lifecycle;
#[cfg(test)]
mod testing;
mod webhook;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wabridge_channels::SidecarClient;
use wabridge_core::{
    config::{self, Config, Overrides},
    sanitize::mask_secret,
    traits::SessionClient,
};

use lifecycle::{spawn_event_pump, LifecycleSettings, SessionManager, SessionState};
use webhook::WebhookNotifier;

#[derive(Parser)]
#[command(
    name = "wabridge",
    version,
    about = "HTTP bridge to an automated messaging session"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, env = "WABRIDGE_CONFIG", default_value = "config.toml")]
    config: String,

    /// Shared secret for the API and outbound webhooks.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "HOST")]
    host: Option<String>,

    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Lifecycle webhook endpoint. Empty disables it.
    #[arg(long, env = "WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Forward inbound messages to the webhook.
    #[arg(long, env = "RELAY_MESSAGES")]
    relay_messages: Option<bool>,

    /// WebSocket URL of the automation sidecar.
    #[arg(long, env = "SIDECAR_URL")]
    sidecar_url: Option<String>,

    /// Draw pairing QR codes in the log.
    #[arg(long, env = "LOG_QR")]
    log_qr: Option<bool>,

    /// Directory for daily rolling log files.
    #[arg(long, env = "WABRIDGE_LOG_DIR")]
    log_dir: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_key: self.api_key.clone(),
            host: self.host.clone(),
            port: self.port,
            webhook_url: self.webhook_url.clone(),
            relay_messages: self.relay_messages,
            sidecar_url: self.sidecar_url.clone(),
            log_qr: self.log_qr,
            log_dir: self.log_dir.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge.
    Start,
    /// Print the effective configuration and check the sidecar.
    Status,
}

/// Stdout logging, plus a daily file when `log_dir` is set.
///
/// The returned guard flushes the file writer on drop; keep it alive.
fn init_tracing(level: &str, log_dir: Option<&str>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    match log_dir {
        Some(dir) => {
            let dir = config::shellexpand(dir);
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, "wabridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = config::load(&config::shellexpand(&cli.config))?;
    cfg.apply(cli.overrides());
    Ok(cfg)
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    let _log_guard = init_tracing(&cfg.bridge.log_level, cfg.bridge.log_dir.as_deref())?;

    match cli.command {
        Commands::Start => run(cfg).await?,
        Commands::Status => status(&cli, &cfg).await,
    }

    Ok(())
}

async fn run(cfg: Config) -> anyhow::Result<()> {
    // Refuses to start without the shared secret.
    cfg.validate()?;
    let session_id = cfg.bridge.session_id.clone();
    let notifier = WebhookNotifier::new(&cfg.webhook, &cfg.api.api_key, &session_id)?;
    info!(
        "wabridge starting: session={session_id} sidecar={} webhook={}",
        cfg.sidecar.url,
        if notifier.is_enabled() { "on" } else { "off" }
    );

    let client = Arc::new(SidecarClient::new(cfg.sidecar.clone(), &session_id));
    let events = client.subscribe().await?;
    client.start().await;

    let manager = SessionManager::new(
        client.clone(),
        Arc::new(SessionState::new()),
        notifier,
        LifecycleSettings::from_config(&cfg),
    );
    let pump = spawn_event_pump(manager.clone(), events);

    // First initialize waits for the sidecar so it is not wasted on a dead link.
    let startup = manager.initialize_when_available("startup");

    let state = api::ApiState::new(manager.clone(), &cfg.api.api_key);
    let served = api::serve(&cfg.api, state, shutdown_signal()).await;

    startup.abort();
    manager.shutdown().await;
    client.stop().await;
    pump.abort();

    served?;
    info!("wabridge stopped, session {}", manager.state().connection());
    Ok(())
}

async fn status(cli: &Cli, cfg: &Config) {
    println!("wabridge status\n");
    println!("Config:   {}", cli.config);
    println!("Session:  {}", cfg.bridge.session_id);
    println!("API:      {}:{}", cfg.api.host, cfg.api.port);
    println!("API key:  {}", mask_secret(&cfg.api.api_key));
    println!(
        "Webhook:  {}",
        cfg.webhook.url.as_deref().unwrap_or("disabled")
    );
    println!("Relay:    {}", cfg.webhook.relay_messages);
    if let Err(e) = cfg.validate() {
        println!("\n  config: {e}");
    }
    println!();

    let client = SidecarClient::new(cfg.sidecar.clone(), &cfg.bridge.session_id);
    client.start().await;
    let linked = tokio::time::timeout(Duration::from_secs(3), client.wait_linked())
        .await
        .is_ok();
    if !linked {
        println!("  sidecar {}: unreachable", cfg.sidecar.url);
        client.stop().await;
        return;
    }

    match client.get_state().await {
        Ok(Some(state)) => println!("  sidecar {}: session {state}", cfg.sidecar.url),
        Ok(None) => println!("  sidecar {}: session state unknown", cfg.sidecar.url),
        Err(e) => println!("  sidecar {}: {e}", cfg.sidecar.url),
    }
    client.stop().await;
}
