//! WildWatch Detection & Alert service (wildwatch-da) - Main entry point
//!
//! Accepts audio samples over HTTP, classifies them through the Classifier
//! Service and sends hazard warnings through the messaging gateway.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wildwatch_da::config::{Settings, SettingsOverrides};
use wildwatch_da::services::spawn_autoplay;
use wildwatch_da::{build_router, AppState};

const MODULE_NAME: &str = "wildwatch-da";

/// Command-line arguments for wildwatch-da
#[derive(Parser, Debug)]
#[command(name = "wildwatch-da")]
#[command(about = "Wildlife detection and alert service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "WILDWATCH_PORT")]
    port: Option<u16>,

    /// Classifier Service base URL
    #[arg(long, env = "WILDWATCH_CLASSIFIER_URL")]
    classifier_endpoint: Option<String>,

    /// Classifier request timeout in milliseconds
    #[arg(long, env = "WILDWATCH_CLASSIFIER_TIMEOUT_MS")]
    classifier_timeout_ms: Option<u64>,

    /// Twilio account SID
    #[arg(long, env = "TWILIO_SID")]
    account_sid: Option<String>,

    /// Twilio auth token
    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Sender number
    #[arg(long, env = "TWILIO_PHONE_NUMBER")]
    from_number: Option<String>,

    /// Delivery channel: whatsapp or sms
    #[arg(long, env = "WILDWATCH_CHANNEL")]
    channel: Option<String>,

    /// Per-recipient delivery timeout in milliseconds
    #[arg(long, env = "WILDWATCH_DELIVERY_TIMEOUT_MS")]
    delivery_timeout_ms: Option<u64>,

    /// Twilio API base URL
    #[arg(long, env = "TWILIO_API_BASE", hide = true)]
    twilio_api_base: Option<String>,

    /// Alert recipients (comma-separated)
    #[arg(long = "recipient", env = "WILDWATCH_RECIPIENTS", value_delimiter = ',')]
    recipients: Vec<String>,

    /// Carousel autoplay interval in milliseconds
    #[arg(long, env = "WILDWATCH_AUTOPLAY_MS")]
    autoplay_ms: Option<u64>,

    /// Carousel transition lockout in milliseconds
    #[arg(long, env = "WILDWATCH_TRANSITION_MS")]
    transition_ms: Option<u64>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, env = "WILDWATCH_LOG")]
    log_level: Option<String>,

    /// Log alerts instead of sending them
    #[arg(long, env = "WILDWATCH_DRY_RUN")]
    dry_run: bool,
}

impl Args {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            port: self.port,
            classifier_endpoint: self.classifier_endpoint.clone(),
            classifier_timeout_ms: self.classifier_timeout_ms,
            account_sid: self.account_sid.clone(),
            auth_token: self.auth_token.clone(),
            from_number: self.from_number.clone(),
            channel: self.channel.clone(),
            delivery_timeout_ms: self.delivery_timeout_ms,
            twilio_api_base: self.twilio_api_base.clone(),
            recipients: self.recipients.clone(),
            autoplay_ms: self.autoplay_ms,
            transition_ms: self.transition_ms,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config file is read before logging starts so its level can apply
    let toml_config = wildwatch_common::config::load_or_default(MODULE_NAME)
        .context("Failed to load config file")?;
    let settings =
        Settings::resolve(args.overrides(), &toml_config).context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting WildWatch Detection & Alert service v{}",
        env!("CARGO_PKG_VERSION")
    );
    if let Some(path) = wildwatch_common::config::config_file_path(MODULE_NAME) {
        info!(path = %path.display(), exists = path.exists(), "Config file");
    }
    info!(
        classifier = %settings.classifier_endpoint,
        channel = %settings.gateway.channel,
        recipients = settings.recipients.len(),
        dry_run = args.dry_run,
        "Configuration resolved"
    );

    let state = AppState::from_settings(&settings, args.dry_run)
        .context("Failed to initialize service")?;

    let autoplay_token = CancellationToken::new();
    let autoplay = spawn_autoplay(
        state.carousel.clone(),
        settings.autoplay,
        autoplay_token.clone(),
    );

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let shutdown_token = autoplay_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_token.cancel();
        })
        .await
        .context("Server error")?;

    autoplay_token.cancel();
    if let Err(e) = autoplay.await {
        error!("Carousel autoplay task failed: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
