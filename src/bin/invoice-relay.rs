//! CLI binary for invoice-relay.
//!
//! A thin shim over the library crate: maps flags to `RelayConfig`, sets up
//! logging, and serves the router until Ctrl+C / SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use invoice_relay::{router, AppState, DocumentProcessor, RelayConfig};
use std::fs::{File, OpenOptions};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::signal;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on 0.0.0.0:8000 with credentials from the environment / .env
  invoice-relay

  # Different port, four render workers, explicit pdfium
  invoice-relay --port 9000 --render-workers 4 --pdfium-lib /opt/pdfium/lib/libpdfium.so

  # Submit an invoice
  curl -F file=@invoice.pdf -F 'metadata={"batch":7}' -F token=abc \
       http://localhost:8000/api/process-document

ENVIRONMENT VARIABLES:
  AZURE_ENDPOINT          Document recognition resource URL (required)
  AZURE_KEY               Subscription key for that resource (required)
  PDFIUM_LIB_PATH         Path to libpdfium; system library used when unset
  RUST_LOG                Overrides the default log filter
"#;

/// Relay invoice uploads to a prebuilt document-recognition model.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-relay",
    version,
    about = "Relay invoice uploads to a prebuilt document-recognition model",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "INVOICE_RELAY_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "INVOICE_RELAY_PORT", default_value_t = 8000)]
    port: u16,

    /// Recognition service endpoint, e.g. https://<name>.cognitiveservices.azure.com
    #[arg(long, env = "AZURE_ENDPOINT")]
    endpoint: Option<String>,

    /// Recognition service subscription key.
    #[arg(long, env = "AZURE_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Prebuilt model ID.
    #[arg(long, env = "INVOICE_RELAY_MODEL", default_value = invoice_relay::config::DEFAULT_MODEL_ID)]
    model: String,

    /// REST API version sent with every request.
    #[arg(long, env = "INVOICE_RELAY_API_VERSION", default_value = invoice_relay::config::DEFAULT_API_VERSION)]
    api_version: String,

    /// Maximum concurrent thumbnail renders.
    #[arg(long, env = "INVOICE_RELAY_RENDER_WORKERS", default_value_t = 4)]
    render_workers: usize,

    /// Thumbnail zoom factor relative to the page's natural size.
    #[arg(long, env = "INVOICE_RELAY_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// Deadline for one recognition call, in seconds.
    #[arg(long, env = "INVOICE_RELAY_EXTRACTION_TIMEOUT", default_value_t = 120)]
    extraction_timeout: u64,

    /// Delay between status polls, in milliseconds.
    #[arg(long, env = "INVOICE_RELAY_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Maximum status polls before giving up.
    #[arg(long, env = "INVOICE_RELAY_MAX_POLLS", default_value_t = 120)]
    max_polls: u32,

    /// Request body limit in MiB.
    #[arg(long, env = "INVOICE_RELAY_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Path to an existing libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Append logs to this file as well as stderr.
    #[arg(long, env = "INVOICE_RELAY_LOG_FILE", default_value = "invoice_processor.log")]
    log_file: PathBuf,

    /// Log to stderr only.
    #[arg(long)]
    no_log_file: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_RELAY_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> Result<RelayConfig> {
        let mut builder = RelayConfig::builder()
            .endpoint(self.endpoint.clone().unwrap_or_default())
            .api_key(self.key.clone().unwrap_or_default())
            .model_id(self.model.clone())
            .api_version(self.api_version.clone())
            .render_workers(self.render_workers)
            .render_scale(self.render_scale)
            .extraction_timeout_secs(self.extraction_timeout)
            .poll_interval_ms(self.poll_interval_ms)
            .max_poll_attempts(self.max_polls)
            .max_upload_bytes(self.max_upload_mb.saturating_mul(1024 * 1024));
        if let Some(path) = &self.pdfium_lib {
            builder = builder.pdfium_library(path);
        }
        builder.build().context("Invalid relay configuration")
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open log file {}", path.display()))
}

fn init_logging(cli: &Cli) -> Result<()> {
    let default_filter = if cli.verbose {
        "invoice_relay=debug,tower_http=debug"
    } else {
        "invoice_relay=info,tower_http=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = if cli.no_log_file {
        None
    } else {
        let file = open_log_file(&cli.log_file)?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env values become visible to clap's env fallbacks.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = cli.to_config()?;
    info!(
        "Recognition endpoint {} (model {}, api-version {})",
        config.endpoint, config.model_id, config.api_version
    );

    let processor =
        DocumentProcessor::from_config(&config).context("Failed to initialise processor")?;
    let app = router(AppState::new(processor), config.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;
    info!("invoice-relay listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
