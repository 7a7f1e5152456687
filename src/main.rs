//! Hardware gateway daemon.
//!
//! Loads configuration, connects to the device (or a simulated one) and
//! serves client commands until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use hardware_gateway::config::{GatewayConfig, LogFormat, DEFAULT_CONFIG_PATH};
use hardware_gateway::gateway::Gateway;
use hardware_gateway::server::GatewayServer;
use hardware_gateway::transport::{HttpTransport, MockTransport, Transport};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "hardware-gateway", version, about = "Command gateway for the inspection device")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Interface to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Device base URL
    #[arg(long)]
    hardware_url: Option<String>,

    /// Use the built-in simulated device instead of HTTP
    #[arg(long)]
    simulate: bool,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.hardware_url {
            config.hardware.base_url = url.clone();
        }
        if let Some(format) = self.log_format {
            config.application.log_format = format;
        }
    }
}

fn init_tracing(config: &GatewayConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.application.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.application.log_format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = GatewayConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration after CLI overrides")?;

    init_tracing(&config);
    info!(
        name = %config.application.name,
        config = %cli.config.display(),
        "starting"
    );

    let transport: Arc<dyn Transport> = if cli.simulate {
        warn!("using simulated device");
        Arc::new(MockTransport::new())
    } else {
        let transport = HttpTransport::new(config.hardware.base_url.as_str())
            .context("failed to create HTTP client")?;
        info!(base_url = transport.base_url(), "using device endpoint");
        Arc::new(transport)
    };

    let gateway = Gateway::with_shared_transport(transport, config.hardware.retry.clone());
    let server = GatewayServer::bind(&config.server, gateway)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address()))?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("gateway stopped");
    Ok(())
}
