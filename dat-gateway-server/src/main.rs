mod supervisor;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use dat_gateway_core::GatewayConfig;
use tracing::info;

use supervisor::GatewaySupervisor;

#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// dat-gateway: an HTTP and WebSocket gateway onto the Dat archive network.
#[derive(Parser, Debug)]
#[command(name = "dat-gateway", about = "HTTP/WebSocket gateway onto the Dat network")]
struct Cli {
    /// Path to a YAML config file, merged under DAT_GATEWAY_* env overrides.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the swarm adapter persists archive content under.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Maximum number of resident archives.
    #[arg(long)]
    max: Option<usize>,

    /// TTL in milliseconds for idle archives.
    #[arg(long)]
    ttl: Option<u64>,

    /// TTL sweep period in milliseconds.
    #[arg(long)]
    period: Option<u64>,

    /// Enable subdomain-based addressing and redirect-to-subdomain.
    #[arg(long)]
    redirect: bool,

    /// Listener port, overriding the configured host's port.
    #[arg(long)]
    port: Option<u16>,
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as usize);
        libc::signal(libc::SIGINT, signal_handler as usize);
    }
}

fn main() -> anyhow::Result<()> {
    dat_gateway_observability::init_tracing();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = GatewayConfig::load(cli.config.as_deref())?;

    if let Some(dir) = cli.dir {
        config.storage_dir = dir;
    }
    if let Some(max) = cli.max {
        config.max = max;
    }
    if let Some(ttl) = cli.ttl {
        config.ttl_ms = Some(ttl);
    }
    if let Some(period) = cli.period {
        config.sweep_period_ms = Some(period);
    }
    if cli.redirect {
        config.redirect = true;
    }
    if let Some(port) = cli.port {
        config.listen_addr.set_port(port);
    }

    let supervisor = std::sync::Arc::new(GatewaySupervisor::load(config).await?);
    install_signal_handlers();

    info!(addr = %supervisor.listen_addr(), "dat-gateway listening");

    let listener_supervisor = std::sync::Arc::clone(&supervisor);
    let listener_task = tokio::spawn(async move { listener_supervisor.listen().await });

    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("shutdown signal received");
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    supervisor.close().await;
    listener_task.await??;
    Ok(())
}
