use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dat_gateway_core::{GatewayConfig, Resolver};
use dat_gateway_http::GatewayService;
use dat_gateway_registry::Registry;
use dat_gateway_swarm::FsSwarm;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::info;

/// Constructs the resolver, registry, and swarm adapter; owns the listener
/// and the TTL sweeper; sequences startup and shutdown.
///
/// `close()` is the single teardown path spec.md §9 asks for in place of
/// the source's two shadowing `close` methods: cancel the sweeper, stop the
/// listener, and leave every resident archive's swarm membership.
pub struct GatewaySupervisor {
    config: Arc<GatewayConfig>,
    registry: Arc<Registry<FsSwarm>>,
    service: Arc<GatewayService<FsSwarm>>,
    shutdown: Arc<Notify>,
    sweeper: Option<JoinHandle<()>>,
}

impl GatewaySupervisor {
    pub async fn load(config: GatewayConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let resolver = Arc::new(Resolver::new());
        let swarm = Arc::new(FsSwarm::new(config.storage_dir.clone()));
        let registry = Arc::new(Registry::from_config(Arc::clone(&swarm), &config));
        let service = Arc::new(GatewayService::new(
            Arc::clone(&resolver),
            Arc::clone(&registry),
            Arc::clone(&swarm),
            Arc::clone(&config),
        ));

        let sweeper = config.ttl_enabled().then(|| {
            let period = Duration::from_millis(config.sweep_period_ms.expect("validated by ttl_enabled"));
            info!(period_ms = config.sweep_period_ms.unwrap(), ttl_ms = config.ttl_ms.unwrap(), "ttl sweeper enabled");
            registry.spawn_ttl_sweeper(period)
        });

        Ok(Self {
            config,
            registry,
            service,
            shutdown: Arc::new(Notify::new()),
            sweeper,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.config.listen_addr
    }

    /// Binds the listener and serves until `close()` is called.
    pub async fn listen(&self) -> anyhow::Result<()> {
        dat_gateway_http::serve(
            self.config.listen_addr,
            Arc::clone(&self.service),
            Arc::clone(&self.shutdown),
        )
        .await?;
        Ok(())
    }

    /// Stops accepting connections, cancels the sweeper, and removes every
    /// resident key (which leaves its swarm membership).
    pub async fn close(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
        self.shutdown.notify_waiters();
        for key in self.registry.list() {
            self.registry.remove(key).await;
        }
        info!("gateway supervisor closed");
    }
}
