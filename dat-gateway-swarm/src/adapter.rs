use std::path::PathBuf;

use async_trait::async_trait;
use dat_gateway_core::ArchiveKey;
use tokio::io::DuplexStream;
use tokio::sync::broadcast;

/// Fired once a joined key's metadata feed is opened and its header block
/// loaded — the only concurrency-safe way to observe that an archive is
/// ready to serve reads (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct Materialized {
    pub key: ArchiveKey,
    /// Directory the materialized drive should be served from.
    pub root: PathBuf,
}

/// Wraps the external content-addressed archiver and its peer swarm.
///
/// This is the narrow interface spec.md §1 asks for: the real Dat/Hypercore
/// wire protocol and peer discovery are out of scope for this gateway, so
/// the only implementation in this crate (`FsSwarm`) simulates membership
/// and materialization without a real P2P network.
#[async_trait]
pub trait SwarmAdapter: Send + Sync {
    /// Begin replication for `key`. Idempotent.
    async fn join(&self, key: ArchiveKey);

    /// Stop replication for `key` and close its peers. Idempotent.
    async fn leave(&self, key: ArchiveKey);

    /// Open a bidirectional replication stream usable to proxy a remote
    /// peer's bytes (used by the WebSocket front end).
    async fn replicate(&self, key: ArchiveKey) -> DuplexStream;

    /// Subscribe to `materialized` events for all keys.
    fn subscribe(&self) -> broadcast::Receiver<Materialized>;
}
