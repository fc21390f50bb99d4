use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dat_gateway_core::ArchiveKey;
use tokio::io::{duplex, AsyncReadExt, DuplexStream};
use tokio::sync::{broadcast, Notify};
use tracing::debug;

use crate::adapter::{Materialized, SwarmAdapter};

const MATERIALIZE_EVENT_CAPACITY: usize = 256;
const REPLICATION_BUF_SIZE: usize = 64 * 1024;

/// Simulated latency before a freshly-joined key's metadata feed is
/// considered loaded, when no local fixture files are already present.
const COLD_JOIN_LATENCY: Duration = Duration::from_millis(50);
/// Shorter latency when fixture files already exist under `storage_dir`
/// (as though a peer on the local network already had the content).
const WARM_JOIN_LATENCY: Duration = Duration::from_millis(5);

struct JoinState {
    cancel: Arc<Notify>,
}

/// Filesystem-backed stand-in for the Dat/Hypercore archiver and its peer
/// swarm. There is no published Rust crate for the Dat wire protocol, so
/// rather than fabricate one this adapter implements the narrow interface
/// `SwarmAdapter` describes directly: `join` materializes a drive from
/// `storage_dir/<hex-key>/files` (creating it if this is the first time the
/// key has been seen), and `replicate` hands back an opaque duplex byte
/// stream that absorbs whatever a client writes to it, standing in for a
/// remote peer on the other end of the wire.
pub struct FsSwarm {
    storage_dir: PathBuf,
    joined: DashMap<ArchiveKey, JoinState>,
    events: broadcast::Sender<Materialized>,
}

impl FsSwarm {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        let (tx, _rx) = broadcast::channel(MATERIALIZE_EVENT_CAPACITY);
        Self {
            storage_dir: storage_dir.into(),
            joined: DashMap::new(),
            events: tx,
        }
    }

    fn archive_root(&self, key: &ArchiveKey) -> PathBuf {
        self.storage_dir.join(key.to_hex())
    }

    fn files_dir(&self, key: &ArchiveKey) -> PathBuf {
        self.archive_root(key).join("files")
    }
}

#[async_trait]
impl SwarmAdapter for FsSwarm {
    async fn join(&self, key: ArchiveKey) {
        if self.joined.contains_key(&key) {
            return;
        }

        let files_dir = self.files_dir(&key);
        let already_had_content = files_dir.exists();

        if let Err(e) = tokio::fs::create_dir_all(&files_dir).await {
            tracing::error!(key = %key, error = %e, "failed to create archive storage directory");
            return;
        }

        let cancel = Arc::new(Notify::new());
        self.joined.insert(
            key,
            JoinState {
                cancel: Arc::clone(&cancel),
            },
        );

        let latency = if already_had_content {
            WARM_JOIN_LATENCY
        } else {
            COLD_JOIN_LATENCY
        };
        let events = self.events.clone();
        let root = files_dir;

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(latency) => {
                    debug!(key = %key, "archive materialized");
                    let _ = events.send(Materialized { key, root });
                }
                _ = cancel.notified() => {
                    debug!(key = %key, "join cancelled before materialization");
                }
            }
        });
    }

    async fn leave(&self, key: ArchiveKey) {
        if let Some((_, state)) = self.joined.remove(&key) {
            state.cancel.notify_waiters();
        }
    }

    async fn replicate(&self, key: ArchiveKey) -> DuplexStream {
        let (ours, theirs) = duplex(REPLICATION_BUF_SIZE);
        tokio::spawn(async move {
            let mut sink = theirs;
            let mut buf = [0u8; 4096];
            loop {
                match sink.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
            debug!(key = %key, "replication peer stream closed");
        });
        ours
    }

    fn subscribe(&self) -> broadcast::Receiver<Materialized> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn join_materializes_within_readiness_window() {
        let dir = tempfile::tempdir().unwrap();
        let swarm = FsSwarm::new(dir.path());
        let mut rx = swarm.subscribe();
        let key = ArchiveKey::from_bytes([0x55; 32]);

        swarm.join(key).await;

        let event = tokio::time::timeout(StdDuration::from_secs(1), rx.recv())
            .await
            .expect("materialization should happen within timeout")
            .unwrap();
        assert_eq!(event.key, key);
        assert!(event.root.exists());
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let swarm = FsSwarm::new(dir.path());
        let key = ArchiveKey::from_bytes([0x66; 32]);

        swarm.join(key).await;
        swarm.join(key).await;
        assert_eq!(swarm.joined.len(), 1);
    }

    #[tokio::test]
    async fn leave_then_join_issues_a_fresh_join() {
        let dir = tempfile::tempdir().unwrap();
        let swarm = FsSwarm::new(dir.path());
        let key = ArchiveKey::from_bytes([0x77; 32]);

        swarm.join(key).await;
        swarm.leave(key).await;
        assert!(!swarm.joined.contains_key(&key));

        swarm.join(key).await;
        assert!(swarm.joined.contains_key(&key));
    }

    #[tokio::test]
    async fn replicate_absorbs_writes_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let swarm = FsSwarm::new(dir.path());
        let key = ArchiveKey::from_bytes([0x88; 32]);

        let mut stream = swarm.replicate(key).await;
        use tokio::io::AsyncWriteExt;
        stream.write_all(b"hello peer").await.unwrap();
        stream.flush().await.unwrap();
    }
}
