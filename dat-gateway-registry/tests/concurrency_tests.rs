use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dat_gateway_core::ArchiveKey;
use dat_gateway_registry::Registry;
use dat_gateway_swarm::{Materialized, SwarmAdapter};
use tokio::io::duplex;
use tokio::sync::broadcast;

/// A `SwarmAdapter` that counts `join` calls per key and materializes keys
/// on a short fixed delay, so tests can assert the at-most-once-concurrent
/// admission property without the real timing noise of `FsSwarm`.
struct CountingSwarm {
    join_count: AtomicUsize,
    events: broadcast::Sender<Materialized>,
}

impl CountingSwarm {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            join_count: AtomicUsize::new(0),
            events: tx,
        }
    }
}

#[async_trait]
impl SwarmAdapter for CountingSwarm {
    async fn join(&self, key: ArchiveKey) {
        self.join_count.fetch_add(1, Ordering::SeqCst);
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = events.send(Materialized {
                key,
                root: PathBuf::from("/tmp/does-not-matter"),
            });
        });
    }

    async fn leave(&self, _key: ArchiveKey) {}

    async fn replicate(&self, _key: ArchiveKey) -> tokio::io::DuplexStream {
        let (ours, _theirs) = duplex(1024);
        ours
    }

    fn subscribe(&self) -> broadcast::Receiver<Materialized> {
        self.events.subscribe()
    }
}

#[tokio::test]
async fn concurrent_get_or_admit_for_same_key_joins_exactly_once() {
    let swarm = Arc::new(CountingSwarm::new());
    let registry = Arc::new(Registry::new(
        Arc::clone(&swarm),
        10,
        Duration::from_secs(1),
        None,
    ));
    let key = ArchiveKey::from_bytes([0x42; 32]);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move { registry.get_or_admit(key).await }));
    }

    for handle in handles {
        let live = handle.await.unwrap().expect("admission should succeed");
        assert_eq!(live.key, key);
    }

    assert_eq!(swarm.join_count.load(Ordering::SeqCst), 1);
    assert_eq!(registry.list(), vec![key]);
}

#[tokio::test]
async fn racing_admissions_for_distinct_keys_do_not_serialize() {
    let swarm = Arc::new(CountingSwarm::new());
    let registry = Arc::new(Registry::new(swarm, 10, Duration::from_secs(1), None));

    let a = ArchiveKey::from_bytes([0x01; 32]);
    let b = ArchiveKey::from_bytes([0x02; 32]);

    let ra = Arc::clone(&registry);
    let rb = Arc::clone(&registry);
    let (live_a, live_b) = tokio::join!(
        tokio::spawn(async move { ra.get_or_admit(a).await }),
        tokio::spawn(async move { rb.get_or_admit(b).await }),
    );

    assert_eq!(live_a.unwrap().unwrap().key, a);
    assert_eq!(live_b.unwrap().unwrap().key, b);

    let mut resident = registry.list();
    resident.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(resident, expected);
}
