use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dat_gateway_core::{ArchiveKey, GatewayConfig, GatewayError};
use dat_gateway_drive::FsDrive;
use dat_gateway_swarm::SwarmAdapter;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::live_archive::LiveArchive;

/// Capacity of each admission's fan-out channel. Bounded by the number of
/// concurrent callers we expect to race on a single cold key; a lagging
/// subscriber only matters if it falls behind by this many materialize
/// events for *other* keys, which the filter in `admit` tolerates.
const PENDING_CHANNEL_CAPACITY: usize = 32;

type AdmissionResult = Result<LiveArchive, GatewayError>;

/// The archive cache and lifecycle manager: a bounded, TTL-governed map from
/// canonical key to `LiveArchive`, with at-most-once concurrent admission
/// per key and LRU eviction under a hard capacity.
///
/// `resident`, `pending`, and `last_access` are declared as separate
/// `DashMap`s for fast lock-free reads, but every mutation that depends on
/// the relationship between them (the resident/pending check, the capacity
/// check, eviction, and pending-entry insertion) happens while holding
/// `admission_lock` — the single serialization point the concurrency model
/// requires.
pub struct Registry<S: SwarmAdapter> {
    swarm: Arc<S>,
    resident: DashMap<ArchiveKey, LiveArchive>,
    pending: DashMap<ArchiveKey, broadcast::Sender<AdmissionResult>>,
    last_access: DashMap<ArchiveKey, Instant>,
    admission_lock: Mutex<()>,
    max: usize,
    readiness_timeout: Duration,
    ttl: Option<Duration>,
}

impl<S: SwarmAdapter + 'static> Registry<S> {
    pub fn new(swarm: Arc<S>, max: usize, readiness_timeout: Duration, ttl: Option<Duration>) -> Self {
        Self {
            swarm,
            resident: DashMap::new(),
            pending: DashMap::new(),
            last_access: DashMap::new(),
            admission_lock: Mutex::new(()),
            max,
            readiness_timeout,
            ttl,
        }
    }

    pub fn from_config(swarm: Arc<S>, config: &GatewayConfig) -> Self {
        let ttl = config
            .ttl_enabled()
            .then(|| Duration::from_millis(config.ttl_ms.unwrap()));
        Self::new(
            swarm,
            config.max,
            Duration::from_millis(config.readiness_timeout_ms),
            ttl,
        )
    }

    /// Returns the resident `LiveArchive` for `key`, admitting it first if
    /// necessary. At most one `swarm.join` is issued per key no matter how
    /// many callers race here concurrently; they all observe the same
    /// eventual result.
    pub async fn get_or_admit(self: &Arc<Self>, key: ArchiveKey) -> AdmissionResult {
        enum Wait {
            Ready(AdmissionResult),
            Pending(broadcast::Receiver<AdmissionResult>),
        }

        let wait = {
            let _guard = self.admission_lock.lock().await;
            if let Some(live) = self.resident.get(&key) {
                let live = live.clone();
                self.last_access.insert(key, Instant::now());
                Wait::Ready(Ok(live))
            } else if let Some(sender) = self.pending.get(&key) {
                Wait::Pending(sender.subscribe())
            } else {
                // Count in-flight admissions against `max` too, not just
                // `resident` — otherwise a burst of distinct cold keys can
                // each pass this check while `resident` is still small and
                // every one of them materializes into `resident`
                // unconditionally, pushing `|resident|` past `max`.
                if self.resident.len() + self.pending.len() >= self.max {
                    if let Err(e) = self.evict_oldest_locked().await {
                        return Err(e);
                    }
                }
                let (tx, rx) = broadcast::channel(PENDING_CHANNEL_CAPACITY);
                self.pending.insert(key, tx.clone());
                let registry = Arc::clone(self);
                tokio::spawn(async move { registry.admit(key, tx).await });
                Wait::Pending(rx)
            }
        };

        match wait {
            Wait::Ready(result) => result,
            Wait::Pending(mut rx) => rx.recv().await.unwrap_or(Err(GatewayError::NotReady)),
        }
    }

    /// The admission worker: joins the swarm, waits for materialization (or
    /// the readiness timeout), and fulfils every attached waiter exactly
    /// once. Runs detached from any individual caller so that cancelling a
    /// request never cancels the underlying join.
    async fn admit(self: Arc<Self>, key: ArchiveKey, tx: broadcast::Sender<AdmissionResult>) {
        let mut events = self.swarm.subscribe();
        self.swarm.join(key).await;

        let outcome = tokio::time::timeout(self.readiness_timeout, async {
            loop {
                match events.recv().await {
                    Ok(event) if event.key == key => return Some(event),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .await;

        let result = match outcome {
            Ok(Some(event)) => {
                let live = LiveArchive::new(key, FsDrive::new(event.root));
                let _guard = self.admission_lock.lock().await;
                self.resident.insert(key, live.clone());
                self.last_access.insert(key, Instant::now());
                self.pending.remove(&key);
                Ok(live)
            }
            Ok(None) => {
                warn!(key = %key, "materialize channel closed before archive became ready");
                let _guard = self.admission_lock.lock().await;
                self.pending.remove(&key);
                Err(GatewayError::NotReady)
            }
            Err(_) => {
                debug!(key = %key, "readiness timeout elapsed, rejecting current waiters");
                {
                    let _guard = self.admission_lock.lock().await;
                    self.pending.remove(&key);
                }
                // The join keeps running on the adapter's side; a later
                // caller benefits from it even though this round timed out.
                // Keep listening in the background so materialization still
                // lands the key in `resident` once it finally arrives.
                let registry = Arc::clone(&self);
                tokio::spawn(async move {
                    registry.finish_late_admission(key, events).await;
                });
                Err(GatewayError::NotReady)
            }
        };

        let _ = tx.send(result);
    }

    async fn finish_late_admission(
        self: Arc<Self>,
        key: ArchiveKey,
        mut events: broadcast::Receiver<dat_gateway_swarm::Materialized>,
    ) {
        loop {
            match events.recv().await {
                Ok(event) if event.key == key => {
                    let live = LiveArchive::new(key, FsDrive::new(event.root));
                    let _guard = self.admission_lock.lock().await;
                    self.resident.insert(key, live);
                    self.last_access.insert(key, Instant::now());
                    return;
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Leaves the swarm, drops the drive handle, and removes `key` from
    /// `resident`/`last_access`. No-op if `key` is not resident.
    pub async fn remove(&self, key: ArchiveKey) {
        let _guard = self.admission_lock.lock().await;
        self.remove_locked(key).await;
    }

    async fn remove_locked(&self, key: ArchiveKey) {
        self.resident.remove(&key);
        self.last_access.remove(&key);
        self.swarm.leave(key).await;
    }

    /// Snapshot of currently resident keys.
    pub fn list(&self) -> Vec<ArchiveKey> {
        self.resident.iter().map(|e| *e.key()).collect()
    }

    /// Removes the resident key with the smallest `lastAccess`.
    pub async fn evict_oldest(&self) -> Result<ArchiveKey, GatewayError> {
        let _guard = self.admission_lock.lock().await;
        self.evict_oldest_locked().await
    }

    async fn evict_oldest_locked(&self) -> Result<ArchiveKey, GatewayError> {
        let oldest = self
            .last_access
            .iter()
            .min_by_key(|e| *e.value())
            .map(|e| *e.key());
        match oldest {
            Some(key) => {
                self.remove_locked(key).await;
                Ok(key)
            }
            None => Err(GatewayError::Capacity),
        }
    }

    /// Spawns the background TTL sweeper. Only meaningful when `ttl` was
    /// configured; callers should gate this on `GatewayConfig::ttl_enabled`.
    pub fn spawn_ttl_sweeper(self: &Arc<Self>, sweep_period: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_period);
            loop {
                interval.tick().await;
                registry.sweep_expired().await;
            }
        })
    }

    async fn sweep_expired(&self) {
        let Some(ttl) = self.ttl else { return };
        let now = Instant::now();
        let expired: Vec<ArchiveKey> = self
            .last_access
            .iter()
            .filter(|e| now.saturating_duration_since(*e.value()) > ttl)
            .map(|e| *e.key())
            .collect();
        for key in expired {
            debug!(key = %key, "ttl expired, removing");
            self.remove(key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dat_gateway_swarm::FsSwarm;

    fn key(byte: u8) -> ArchiveKey {
        ArchiveKey::from_bytes([byte; 32])
    }

    async fn registry_with(max: usize) -> (tempfile::TempDir, Arc<Registry<FsSwarm>>) {
        let dir = tempfile::tempdir().unwrap();
        let swarm = Arc::new(FsSwarm::new(dir.path()));
        let registry = Arc::new(Registry::new(
            swarm,
            max,
            Duration::from_secs(1),
            None,
        ));
        (dir, registry)
    }

    #[tokio::test]
    async fn admits_and_returns_same_live_archive_on_repeat_calls() {
        let (_dir, registry) = registry_with(10).await;
        let k = key(0x01);

        let first = registry.get_or_admit(k).await.unwrap();
        let second = registry.get_or_admit(k).await.unwrap();
        assert_eq!(first.key, second.key);
        assert_eq!(registry.list(), vec![k]);
    }

    #[tokio::test]
    async fn eviction_makes_room_under_max_one() {
        let (_dir, registry) = registry_with(1).await;
        let a = key(0xaa);
        let b = key(0xbb);

        registry.get_or_admit(a).await.unwrap();
        registry.get_or_admit(b).await.unwrap();

        let resident = registry.list();
        assert_eq!(resident, vec![b]);
    }

    #[tokio::test]
    async fn remove_then_admit_performs_a_fresh_join() {
        let (_dir, registry) = registry_with(10).await;
        let k = key(0xcc);

        registry.get_or_admit(k).await.unwrap();
        registry.remove(k).await;
        assert!(registry.list().is_empty());

        registry.get_or_admit(k).await.unwrap();
        assert_eq!(registry.list(), vec![k]);
    }

    #[tokio::test]
    async fn evict_oldest_on_empty_registry_fails() {
        let (_dir, registry) = registry_with(10).await;
        assert!(matches!(
            registry.evict_oldest().await,
            Err(GatewayError::Capacity)
        ));
    }

    #[tokio::test]
    async fn ttl_sweep_removes_only_expired_keys() {
        let dir = tempfile::tempdir().unwrap();
        let swarm = Arc::new(FsSwarm::new(dir.path()));
        let registry = Arc::new(Registry::new(
            swarm,
            10,
            Duration::from_secs(1),
            Some(Duration::from_millis(20)),
        ));

        let k = key(0xdd);
        registry.get_or_admit(k).await.unwrap();
        assert_eq!(registry.list(), vec![k]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.sweep_expired().await;
        assert!(registry.list().is_empty());
    }
}
