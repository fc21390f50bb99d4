use std::sync::Arc;

use dat_gateway_core::ArchiveKey;
use dat_gateway_drive::FsDrive;

/// A resident archive: its key and a handle to the drive materialized for
/// it. `drive` is `Arc`-shared so a `LiveArchive` can be cloned cheaply to
/// every `getOrAdmit` waiter and into the HTTP/WS front ends without
/// duplicating the underlying filesystem view.
#[derive(Clone)]
pub struct LiveArchive {
    pub key: ArchiveKey,
    pub drive: Arc<FsDrive>,
}

impl LiveArchive {
    pub fn new(key: ArchiveKey, drive: FsDrive) -> Self {
        Self {
            key,
            drive: Arc::new(drive),
        }
    }
}
