use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use super::state::{FeedEvent, ScanEvent, ScanSnapshot};

const SCAN_BUFFER: usize = 64;

/// Single-producer fan-out of scanner state.
///
/// Views watch the latest immutable [`ScanSnapshot`]; consumers that must see
/// every scan (the relay, the console printer) take the [`ScanEvent`] stream.
pub struct ScanHub {
    snapshots: watch::Sender<Arc<ScanSnapshot>>,
    scans: broadcast::Sender<ScanEvent>,
}

impl ScanHub {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Arc::new(ScanSnapshot::default()));
        let (scans, _) = broadcast::channel(SCAN_BUFFER);
        Self { snapshots, scans }
    }

    pub fn publish(&self, event: FeedEvent) {
        let mut produced = None;
        self.snapshots.send_modify(|current| {
            let mut next = ScanSnapshot::clone(current);
            produced = next.apply(event);
            *current = Arc::new(next);
        });

        if let Some(scan) = produced {
            // No live receivers is fine.
            let _ = self.scans.send(scan);
        }
    }

    pub fn snapshot(&self) -> Arc<ScanSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<ScanSnapshot>> {
        self.snapshots.subscribe()
    }

    pub fn scans(&self) -> broadcast::Receiver<ScanEvent> {
        self.scans.subscribe()
    }
}

impl Default for ScanHub {
    fn default() -> Self {
        Self::new()
    }
}
