use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

/// Counters for one play session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimMetricsSnapshot {
    pub ticks: u64,
    pub moves_accepted: u64,
    pub moves_rejected: u64,
    pub path_searches: u64,
    pub paths_not_found: u64,
    pub interactions_started: u64,
    pub interactions_skipped: u64,
    pub triggers_fired: u64,
    pub scene_loads: u64,
}

/// Read side shared with anything outside the simulation loop.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<SimMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> SimMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: SimMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<SimMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    #[test]
    fn clones_observe_published_snapshot() {
        let handle = MetricsHandle::default();
        let reader = handle.clone();
        handle.publish(SimMetricsSnapshot {
            ticks: 12,
            moves_accepted: 3,
            ..SimMetricsSnapshot::default()
        });
        assert_eq!(reader.snapshot().ticks, 12);
        assert_eq!(reader.snapshot().moves_accepted, 3);
    }

    #[test]
    fn snapshot_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());
        assert_eq!(handle.snapshot(), SimMetricsSnapshot::default());
    }

    #[test]
    fn publish_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let expected = SimMetricsSnapshot {
            path_searches: 4,
            paths_not_found: 1,
            ..SimMetricsSnapshot::default()
        };
        handle.publish(expected);
        assert_eq!(handle.snapshot(), expected);
    }
}
