use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::event::ScannerEvent;
use crate::scanner::types::BackgroundScanId;

/// What a timer is for. Every tag names the interface it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerTag {
    /// Watchdog of the in-flight single scan
    SingleScanTimeout { iface: String },
    /// Next cycle of a background scan
    BackgroundPeriod { iface: String, id: BackgroundScanId },
    /// Watchdog of a background scan cycle
    BackgroundTimeout { iface: String, id: BackgroundScanId },
}

impl TimerTag {
    pub fn iface(&self) -> &str {
        match self {
            Self::SingleScanTimeout { iface }
            | Self::BackgroundPeriod { iface, .. }
            | Self::BackgroundTimeout { iface, .. } => iface,
        }
    }
}

impl fmt::Display for TimerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleScanTimeout { iface } => write!(f, "{iface}:single-scan-timeout"),
            Self::BackgroundPeriod { iface, id } => write!(f, "{iface}:background-period:{id}"),
            Self::BackgroundTimeout { iface, id } => write!(f, "{iface}:background-timeout:{id}"),
        }
    }
}

/// Identifies one scheduled timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Alarm capability. Expirations arrive as [`ScannerEvent::TimerFired`]
/// through the dispatch queue, never as direct calls.
pub trait TimerService: Send + Sync {
    fn schedule_timeout(&self, tag: TimerTag, delay: Duration) -> TimerHandle;

    /// Cancelling an unknown or already fired handle is a no-op
    fn cancel_timeout(&self, handle: TimerHandle);
}

/// Timer service running each timeout as a tokio task
pub struct TokioTimerService {
    tx: mpsc::UnboundedSender<ScannerEvent>,
    runtime: Handle,
    next: AtomicU64,
    pending: Arc<Mutex<HashMap<TimerHandle, JoinHandle<()>>>>,
}

impl TokioTimerService {
    /// Must be called from within a tokio runtime
    pub fn new(tx: mpsc::UnboundedSender<ScannerEvent>) -> Self {
        Self::with_runtime(tx, Handle::current())
    }

    pub fn with_runtime(tx: mpsc::UnboundedSender<ScannerEvent>, runtime: Handle) -> Self {
        Self {
            tx,
            runtime,
            next: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of timers scheduled and not yet fired or cancelled
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl TimerService for TokioTimerService {
    fn schedule_timeout(&self, tag: TimerTag, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next.fetch_add(1, Ordering::Relaxed));
        trace!("Scheduling {} in {:?}", tag, delay);

        // Held across spawn so the task cannot remove itself before it is inserted
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let tx = self.tx.clone();
        let task_pending = self.pending.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task_pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&handle);
            if tx.send(ScannerEvent::TimerFired { tag, handle }).is_err() {
                debug!("Dispatch queue closed; dropping timer expiry");
            }
        });
        pending.insert(handle, task);
        handle
    }

    fn cancel_timeout(&self, handle: TimerHandle) {
        let task = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle);
        if let Some(task) = task {
            trace!("Cancelling timer {:?}", handle);
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> TimerTag {
        TimerTag::SingleScanTimeout {
            iface: "wlan0".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_through_the_queue() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = TokioTimerService::new(tx);

        let handle = timers.schedule_timeout(tag(), Duration::from_secs(15));
        assert_eq!(timers.pending_count(), 1);

        match rx.recv().await {
            Some(ScannerEvent::TimerFired { tag: fired, handle: h }) => {
                assert_eq!(fired, tag());
                assert_eq!(h, handle);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(timers.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = TokioTimerService::new(tx);

        let handle = timers.schedule_timeout(tag(), Duration::from_secs(1));
        timers.cancel_timeout(handle);
        assert_eq!(timers.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());

        // second cancel is harmless
        timers.cancel_timeout(handle);
    }

    #[test]
    fn tags_name_their_interface() {
        let tag = TimerTag::BackgroundTimeout {
            iface: "wlan1".into(),
            id: BackgroundScanId(3),
        };
        assert_eq!(tag.iface(), "wlan1");
        assert_eq!(tag.to_string(), "wlan1:background-timeout:3");
    }
}
