use std::fmt;

use tokio::sync::mpsc;

use crate::driver::DriverEvent;
use crate::scanner::handler::ScanEventHandler;
use crate::scanner::types::{BackgroundScanId, ReasonCode};
use crate::timer::{TimerHandle, TimerTag};

/// Everything that can change scanner state. All of it travels through one
/// [`EventQueue`] so that no two events are ever handled concurrently.
pub enum ScannerEvent {
    /// Notification from the driver surface
    Driver(DriverEvent),
    /// A scheduled timeout expired
    TimerFired { tag: TimerTag, handle: TimerHandle },
    /// A single scan was refused at admission. Carries the handler so the
    /// failure is reported on a later dispatch turn, never inline.
    AdmissionRejected {
        iface: String,
        handler: Box<dyn ScanEventHandler>,
        reason: ReasonCode,
    },
    /// The first cycle of a background scan was refused at admission
    BackgroundCycleRejected {
        iface: String,
        id: BackgroundScanId,
        reason: ReasonCode,
    },
    /// Stop the dispatch loop
    Shutdown,
}

impl ScannerEvent {
    /// Interface the event belongs to, `None` for loop control events
    pub fn iface(&self) -> Option<&str> {
        match self {
            Self::Driver(event) => Some(event.iface()),
            Self::TimerFired { tag, .. } => Some(tag.iface()),
            Self::AdmissionRejected { iface, .. } | Self::BackgroundCycleRejected { iface, .. } => {
                Some(iface)
            }
            Self::Shutdown => None,
        }
    }
}

impl fmt::Debug for ScannerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(event) => f.debug_tuple("Driver").field(event).finish(),
            Self::TimerFired { tag, handle } => f
                .debug_struct("TimerFired")
                .field("tag", tag)
                .field("handle", handle)
                .finish(),
            Self::AdmissionRejected { iface, reason, .. } => f
                .debug_struct("AdmissionRejected")
                .field("iface", iface)
                .field("reason", reason)
                .finish_non_exhaustive(),
            Self::BackgroundCycleRejected { iface, id, reason } => f
                .debug_struct("BackgroundCycleRejected")
                .field("iface", iface)
                .field("id", id)
                .field("reason", reason)
                .finish(),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// The serialized dispatch queue.
///
/// Producers (driver, timers, controllers) hold cloned senders; a single
/// consumer drains it either asynchronously with [`EventQueue::next`] or,
/// in tests, synchronously with [`EventQueue::try_next`].
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<ScannerEvent>,
    tx: mpsc::UnboundedSender<ScannerEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Get a clone of the sender for producers
    pub fn sender(&self) -> mpsc::UnboundedSender<ScannerEvent> {
        self.tx.clone()
    }

    /// Receive the next event
    pub async fn next(&mut self) -> Option<ScannerEvent> {
        self.rx.recv().await
    }

    /// Receive an event if one is already queued
    pub fn try_next(&mut self) -> Option<ScannerEvent> {
        self.rx.try_recv().ok()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
