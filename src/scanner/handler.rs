use tokio::sync::mpsc;

use super::types::{RawScanRecord, ReasonCode};

/// Callbacks bound to one scan request.
///
/// For any single request exactly one terminal callback fires:
/// `on_scan_status_available` on success or `on_scan_request_failed`
/// otherwise. `on_full_scan_result` may precede a success.
pub trait ScanEventHandler: Send {
    fn on_scan_status_available(&mut self);

    fn on_full_scan_result(&mut self, record: &RawScanRecord, buckets_scanned: u32);

    fn on_scan_request_failed(&mut self, reason: ReasonCode);
}

/// A handler callback captured as a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerEvent {
    StatusAvailable,
    FullResult {
        record: RawScanRecord,
        buckets_scanned: u32,
    },
    RequestFailed(ReasonCode),
}

impl HandlerEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::FullResult { .. })
    }
}

/// Handler that forwards every callback into a channel so async code can
/// await the outcome of a scan.
pub struct ForwardingHandler {
    tx: mpsc::UnboundedSender<HandlerEvent>,
}

impl ForwardingHandler {
    pub fn new(tx: mpsc::UnboundedSender<HandlerEvent>) -> Self {
        Self { tx }
    }

    /// Create a boxed handler together with the receiving end
    pub fn channel() -> (Box<dyn ScanEventHandler>, mpsc::UnboundedReceiver<HandlerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Box::new(Self::new(tx)), rx)
    }

    fn forward(&self, event: HandlerEvent) {
        // Receiver gone means nobody is waiting for this scan any more
        let _ = self.tx.send(event);
    }
}

impl ScanEventHandler for ForwardingHandler {
    fn on_scan_status_available(&mut self) {
        self.forward(HandlerEvent::StatusAvailable);
    }

    fn on_full_scan_result(&mut self, record: &RawScanRecord, buckets_scanned: u32) {
        self.forward(HandlerEvent::FullResult {
            record: record.clone(),
            buckets_scanned,
        });
    }

    fn on_scan_request_failed(&mut self, reason: ReasonCode) {
        self.forward(HandlerEvent::RequestFailed(reason));
    }
}
