use std::collections::HashMap;

use tracing::{debug, info};

use super::WifiScanner;
use crate::error::{ScanError, ScanResult};
use crate::event::{EventQueue, ScannerEvent};

/// Per-interface scanners, owned above the scan core
#[derive(Default)]
pub struct ScannerRegistry {
    scanners: HashMap<String, WifiScanner>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scanner, replacing any previous one for the same interface
    pub fn insert(&mut self, scanner: WifiScanner) -> Option<WifiScanner> {
        info!("Registered scanner for {}", scanner.iface());
        self.scanners.insert(scanner.iface().to_string(), scanner)
    }

    pub fn remove(&mut self, iface: &str) -> Option<WifiScanner> {
        self.scanners.remove(iface)
    }

    pub fn get(&self, iface: &str) -> ScanResult<&WifiScanner> {
        self.scanners
            .get(iface)
            .ok_or_else(|| ScanError::UnknownInterface(iface.to_string()))
    }

    pub fn get_mut(&mut self, iface: &str) -> ScanResult<&mut WifiScanner> {
        self.scanners
            .get_mut(iface)
            .ok_or_else(|| ScanError::UnknownInterface(iface.to_string()))
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.scanners.keys().map(String::as_str)
    }

    /// Route an event to the scanner of the interface it names
    pub fn dispatch(&mut self, event: ScannerEvent) {
        let Some(iface) = event.iface() else {
            return;
        };
        if let Some(scanner) = self.scanners.get_mut(iface) {
            scanner.handle_event(event);
            return;
        }
        // A deferred failure still owes its handler the one callback
        match event {
            ScannerEvent::AdmissionRejected {
                mut handler, reason, ..
            } => handler.on_scan_request_failed(reason),
            other => debug!("Event for unregistered interface dropped: {:?}", other),
        }
    }

    /// Dispatch everything already queued, in order. Returns the number of
    /// events handled.
    pub fn dispatch_pending(&mut self, queue: &mut EventQueue) -> usize {
        let mut handled = 0;
        while let Some(event) = queue.try_next() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Serve the queue until it closes or a shutdown event arrives
    pub async fn run(&mut self, queue: &mut EventQueue) {
        while let Some(event) = queue.next().await {
            if matches!(event, ScannerEvent::Shutdown) {
                info!("Dispatch loop shutting down");
                break;
            }
            self.dispatch(event);
        }
    }
}
