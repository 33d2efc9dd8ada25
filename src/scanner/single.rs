use std::mem;

use tracing::{debug, info, warn};

use super::handler::ScanEventHandler;
use super::reconcile::ResultReconciler;
use super::request::ResolvedRequest;
use super::settings::ScanSettings;
use super::types::{RawScanRecord, ReasonCode, ScanResultSet};
use super::ScannerContext;
use crate::timer::{TimerHandle, TimerTag};

/// Externally visible phase of the single-scan slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleScanPhase {
    Idle,
    /// Admission call to the driver in progress
    Requested,
    /// Admitted, waiting for a notification or the timeout
    Armed,
}

/// The one admitted single scan of an interface
struct InFlightScan {
    handler: Box<dyn ScanEventHandler>,
    request: ResolvedRequest,
    full_results: bool,
    start_nanos: u64,
    timeout: TimerHandle,
}

enum SingleScanState {
    Idle,
    Requested,
    Armed(Box<InFlightScan>),
}

/// State machine owning the single-scan slot of one interface.
///
/// Idle -> Requested -> Armed -> Idle. Every admitted request ends with
/// exactly one terminal handler callback: success, driver failure event,
/// admission failure or timeout.
pub struct SingleScanController {
    ctx: ScannerContext,
    state: SingleScanState,
    latest: ScanResultSet,
}

impl SingleScanController {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            ctx,
            state: SingleScanState::Idle,
            latest: ScanResultSet::default(),
        }
    }

    pub fn phase(&self) -> SingleScanPhase {
        match self.state {
            SingleScanState::Idle => SingleScanPhase::Idle,
            SingleScanState::Requested => SingleScanPhase::Requested,
            SingleScanState::Armed(_) => SingleScanPhase::Armed,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        !matches!(self.state, SingleScanState::Idle)
    }

    /// Results of the most recently completed scan, empty until one completes
    pub fn latest_results(&self) -> &ScanResultSet {
        &self.latest
    }

    /// Try to start a scan.
    ///
    /// `false` means the request was refused outright and `handler` was
    /// dropped without being called. `true` means admission was attempted;
    /// the outcome, including an admission failure, arrives through the
    /// handler on a later dispatch turn.
    pub fn start(
        &mut self,
        settings: Option<&ScanSettings>,
        handler: Option<Box<dyn ScanEventHandler>>,
    ) -> bool {
        let Some(settings) = settings else {
            warn!("{}: single scan refused, no settings", self.ctx.iface);
            return false;
        };
        let Some(handler) = handler else {
            warn!("{}: single scan refused, no event handler", self.ctx.iface);
            return false;
        };
        if self.is_in_flight() {
            warn!(
                "{}: single scan refused, a scan is already in flight",
                self.ctx.iface
            );
            return false;
        }

        let request = match self.ctx.resolve(settings) {
            Ok(request) => request,
            Err(e) => {
                warn!("{}: single scan not issued: {}", self.ctx.iface, e);
                self.ctx.defer_failure(handler, e.reason_code());
                return true;
            }
        };

        // Taken before the admission call so nothing detected during the
        // scan can be older than the stamp.
        let start_nanos = self.ctx.clock.now_nanos();
        self.state = SingleScanState::Requested;
        let status = self.ctx.issue(&request);

        if !status.is_success() {
            warn!("{}: driver refused single scan: {}", self.ctx.iface, status);
            self.state = SingleScanState::Idle;
            self.ctx.defer_failure(handler, status);
            return true;
        }

        let timeout = self.ctx.timers.schedule_timeout(
            TimerTag::SingleScanTimeout {
                iface: self.ctx.iface.clone(),
            },
            self.ctx.scan_timeout,
        );
        info!(
            "{}: single scan armed over {} frequencies",
            self.ctx.iface,
            request.frequencies.len()
        );
        self.state = SingleScanState::Armed(Box::new(InFlightScan {
            handler,
            full_results: settings.wants_full_results(),
            request,
            start_nanos,
            timeout,
        }));
        true
    }

    /// Take the armed scan out of the slot, leaving it Idle
    fn take_armed(&mut self) -> Option<Box<InFlightScan>> {
        match mem::replace(&mut self.state, SingleScanState::Idle) {
            SingleScanState::Armed(scan) => Some(scan),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Driver reported results for this interface
    pub fn on_results_available(&mut self, raw: &[RawScanRecord]) {
        let Some(mut scan) = self.take_armed() else {
            debug!("{}: results with no armed single scan, ignored", self.ctx.iface);
            return;
        };
        self.ctx.timers.cancel_timeout(scan.timeout);

        let results = ResultReconciler::new(scan.start_nanos)
            .with_frequencies(&scan.request.frequencies)
            .reconcile(raw);
        info!(
            "{}: single scan complete, {} results",
            self.ctx.iface,
            results.len()
        );

        if scan.full_results {
            for record in results.iter() {
                scan.handler.on_full_scan_result(record, 0);
            }
        }
        self.latest = results;
        scan.handler.on_scan_status_available();
    }

    /// Driver reported that the scan failed
    pub fn on_scan_failed(&mut self, reason: ReasonCode) {
        let Some(mut scan) = self.take_armed() else {
            debug!("{}: failure with no armed single scan, ignored", self.ctx.iface);
            return;
        };
        self.ctx.timers.cancel_timeout(scan.timeout);
        warn!("{}: single scan failed: {}", self.ctx.iface, reason);
        scan.handler.on_scan_request_failed(reason);
    }

    /// A single-scan timeout fired
    pub fn on_timeout(&mut self, handle: TimerHandle) {
        let armed_handle = match &self.state {
            SingleScanState::Armed(scan) => scan.timeout,
            _ => {
                debug!("{}: stale single scan timeout, ignored", self.ctx.iface);
                return;
            }
        };
        if armed_handle != handle {
            debug!("{}: timeout of an earlier scan, ignored", self.ctx.iface);
            return;
        }
        if let Some(mut scan) = self.take_armed() {
            warn!("{}: single scan timed out", self.ctx.iface);
            scan.handler.on_scan_request_failed(ReasonCode::Timeout);
        }
    }
}
