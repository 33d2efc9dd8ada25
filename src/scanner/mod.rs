pub mod background;
pub mod channels;
pub mod handler;
pub mod hidden;
pub mod reconcile;
pub mod registry;
pub mod request;
pub mod settings;
pub mod single;
pub mod types;

pub use background::BackgroundScanController;
pub use handler::{ForwardingHandler, HandlerEvent, ScanEventHandler};
pub use registry::ScannerRegistry;
pub use settings::{BucketSettings, BucketTarget, ScanSettings, ScanSettingsBuilder};
pub use single::{SingleScanController, SingleScanPhase};
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::driver::{DriverEvent, ScanDriver};
use crate::error::ScanResult;
use crate::event::ScannerEvent;
use crate::timer::{TimerService, TimerTag};
use channels::ChannelTable;
use hidden::HiddenNetworkListBuilder;
use request::ResolvedRequest;

/// Watchdog applied to every scan unless configured otherwise
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Collaborators shared by the controllers of one interface
#[derive(Clone)]
pub struct ScannerContext {
    pub iface: String,
    pub driver: Arc<dyn ScanDriver>,
    pub timers: Arc<dyn TimerService>,
    pub clock: Arc<dyn Clock>,
    pub channels: Arc<dyn ChannelTable>,
    pub events: mpsc::UnboundedSender<ScannerEvent>,
    pub scan_timeout: Duration,
}

impl ScannerContext {
    fn hidden_list(&self) -> HiddenNetworkListBuilder {
        HiddenNetworkListBuilder::new(self.driver.max_scan_ssids())
    }

    pub fn resolve(&self, settings: &ScanSettings) -> ScanResult<ResolvedRequest> {
        ResolvedRequest::resolve(settings, self.channels.as_ref(), self.hidden_list())
    }

    pub fn resolve_buckets<'b, I>(
        &self,
        settings: &ScanSettings,
        buckets: I,
    ) -> ScanResult<ResolvedRequest>
    where
        I: IntoIterator<Item = &'b BucketSettings>,
    {
        ResolvedRequest::resolve_buckets(
            settings,
            buckets,
            self.channels.as_ref(),
            self.hidden_list(),
        )
    }

    /// Admission call to the driver
    pub fn issue(&self, request: &ResolvedRequest) -> ReasonCode {
        self.driver.scan(
            &self.iface,
            request.scan_type,
            &request.frequencies,
            &request.hidden_networks,
            request.enable_6ghz_rnr,
            request.vendor_elements.as_deref(),
        )
    }

    /// Report `reason` to `handler` on a later dispatch turn
    pub fn defer_failure(&self, handler: Box<dyn ScanEventHandler>, reason: ReasonCode) {
        let event = ScannerEvent::AdmissionRejected {
            iface: self.iface.clone(),
            handler,
            reason,
        };
        if self.events.send(event).is_err() {
            warn!("{}: dispatch queue closed, failure report lost", self.iface);
        }
    }
}

/// Scan orchestration for one interface.
///
/// Owns the single-scan slot and the background configurations, and turns
/// each dispatched [`ScannerEvent`] into controller transitions.
pub struct WifiScanner {
    ctx: ScannerContext,
    single: SingleScanController,
    background: BackgroundScanController,
}

impl WifiScanner {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            single: SingleScanController::new(ctx.clone()),
            background: BackgroundScanController::new(ctx.clone()),
            ctx,
        }
    }

    pub fn iface(&self) -> &str {
        &self.ctx.iface
    }

    // ── Exposed operations ────────────────────────────────────────────

    pub fn start_single_scan(
        &mut self,
        settings: Option<&ScanSettings>,
        handler: Option<Box<dyn ScanEventHandler>>,
    ) -> bool {
        self.single.start(settings, handler)
    }

    pub fn start_batched_scan(
        &mut self,
        settings: Option<&ScanSettings>,
        handler: Option<Box<dyn ScanEventHandler>>,
    ) -> bool {
        self.start_background_scan(settings, handler).is_some()
    }

    /// Like [`Self::start_batched_scan`], keeping the id needed to stop it
    pub fn start_background_scan(
        &mut self,
        settings: Option<&ScanSettings>,
        handler: Option<Box<dyn ScanEventHandler>>,
    ) -> Option<BackgroundScanId> {
        self.background.start(settings, handler)
    }

    pub fn stop_batched_scan(&mut self, id: BackgroundScanId) -> bool {
        self.background.stop(id)
    }

    pub fn get_latest_single_scan_results(&self) -> ScanResultSet {
        self.single.latest_results().clone()
    }

    pub fn get_latest_batched_scan_results(&self, id: BackgroundScanId) -> Option<ScanResultSet> {
        self.background.latest_results(id).cloned()
    }

    pub fn is_single_scan_in_flight(&self) -> bool {
        self.single.is_in_flight()
    }

    pub fn single_scan_phase(&self) -> SingleScanPhase {
        self.single.phase()
    }

    pub fn background_scan_count(&self) -> usize {
        self.background.active_count()
    }

    // ── Dispatch ──────────────────────────────────────────────────────

    /// Apply one dispatched event
    pub fn handle_event(&mut self, event: ScannerEvent) {
        if let Some(iface) = event.iface() {
            if iface != self.ctx.iface {
                debug!("{}: event for {} ignored", self.ctx.iface, iface);
                return;
            }
        }

        match event {
            ScannerEvent::Driver(DriverEvent::ResultsAvailable { .. }) => {
                if !self.single.is_in_flight() && !self.background.has_pending_cycle() {
                    debug!("{}: results with no scan waiting, ignored", self.ctx.iface);
                    return;
                }
                let raw = self.ctx.driver.get_scan_results(&self.ctx.iface);
                self.single.on_results_available(&raw);
                self.background.on_results_available(&raw);
            }
            ScannerEvent::Driver(DriverEvent::ScanFailed { reason, .. }) => {
                self.single.on_scan_failed(reason);
                self.background.on_scan_failed(reason);
            }
            ScannerEvent::TimerFired { tag, handle } => match tag {
                TimerTag::SingleScanTimeout { .. } => self.single.on_timeout(handle),
                TimerTag::BackgroundPeriod { id, .. } => self.background.on_period(id, handle),
                TimerTag::BackgroundTimeout { id, .. } => self.background.on_timeout(id, handle),
            },
            ScannerEvent::AdmissionRejected {
                mut handler,
                reason,
                ..
            } => handler.on_scan_request_failed(reason),
            ScannerEvent::BackgroundCycleRejected { id, reason, .. } => {
                self.background.on_cycle_rejected(id, reason)
            }
            ScannerEvent::Shutdown => {}
        }
    }
}
