use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::handler::ScanEventHandler;
use super::reconcile::ResultReconciler;
use super::request::ResolvedRequest;
use super::settings::ScanSettings;
use super::types::{BackgroundScanId, RawScanRecord, ReasonCode, ReportFlags, ScanResultSet};
use super::ScannerContext;
use crate::event::ScannerEvent;
use crate::timer::{TimerHandle, TimerTag};

/// Buckets one configuration may hold; `buckets_scanned` has one bit each
pub const MAX_BUCKETS: usize = 32;

/// One cycle waiting for the driver
struct PendingCycle {
    request: ResolvedRequest,
    buckets_scanned: u32,
    full_results: bool,
    report_status: bool,
    start_nanos: u64,
    timeout: TimerHandle,
}

/// An active periodic scan configuration
struct BackgroundScan {
    settings: ScanSettings,
    handler: Box<dyn ScanEventHandler>,
    /// Index of the next cycle to run
    cycle: u64,
    period_timer: TimerHandle,
    pending: Option<PendingCycle>,
    latest: ScanResultSet,
}

impl BackgroundScan {
    /// Bit mask of the buckets due in cycle `n`
    fn due_buckets(&self, n: u64) -> u32 {
        let elapsed = n * u64::from(self.settings.base_period_millis);
        self.settings
            .buckets
            .iter()
            .enumerate()
            .take(MAX_BUCKETS)
            .filter(|(_, b)| elapsed % u64::from(b.period_millis) == 0)
            .fold(0, |mask, (i, _)| mask | (1u32 << i))
    }
}

/// Periodic scans. Any number of configurations may be active at once,
/// each with its own timers, handler and latest results.
pub struct BackgroundScanController {
    ctx: ScannerContext,
    next_id: u32,
    scans: BTreeMap<BackgroundScanId, BackgroundScan>,
}

impl BackgroundScanController {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            ctx,
            next_id: 1,
            scans: BTreeMap::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.scans.len()
    }

    /// Whether any configuration is waiting on the driver
    pub fn has_pending_cycle(&self) -> bool {
        self.scans.values().any(|s| s.pending.is_some())
    }

    pub fn latest_results(&self, id: BackgroundScanId) -> Option<&ScanResultSet> {
        self.scans.get(&id).map(|s| &s.latest)
    }

    /// Register a periodic scan and run its first cycle.
    ///
    /// `None` when the request is refused outright: missing settings or
    /// handler, more than [`MAX_BUCKETS`] buckets, a zero period, or a
    /// bucket period that is not a multiple of the base period. The
    /// handler is then never called. A
    /// configuration whose channels cannot be resolved gets an id but is
    /// not activated; its handler receives the failure on a later
    /// dispatch turn.
    pub fn start(
        &mut self,
        settings: Option<&ScanSettings>,
        handler: Option<Box<dyn ScanEventHandler>>,
    ) -> Option<BackgroundScanId> {
        let Some(settings) = settings else {
            warn!("{}: background scan refused, no settings", self.ctx.iface);
            return None;
        };
        let Some(handler) = handler else {
            warn!("{}: background scan refused, no event handler", self.ctx.iface);
            return None;
        };
        if settings.buckets.len() > MAX_BUCKETS {
            warn!(
                "{}: background scan refused, {} buckets exceed the limit of {}",
                self.ctx.iface,
                settings.buckets.len(),
                MAX_BUCKETS
            );
            return None;
        }
        let base = settings.base_period_millis;
        if base == 0 || settings.buckets.iter().any(|b| b.period_millis == 0) {
            warn!("{}: background scan refused, zero scan period", self.ctx.iface);
            return None;
        }
        // Buckets are only evaluated on base-period ticks
        if let Some(bucket) = settings.buckets.iter().find(|b| b.period_millis % base != 0) {
            warn!(
                "{}: background scan refused, bucket period {} ms is not a multiple of {} ms",
                self.ctx.iface, bucket.period_millis, base
            );
            return None;
        }

        let id = BackgroundScanId(self.next_id);
        self.next_id += 1;

        if let Err(e) = self.ctx.resolve(settings) {
            warn!("{}: background scan {} not started: {}", self.ctx.iface, id, e);
            self.ctx.defer_failure(handler, e.reason_code());
            return Some(id);
        }

        let period_timer = self.schedule_period(id, settings.base_period_millis);
        self.scans.insert(
            id,
            BackgroundScan {
                settings: settings.clone(),
                handler,
                cycle: 0,
                period_timer,
                pending: None,
                latest: ScanResultSet::default(),
            },
        );
        info!(
            "{}: background scan {} started, every {} ms",
            self.ctx.iface, id, settings.base_period_millis
        );

        if let Some(reason) = self.run_cycle(id) {
            self.post_cycle_rejection(id, reason);
        }
        Some(id)
    }

    /// Stop a configuration without calling its handler
    pub fn stop(&mut self, id: BackgroundScanId) -> bool {
        let Some(scan) = self.scans.remove(&id) else {
            return false;
        };
        self.ctx.timers.cancel_timeout(scan.period_timer);
        if let Some(pending) = scan.pending {
            self.ctx.timers.cancel_timeout(pending.timeout);
        }
        info!("{}: background scan {} stopped", self.ctx.iface, id);
        true
    }

    fn schedule_period(&self, id: BackgroundScanId, period_millis: u32) -> TimerHandle {
        self.ctx.timers.schedule_timeout(
            TimerTag::BackgroundPeriod {
                iface: self.ctx.iface.clone(),
                id,
            },
            Duration::from_millis(u64::from(period_millis)),
        )
    }

    fn post_cycle_rejection(&self, id: BackgroundScanId, reason: ReasonCode) {
        let event = ScannerEvent::BackgroundCycleRejected {
            iface: self.ctx.iface.clone(),
            id,
            reason,
        };
        if self.ctx.events.send(event).is_err() {
            warn!("{}: dispatch queue closed, rejection of {} lost", self.ctx.iface, id);
        }
    }

    /// Issue the scan for the current cycle of `id`.
    ///
    /// Returns the admission failure, if any, for the caller to report.
    fn run_cycle(&mut self, id: BackgroundScanId) -> Option<ReasonCode> {
        let ctx = &self.ctx;
        let scan = self.scans.get_mut(&id)?;
        let n = scan.cycle;
        scan.cycle += 1;

        if scan.pending.is_some() {
            debug!(
                "{}: background scan {} cycle {} skipped, previous still pending",
                ctx.iface, id, n
            );
            return None;
        }
        let mask = scan.due_buckets(n);
        if mask == 0 {
            debug!("{}: background scan {} has no bucket due in cycle {}", ctx.iface, id, n);
            return None;
        }

        let due: Vec<_> = scan
            .settings
            .buckets
            .iter()
            .enumerate()
            .take(MAX_BUCKETS)
            .filter(|(i, _)| mask & (1u32 << i) != 0)
            .map(|(_, b)| b)
            .collect();
        let flags = due
            .iter()
            .fold(ReportFlags::default(), |acc, b| acc | b.report_flags);
        let report_status = due.iter().any(|b| b.report_flags.is_batched());

        let request = match ctx.resolve_buckets(&scan.settings, due.iter().copied()) {
            Ok(request) => request,
            Err(e) => return Some(e.reason_code()),
        };

        let start_nanos = ctx.clock.now_nanos();
        let status = ctx.issue(&request);
        if !status.is_success() {
            warn!("{}: driver refused background scan {}: {}", ctx.iface, id, status);
            return Some(status);
        }

        let timeout = ctx.timers.schedule_timeout(
            TimerTag::BackgroundTimeout {
                iface: ctx.iface.clone(),
                id,
            },
            ctx.scan_timeout,
        );
        debug!("{}: background scan {} cycle {} issued", ctx.iface, id, n);
        scan.pending = Some(PendingCycle {
            request,
            buckets_scanned: mask,
            full_results: flags.contains(ReportFlags::FULL_SCAN_RESULT),
            report_status,
            start_nanos,
            timeout,
        });
        None
    }

    /// Period timer of `id` fired: re-arm it and run the next cycle
    pub fn on_period(&mut self, id: BackgroundScanId, handle: TimerHandle) {
        let Some(period) = self
            .scans
            .get(&id)
            .filter(|s| s.period_timer == handle)
            .map(|s| s.settings.base_period_millis)
        else {
            debug!("{}: stale period timer for background scan {}", self.ctx.iface, id);
            return;
        };

        let next = self.schedule_period(id, period);
        if let Some(scan) = self.scans.get_mut(&id) {
            scan.period_timer = next;
        }

        if let Some(reason) = self.run_cycle(id) {
            if let Some(scan) = self.scans.get_mut(&id) {
                scan.handler.on_scan_request_failed(reason);
            }
        }
    }

    /// Deferred admission failure of a first cycle
    pub fn on_cycle_rejected(&mut self, id: BackgroundScanId, reason: ReasonCode) {
        match self.scans.get_mut(&id) {
            Some(scan) => scan.handler.on_scan_request_failed(reason),
            None => debug!("{}: rejection for stopped background scan {}", self.ctx.iface, id),
        }
    }

    pub fn on_timeout(&mut self, id: BackgroundScanId, handle: TimerHandle) {
        let Some(scan) = self.scans.get_mut(&id) else {
            return;
        };
        if scan.pending.as_ref().map(|p| p.timeout) != Some(handle) {
            debug!("{}: stale timeout for background scan {}", self.ctx.iface, id);
            return;
        }
        scan.pending = None;
        warn!("{}: background scan {} cycle timed out", self.ctx.iface, id);
        scan.handler.on_scan_request_failed(ReasonCode::Timeout);
    }

    /// Driver results for this interface; every pending cycle completes
    pub fn on_results_available(&mut self, raw: &[RawScanRecord]) {
        let ctx = &self.ctx;
        for (id, scan) in self.scans.iter_mut() {
            let Some(pending) = scan.pending.take() else {
                continue;
            };
            ctx.timers.cancel_timeout(pending.timeout);

            let results = ResultReconciler::new(pending.start_nanos)
                .with_frequencies(&pending.request.frequencies)
                .with_buckets_scanned(pending.buckets_scanned)
                .reconcile(raw);
            debug!(
                "{}: background scan {} cycle complete, {} results",
                ctx.iface,
                id,
                results.len()
            );

            if pending.full_results {
                for record in results.iter() {
                    scan.handler.on_full_scan_result(record, pending.buckets_scanned);
                }
            }
            scan.latest = results;
            if pending.report_status {
                scan.handler.on_scan_status_available();
            }
        }
    }

    /// Driver failure for this interface; every pending cycle fails
    pub fn on_scan_failed(&mut self, reason: ReasonCode) {
        let ctx = &self.ctx;
        for (id, scan) in self.scans.iter_mut() {
            let Some(pending) = scan.pending.take() else {
                continue;
            };
            ctx.timers.cancel_timeout(pending.timeout);
            warn!("{}: background scan {} cycle failed: {}", ctx.iface, id, reason);
            scan.handler.on_scan_request_failed(reason);
        }
    }
}
