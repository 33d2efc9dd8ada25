//! Shared fakes for the scanner integration tests.
//!
//! Everything is driven by hand: the driver answers admission with a
//! configured status, timers only fire when a test fires them, and the
//! clock only moves when a test moves it. Events are drained with
//! [`ScannerRegistry::dispatch_pending`], so no runtime is needed.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use nexus_scan::clock::Clock;
use nexus_scan::driver::{DriverEvent, ScanDriver};
use nexus_scan::scanner::channels::ChannelTable;
use nexus_scan::scanner::hidden::DEFAULT_MAX_SCAN_SSIDS;
use nexus_scan::scanner::{
    FrequencySet, HandlerEvent, RawScanRecord, ReasonCode, ScanType, SubBand,
    DEFAULT_SCAN_TIMEOUT,
};
use nexus_scan::timer::{TimerHandle, TimerService, TimerTag};
use nexus_scan::{EventQueue, ScannerContext, ScannerEvent, ScannerRegistry, WifiScanner};

pub const IFACE: &str = "wlan0";

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Arguments of one admission call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCall {
    pub iface: String,
    pub scan_type: ScanType,
    pub frequencies: FrequencySet,
    pub hidden_networks: Vec<String>,
    pub enable_6ghz_rnr: bool,
    pub vendor_elements: Option<Vec<u8>>,
}

#[derive(Default)]
struct DriverState {
    status: Option<ReasonCode>,
    results: Vec<RawScanRecord>,
    calls: Vec<ScanCall>,
    fetches: usize,
}

pub struct FakeDriver {
    state: Mutex<DriverState>,
    max_scan_ssids: usize,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::with_max_scan_ssids(DEFAULT_MAX_SCAN_SSIDS)
    }

    pub fn with_max_scan_ssids(max_scan_ssids: usize) -> Self {
        Self {
            state: Mutex::new(DriverState::default()),
            max_scan_ssids,
        }
    }

    /// Status returned by every following admission call
    pub fn set_status(&self, status: ReasonCode) {
        self.state.lock().unwrap().status = Some(status);
    }

    pub fn set_results(&self, results: Vec<RawScanRecord>) {
        self.state.lock().unwrap().results = results;
    }

    pub fn calls(&self) -> Vec<ScanCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn last_call(&self) -> ScanCall {
        self.calls().pop().expect("no scan was issued")
    }

    /// How often results were pulled from the driver
    pub fn fetches(&self) -> usize {
        self.state.lock().unwrap().fetches
    }
}

impl ScanDriver for FakeDriver {
    fn scan(
        &self,
        iface: &str,
        scan_type: ScanType,
        frequencies: &FrequencySet,
        hidden_networks: &[String],
        enable_6ghz_rnr: bool,
        vendor_elements: Option<&[u8]>,
    ) -> ReasonCode {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ScanCall {
            iface: iface.to_string(),
            scan_type,
            frequencies: frequencies.clone(),
            hidden_networks: hidden_networks.to_vec(),
            enable_6ghz_rnr,
            vendor_elements: vendor_elements.map(<[u8]>::to_vec),
        });
        state.status.unwrap_or(ReasonCode::Succeeded)
    }

    fn get_scan_results(&self, _iface: &str) -> Vec<RawScanRecord> {
        let mut state = self.state.lock().unwrap();
        state.fetches += 1;
        state.results.clone()
    }

    fn max_scan_ssids(&self) -> usize {
        self.max_scan_ssids
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub handle: TimerHandle,
    pub tag: TimerTag,
    pub delay: Duration,
}

/// Timer service whose timeouts fire only when a test says so
pub struct ManualTimers {
    events: mpsc::UnboundedSender<ScannerEvent>,
    next: AtomicU64,
    active: Mutex<Vec<ScheduledTimer>>,
}

impl ManualTimers {
    pub fn new(events: mpsc::UnboundedSender<ScannerEvent>) -> Self {
        Self {
            events,
            next: AtomicU64::new(1),
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn active(&self) -> Vec<ScheduledTimer> {
        self.active.lock().unwrap().clone()
    }

    pub fn find(&self, tag: &TimerTag) -> Option<ScheduledTimer> {
        self.active().into_iter().find(|t| &t.tag == tag)
    }

    /// Expire the active timer carrying `tag`. Returns its handle.
    pub fn fire(&self, tag: &TimerTag) -> TimerHandle {
        let timer = {
            let mut active = self.active.lock().unwrap();
            let pos = active
                .iter()
                .position(|t| &t.tag == tag)
                .unwrap_or_else(|| panic!("no active timer {tag}"));
            active.remove(pos)
        };
        self.post(timer.tag, timer.handle);
        timer.handle
    }

    /// Deliver an expiry for a handle regardless of whether it is active
    pub fn post(&self, tag: TimerTag, handle: TimerHandle) {
        self.events
            .send(ScannerEvent::TimerFired { tag, handle })
            .unwrap();
    }
}

impl TimerService for ManualTimers {
    fn schedule_timeout(&self, tag: TimerTag, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.active
            .lock()
            .unwrap()
            .push(ScheduledTimer { handle, tag, delay });
        handle
    }

    fn cancel_timeout(&self, handle: TimerHandle) {
        self.active.lock().unwrap().retain(|t| t.handle != handle);
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub struct FakeClock {
    nanos: AtomicU64,
}

impl FakeClock {
    pub fn new(nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(nanos),
        }
    }

    pub fn set_micros(&self, micros: u64) {
        self.nanos.store(micros * 1_000, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Small channel table with easy to recognise frequencies
pub struct FixtureChannels;

impl FixtureChannels {
    const ALL: [u32; 11] = [
        2400, 2450, 5150, 5175, 5600, 5650, 5660, 5945, 5985, 58320, 60480,
    ];
}

impl ChannelTable for FixtureChannels {
    fn frequencies(&self, sub_band: SubBand) -> Vec<u32> {
        match sub_band {
            SubBand::Ghz24 => vec![2400, 2450],
            SubBand::Ghz5 => vec![5150, 5175],
            SubBand::Ghz5Dfs => vec![5600, 5650, 5660],
            SubBand::Ghz6 => vec![5945, 5985],
            SubBand::Ghz60 => vec![58320, 60480],
        }
    }

    fn channel_frequency(&self, channel: u32) -> Option<u32> {
        Self::ALL.contains(&channel).then_some(channel)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Start of the first scan in every test, in microseconds
pub const START_MICROS: u64 = 1_000_000;

pub struct Harness {
    pub queue: EventQueue,
    pub registry: ScannerRegistry,
    pub driver: Arc<FakeDriver>,
    pub timers: Arc<ManualTimers>,
    pub clock: Arc<FakeClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_driver(FakeDriver::new())
    }

    pub fn with_driver(driver: FakeDriver) -> Self {
        let queue = EventQueue::new();
        let driver = Arc::new(driver);
        let timers = Arc::new(ManualTimers::new(queue.sender()));
        let clock = Arc::new(FakeClock::new(START_MICROS * 1_000));

        let ctx = ScannerContext {
            iface: IFACE.to_string(),
            driver: driver.clone(),
            timers: timers.clone(),
            clock: clock.clone(),
            channels: Arc::new(FixtureChannels),
            events: queue.sender(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        };
        let mut registry = ScannerRegistry::new();
        registry.insert(WifiScanner::new(ctx));

        Self {
            queue,
            registry,
            driver,
            timers,
            clock,
        }
    }

    pub fn scanner(&mut self) -> &mut WifiScanner {
        self.registry.get_mut(IFACE).unwrap()
    }

    /// Handle everything queued so far
    pub fn dispatch(&mut self) -> usize {
        self.registry.dispatch_pending(&mut self.queue)
    }

    pub fn post(&mut self, event: ScannerEvent) {
        self.queue.sender().send(event).unwrap();
    }

    pub fn results_available(&mut self) {
        self.post(ScannerEvent::Driver(DriverEvent::ResultsAvailable {
            iface: IFACE.to_string(),
        }));
        self.dispatch();
    }

    pub fn scan_failed(&mut self, reason: ReasonCode) {
        self.post(ScannerEvent::Driver(DriverEvent::ScanFailed {
            iface: IFACE.to_string(),
            reason,
        }));
        self.dispatch();
    }

    pub fn fire(&mut self, tag: &TimerTag) -> TimerHandle {
        let handle = self.timers.fire(tag);
        self.dispatch();
        handle
    }
}

pub fn single_timeout_tag() -> TimerTag {
    TimerTag::SingleScanTimeout {
        iface: IFACE.to_string(),
    }
}

/// Driver record detected at `micros`
pub fn record(ssid: &str, rssi: i32, frequency: u32, micros: u64) -> RawScanRecord {
    RawScanRecord::new(ssid, "02:00:00:00:00:01", rssi, frequency, micros)
}

/// Every handler callback received so far
pub fn drain(rx: &mut mpsc::UnboundedReceiver<HandlerEvent>) -> Vec<HandlerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
