use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{DriverEvent, ScanDriver};
use crate::clock::Clock;
use crate::error::{ScanError, ScanResult};
use crate::event::ScannerEvent;
use crate::scanner::types::{FrequencySet, RawScanRecord, ReasonCode, ScanType};

/// Built-in set of networks used when no fixture file is given
const DEFAULT_FIXTURE_JSON: &str = include_str!("../../fixtures/networks.json");

/// One network in a replay fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayNetwork {
    pub ssid: String,
    pub bssid: String,
    /// dBm
    pub rssi: i32,
    /// MHz
    pub frequency: u32,
    /// Detection time relative to the scan start. Negative values model
    /// entries left over from an earlier scan.
    #[serde(default)]
    pub offset_ms: i64,
    #[serde(default)]
    pub information_elements: Vec<u8>,
}

/// How the replay driver answers a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReplayOutcome {
    /// Admit, then report results after the completion delay
    #[default]
    Results,
    /// Admit, then report a scan failure
    Failure,
    /// Admit and never answer
    Silent,
    /// Refuse at admission
    Reject,
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub outcome: ReplayOutcome,
    /// Reason used by `Failure` and `Reject`
    pub failure_reason: ReasonCode,
    pub completion_delay: Duration,
    pub max_scan_ssids: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            outcome: ReplayOutcome::Results,
            failure_reason: ReasonCode::Unspecified,
            completion_delay: Duration::from_millis(300),
            max_scan_ssids: crate::scanner::hidden::DEFAULT_MAX_SCAN_SSIDS,
        }
    }
}

#[derive(Debug, Default)]
struct ReplayState {
    last_scan_start_nanos: Option<u64>,
    scans_issued: u64,
}

/// Driver surface that replays a fixed set of networks.
///
/// Each admitted scan re-stamps the fixture relative to the moment of the
/// scan and posts its completion to the dispatch queue from a tokio task.
pub struct ReplayDriver {
    networks: Vec<ReplayNetwork>,
    options: ReplayOptions,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<ScannerEvent>,
    runtime: Handle,
    state: Mutex<ReplayState>,
}

impl ReplayDriver {
    /// Must be called from within a tokio runtime
    pub fn new(
        networks: Vec<ReplayNetwork>,
        options: ReplayOptions,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<ScannerEvent>,
    ) -> Self {
        Self {
            networks,
            options,
            clock,
            events,
            runtime: Handle::current(),
            state: Mutex::new(ReplayState::default()),
        }
    }

    /// Parse a JSON array of [`ReplayNetwork`]
    pub fn parse_fixture(json: &str) -> ScanResult<Vec<ReplayNetwork>> {
        let networks: Vec<ReplayNetwork> = serde_json::from_str(json)?;
        if networks.iter().any(|n| n.ssid.len() > 32) {
            return Err(ScanError::Fixture("SSID longer than 32 bytes".into()));
        }
        Ok(networks)
    }

    pub fn load_fixture(path: &Path) -> ScanResult<Vec<ReplayNetwork>> {
        let json = std::fs::read_to_string(path)?;
        Self::parse_fixture(&json)
            .map_err(|e| ScanError::Fixture(format!("{}: {}", path.display(), e)))
    }

    pub fn default_fixture() -> ScanResult<Vec<ReplayNetwork>> {
        Self::parse_fixture(DEFAULT_FIXTURE_JSON)
    }

    pub fn scans_issued(&self) -> u64 {
        self.lock_state().scans_issued
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ReplayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn post_after(&self, event: DriverEvent) {
        let tx = self.events.clone();
        let delay = self.options.completion_delay;
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(ScannerEvent::Driver(event)).is_err() {
                debug!("Dispatch queue closed; dropping driver event");
            }
        });
    }
}

impl ScanDriver for ReplayDriver {
    fn scan(
        &self,
        iface: &str,
        scan_type: ScanType,
        frequencies: &FrequencySet,
        hidden_networks: &[String],
        enable_6ghz_rnr: bool,
        vendor_elements: Option<&[u8]>,
    ) -> ReasonCode {
        info!(
            "Replay scan on {}: {} over {} frequencies, {} hidden, rnr={}, {} vendor bytes",
            iface,
            scan_type,
            frequencies.len(),
            hidden_networks.len(),
            enable_6ghz_rnr,
            vendor_elements.map_or(0, <[u8]>::len)
        );

        if self.options.outcome == ReplayOutcome::Reject {
            return self.options.failure_reason;
        }

        {
            let mut state = self.lock_state();
            state.last_scan_start_nanos = Some(self.clock.now_nanos());
            state.scans_issued += 1;
        }

        match self.options.outcome {
            ReplayOutcome::Results => self.post_after(DriverEvent::ResultsAvailable {
                iface: iface.to_string(),
            }),
            ReplayOutcome::Failure => self.post_after(DriverEvent::ScanFailed {
                iface: iface.to_string(),
                reason: self.options.failure_reason,
            }),
            ReplayOutcome::Silent | ReplayOutcome::Reject => {}
        }
        ReasonCode::Succeeded
    }

    fn get_scan_results(&self, _iface: &str) -> Vec<RawScanRecord> {
        let Some(start_nanos) = self.lock_state().last_scan_start_nanos else {
            return Vec::new();
        };
        let start_micros = (start_nanos / 1_000) as i64;

        self.networks
            .iter()
            .map(|n| RawScanRecord {
                ssid: n.ssid.clone(),
                bssid: n.bssid.clone(),
                signal_strength: n.rssi,
                frequency: n.frequency,
                timestamp_micros: start_micros
                    .saturating_add(n.offset_ms.saturating_mul(1_000))
                    .max(0) as u64,
                information_elements: n.information_elements.clone(),
            })
            .collect()
    }

    fn max_scan_ssids(&self) -> usize {
        self.options.max_scan_ssids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::event::EventQueue;

    #[test]
    fn default_fixture_parses() {
        let networks = ReplayDriver::default_fixture().unwrap();
        assert!(!networks.is_empty());
        assert!(networks.iter().any(|n| n.offset_ms < 0));
    }

    #[test]
    fn overlong_ssid_is_rejected() {
        let json = r#"[{
            "ssid": "0123456789012345678901234567890123",
            "bssid": "00:00:00:00:00:01",
            "rssi": -50,
            "frequency": 2412
        }]"#;
        assert!(matches!(
            ReplayDriver::parse_fixture(json),
            Err(ScanError::Fixture(_))
        ));
    }

    #[test]
    fn missing_fixture_file_is_an_io_error() {
        let err = ReplayDriver::load_fixture(Path::new("/nonexistent/networks.json")).unwrap_err();
        assert!(matches!(err, ScanError::Io(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn admitted_scan_posts_results_and_restamps_records() {
        let mut queue = EventQueue::new();
        let networks = vec![
            ReplayNetwork {
                ssid: "fresh".into(),
                bssid: "00:00:00:00:00:01".into(),
                rssi: -40,
                frequency: 2412,
                offset_ms: 50,
                information_elements: vec![],
            },
            ReplayNetwork {
                ssid: "stale".into(),
                bssid: "00:00:00:00:00:02".into(),
                rssi: -60,
                frequency: 2412,
                offset_ms: -5_000,
                information_elements: vec![],
            },
        ];
        let clock = Arc::new(MonotonicClock::new());
        let driver = ReplayDriver::new(networks, ReplayOptions::default(), clock, queue.sender());

        let freqs: FrequencySet = [2412].into_iter().collect();
        let status = driver.scan("wlan0", ScanType::LowLatency, &freqs, &[], false, None);
        assert_eq!(status, ReasonCode::Succeeded);
        assert_eq!(driver.scans_issued(), 1);

        match queue.next().await {
            Some(ScannerEvent::Driver(DriverEvent::ResultsAvailable { iface })) => {
                assert_eq!(iface, "wlan0")
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let records = driver.get_scan_results("wlan0");
        assert_eq!(records.len(), 2);
        assert!(records[0].timestamp_micros > records[1].timestamp_micros);
    }

    #[tokio::test]
    async fn extreme_offsets_are_clamped() {
        let queue = EventQueue::new();
        let network = |ssid: &str, offset_ms| ReplayNetwork {
            ssid: ssid.into(),
            bssid: "00:00:00:00:00:01".into(),
            rssi: -50,
            frequency: 2412,
            offset_ms,
            information_elements: vec![],
        };
        let options = ReplayOptions {
            outcome: ReplayOutcome::Silent,
            ..Default::default()
        };
        let driver = ReplayDriver::new(
            vec![network("future", i64::MAX), network("ancient", i64::MIN)],
            options,
            Arc::new(MonotonicClock::new()),
            queue.sender(),
        );

        let freqs: FrequencySet = [2412].into_iter().collect();
        assert_eq!(
            driver.scan("wlan0", ScanType::LowLatency, &freqs, &[], false, None),
            ReasonCode::Succeeded
        );

        let records = driver.get_scan_results("wlan0");
        assert_eq!(records[0].timestamp_micros, i64::MAX as u64);
        assert_eq!(records[1].timestamp_micros, 0);
    }

    #[tokio::test]
    async fn reject_outcome_refuses_admission() {
        let queue = EventQueue::new();
        let options = ReplayOptions {
            outcome: ReplayOutcome::Reject,
            failure_reason: ReasonCode::Busy,
            ..Default::default()
        };
        let driver = ReplayDriver::new(
            vec![],
            options,
            Arc::new(MonotonicClock::new()),
            queue.sender(),
        );

        let empty = FrequencySet::new();
        let status = driver.scan("wlan0", ScanType::LowPower, &empty, &[], false, None);
        assert_eq!(status, ReasonCode::Busy);
        assert_eq!(driver.scans_issued(), 0);
        assert!(driver.get_scan_results("wlan0").is_empty());
    }
}
