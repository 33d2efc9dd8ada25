pub mod replay;

pub use replay::{ReplayDriver, ReplayNetwork, ReplayOptions, ReplayOutcome};

use crate::scanner::hidden::DEFAULT_MAX_SCAN_SSIDS;
use crate::scanner::types::{FrequencySet, RawScanRecord, ReasonCode, ScanType};

/// The radio control surface that performs over-the-air scans.
///
/// `scan` only answers whether the scan was admitted. Completion and
/// failure are reported later as [`DriverEvent`]s posted to the dispatch
/// queue.
pub trait ScanDriver: Send + Sync {
    fn scan(
        &self,
        iface: &str,
        scan_type: ScanType,
        frequencies: &FrequencySet,
        hidden_networks: &[String],
        enable_6ghz_rnr: bool,
        vendor_elements: Option<&[u8]>,
    ) -> ReasonCode;

    /// Everything the driver currently holds for `iface`, stale entries included
    fn get_scan_results(&self, iface: &str) -> Vec<RawScanRecord>;

    /// How many hidden SSIDs one scan can probe for
    fn max_scan_ssids(&self) -> usize {
        DEFAULT_MAX_SCAN_SSIDS
    }
}

/// Asynchronous notifications from the driver surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    ResultsAvailable { iface: String },
    ScanFailed { iface: String, reason: ReasonCode },
}

impl DriverEvent {
    pub fn iface(&self) -> &str {
        match self {
            Self::ResultsAvailable { iface } | Self::ScanFailed { iface, .. } => iface,
        }
    }
}
