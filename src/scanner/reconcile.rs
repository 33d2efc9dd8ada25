use tracing::debug;

use super::types::{FrequencySet, RawScanRecord, ScanResultSet};

/// Turns the driver's raw records into the result set of one scan.
///
/// Records detected before the scan started are leftovers from an earlier
/// cycle and are dropped. When a frequency set is attached, records on
/// frequencies that were not requested are dropped as well.
#[derive(Debug, Clone)]
pub struct ResultReconciler<'a> {
    scan_start_nanos: u64,
    frequencies: Option<&'a FrequencySet>,
    buckets_scanned: u32,
}

impl<'a> ResultReconciler<'a> {
    pub fn new(scan_start_nanos: u64) -> Self {
        Self {
            scan_start_nanos,
            frequencies: None,
            buckets_scanned: 0,
        }
    }

    pub fn with_frequencies(mut self, frequencies: &'a FrequencySet) -> Self {
        self.frequencies = Some(frequencies);
        self
    }

    pub fn with_buckets_scanned(mut self, buckets_scanned: u32) -> Self {
        self.buckets_scanned = buckets_scanned;
        self
    }

    pub fn reconcile(&self, raw: &[RawScanRecord]) -> ScanResultSet {
        let mut results: Vec<RawScanRecord> = raw
            .iter()
            .filter(|r| r.timestamp_nanos() >= self.scan_start_nanos)
            .filter(|r| {
                self.frequencies
                    .map_or(true, |freqs| freqs.contains(&r.frequency))
            })
            .cloned()
            .collect();

        // stable: equal signal keeps driver order
        results.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));

        if results.len() != raw.len() {
            debug!("Dropped {} of {} raw records", raw.len() - results.len(), raw.len());
        }

        ScanResultSet {
            buckets_scanned: self.buckets_scanned,
            results,
        }
    }
}

/// Stale-filter and order `raw` against a scan that started at `scan_start_nanos`
pub fn reconcile(raw: &[RawScanRecord], scan_start_nanos: u64) -> ScanResultSet {
    ResultReconciler::new(scan_start_nanos).reconcile(raw)
}
