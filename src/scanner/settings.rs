use super::types::{Band, ReportFlags, ScanType};

/// What a bucket scans: a named band or an explicit channel list, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketTarget {
    Band(Band),
    /// Channel numbers or centre frequencies, as understood by the channel table
    Channels(Vec<u32>),
}

/// One scan-configuration unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSettings {
    pub period_millis: u32,
    pub report_flags: ReportFlags,
    pub target: BucketTarget,
}

/// A scan request as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSettings {
    pub scan_type: ScanType,
    pub base_period_millis: u32,
    pub max_results_per_scan: u32,
    pub buckets: Vec<BucketSettings>,
    pub hidden_networks: Vec<String>,
    pub enable_6ghz_rnr: bool,
    pub vendor_elements: Option<Vec<u8>>,
}

impl ScanSettings {
    pub fn builder() -> ScanSettingsBuilder {
        ScanSettingsBuilder::default()
    }

    /// Combined report flags of every bucket
    pub fn report_flags(&self) -> ReportFlags {
        self.buckets
            .iter()
            .fold(ReportFlags::default(), |acc, b| acc | b.report_flags)
    }

    /// Whether any bucket asked for per-record full results
    pub fn wants_full_results(&self) -> bool {
        self.report_flags().contains(ReportFlags::FULL_SCAN_RESULT)
    }
}

/// Fluent construction of [`ScanSettings`]
#[derive(Debug, Clone, Default)]
pub struct ScanSettingsBuilder {
    settings: ScanSettings,
}

impl ScanSettingsBuilder {
    pub fn with_type(mut self, scan_type: ScanType) -> Self {
        self.settings.scan_type = scan_type;
        self
    }

    pub fn with_base_period(mut self, millis: u32) -> Self {
        self.settings.base_period_millis = millis;
        self
    }

    pub fn with_max_ap_per_scan(mut self, max: u32) -> Self {
        self.settings.max_results_per_scan = max;
        self
    }

    pub fn add_bucket_with_band(
        mut self,
        period_millis: u32,
        flags: ReportFlags,
        band: Band,
    ) -> Self {
        self.settings.buckets.push(BucketSettings {
            period_millis,
            report_flags: flags,
            target: BucketTarget::Band(band),
        });
        self
    }

    pub fn add_bucket_with_channels(
        mut self,
        period_millis: u32,
        flags: ReportFlags,
        channels: &[u32],
    ) -> Self {
        self.settings.buckets.push(BucketSettings {
            period_millis,
            report_flags: flags,
            target: BucketTarget::Channels(channels.to_vec()),
        });
        self
    }

    pub fn with_hidden_networks<I, S>(mut self, ssids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.hidden_networks = ssids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_6ghz_rnr(mut self, enabled: bool) -> Self {
        self.settings.enable_6ghz_rnr = enabled;
        self
    }

    pub fn with_vendor_elements(mut self, elements: &[u8]) -> Self {
        self.settings.vendor_elements = Some(elements.to_vec());
        self
    }

    pub fn build(self) -> ScanSettings {
        self.settings
    }
}
