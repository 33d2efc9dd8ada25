use super::channels::{ChannelTable, FrequencySetResolver};
use super::hidden::HiddenNetworkListBuilder;
use super::settings::{BucketSettings, ScanSettings};
use super::types::{FrequencySet, ScanType};
use crate::error::{ScanError, ScanResult};

/// Concrete request handed to the driver surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub scan_type: ScanType,
    pub frequencies: FrequencySet,
    pub hidden_networks: Vec<String>,
    pub enable_6ghz_rnr: bool,
    pub vendor_elements: Option<Vec<u8>>,
}

impl ResolvedRequest {
    /// Resolve every bucket of `settings`
    pub fn resolve(
        settings: &ScanSettings,
        table: &dyn ChannelTable,
        hidden: HiddenNetworkListBuilder,
    ) -> ScanResult<Self> {
        Self::resolve_buckets(settings, &settings.buckets, table, hidden)
    }

    /// Resolve a subset of the buckets of `settings`, keeping its other parameters
    pub fn resolve_buckets<'b, I>(
        settings: &ScanSettings,
        buckets: I,
        table: &dyn ChannelTable,
        hidden: HiddenNetworkListBuilder,
    ) -> ScanResult<Self>
    where
        I: IntoIterator<Item = &'b BucketSettings>,
    {
        let frequencies = FrequencySetResolver::new(table).resolve(buckets)?;
        if frequencies.is_empty() {
            return Err(ScanError::NoChannels);
        }
        Ok(Self {
            scan_type: settings.scan_type,
            frequencies,
            hidden_networks: hidden.build(&settings.hidden_networks),
            enable_6ghz_rnr: settings.enable_6ghz_rnr,
            vendor_elements: settings.vendor_elements.clone(),
        })
    }
}
