use std::collections::BTreeMap;

use tracing::debug;

use super::settings::{BucketSettings, BucketTarget};
use super::types::{FrequencySet, SubBand};
use crate::error::{ScanError, ScanResult};

/// Static band/channel to frequency mapping consumed by the resolver
pub trait ChannelTable: Send + Sync {
    /// Centre frequencies (MHz) of every channel in a block
    fn frequencies(&self, sub_band: SubBand) -> Vec<u32>;

    /// Frequency of a single channel, `None` when the table has no entry
    fn channel_frequency(&self, channel: u32) -> Option<u32>;
}

// ── IEEE 802.11 channel plan ──────────────────────────────────────────

const GHZ24_CHANNELS: [u32; 14] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];
const GHZ5_CHANNELS: [u32; 9] = [36, 40, 44, 48, 149, 153, 157, 161, 165];
const GHZ5_DFS_CHANNELS: [u32; 16] = [
    52, 56, 60, 64, 100, 104, 108, 112, 116, 120, 124, 128, 132, 136, 140, 144,
];
const GHZ60_FREQUENCIES: [u32; 6] = [58320, 60480, 62640, 64800, 66960, 69120];

fn ghz24_frequency(channel: u32) -> u32 {
    if channel == 14 {
        2484
    } else {
        2407 + channel * 5
    }
}

fn ghz5_frequency(channel: u32) -> u32 {
    5000 + channel * 5
}

/// Regulatory-agnostic 802.11 channel plan.
///
/// Explicit channels may be given either as a 2.4/5 GHz channel number or as
/// the centre frequency itself, which is the only way to name 6 GHz and
/// 60 GHz channels since their numbers overlap the 2.4 GHz ones.
pub struct StandardChannelTable {
    blocks: BTreeMap<SubBand, Vec<u32>>,
}

impl StandardChannelTable {
    pub fn new() -> Self {
        let mut blocks = BTreeMap::new();
        blocks.insert(
            SubBand::Ghz24,
            GHZ24_CHANNELS.iter().map(|&c| ghz24_frequency(c)).collect(),
        );
        blocks.insert(
            SubBand::Ghz5,
            GHZ5_CHANNELS.iter().map(|&c| ghz5_frequency(c)).collect(),
        );
        blocks.insert(
            SubBand::Ghz5Dfs,
            GHZ5_DFS_CHANNELS.iter().map(|&c| ghz5_frequency(c)).collect(),
        );
        // 6 GHz: channel 2 at 5935, then 1, 5, 9 ... 233
        let mut ghz6 = vec![5935];
        ghz6.extend((1..=233).step_by(4).map(|c| 5950 + c * 5));
        blocks.insert(SubBand::Ghz6, ghz6);
        blocks.insert(SubBand::Ghz60, GHZ60_FREQUENCIES.to_vec());
        Self { blocks }
    }

    fn is_known_frequency(&self, freq: u32) -> bool {
        self.blocks.values().any(|freqs| freqs.contains(&freq))
    }
}

impl Default for StandardChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTable for StandardChannelTable {
    fn frequencies(&self, sub_band: SubBand) -> Vec<u32> {
        self.blocks.get(&sub_band).cloned().unwrap_or_default()
    }

    fn channel_frequency(&self, channel: u32) -> Option<u32> {
        if self.is_known_frequency(channel) {
            return Some(channel);
        }
        let candidate = match channel {
            1..=14 => ghz24_frequency(channel),
            32..=177 => ghz5_frequency(channel),
            _ => return None,
        };
        self.is_known_frequency(candidate).then_some(candidate)
    }
}

// ── Resolver ──────────────────────────────────────────────────────────

/// Expands buckets into the concrete set of frequencies to scan
pub struct FrequencySetResolver<'a> {
    table: &'a dyn ChannelTable,
}

impl<'a> FrequencySetResolver<'a> {
    pub fn new(table: &'a dyn ChannelTable) -> Self {
        Self { table }
    }

    /// Union of every bucket's frequencies.
    ///
    /// Fails on the first channel the table does not know.
    pub fn resolve<'b, I>(&self, buckets: I) -> ScanResult<FrequencySet>
    where
        I: IntoIterator<Item = &'b BucketSettings>,
    {
        let mut freqs = FrequencySet::new();
        for bucket in buckets {
            match &bucket.target {
                BucketTarget::Band(band) => {
                    for sub_band in band.sub_bands() {
                        freqs.extend(self.table.frequencies(*sub_band));
                    }
                }
                BucketTarget::Channels(channels) => {
                    for &channel in channels {
                        let freq = self
                            .table
                            .channel_frequency(channel)
                            .ok_or(ScanError::UnknownChannel(channel))?;
                        freqs.insert(freq);
                    }
                }
            }
        }
        debug!("Resolved {} frequencies", freqs.len());
        Ok(freqs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::settings::ScanSettings;
    use crate::scanner::types::{Band, ReportFlags};

    #[test]
    fn standard_table_maps_numbers_and_frequencies() {
        let table = StandardChannelTable::new();
        assert_eq!(table.channel_frequency(1), Some(2412));
        assert_eq!(table.channel_frequency(14), Some(2484));
        assert_eq!(table.channel_frequency(36), Some(5180));
        assert_eq!(table.channel_frequency(132), Some(5660));
        assert_eq!(table.channel_frequency(5660), Some(5660));
        assert_eq!(table.channel_frequency(130), None);
        assert_eq!(table.channel_frequency(5955), Some(5955));
        assert_eq!(table.channel_frequency(60480), Some(60480));
        assert_eq!(table.channel_frequency(15), None);
        assert_eq!(table.channel_frequency(37), None);
        assert_eq!(table.channel_frequency(2000), None);
    }

    #[test]
    fn dfs_block_is_separate_from_plain_5ghz() {
        let table = StandardChannelTable::new();
        assert!(table.frequencies(SubBand::Ghz5).contains(&5180));
        assert!(!table.frequencies(SubBand::Ghz5).contains(&5260));
        assert!(table.frequencies(SubBand::Ghz5Dfs).contains(&5260));
        assert_eq!(table.frequencies(SubBand::Ghz6).len(), 60);
    }

    #[test]
    fn overlapping_buckets_yield_each_frequency_once() {
        let table = StandardChannelTable::new();
        let settings = ScanSettings::builder()
            .add_bucket_with_band(10_000, ReportFlags::AFTER_EACH_SCAN, Band::Ghz24)
            .add_bucket_with_channels(20_000, ReportFlags::AFTER_EACH_SCAN, &[1, 2412, 6, 36])
            .build();

        let freqs = FrequencySetResolver::new(&table)
            .resolve(&settings.buckets)
            .unwrap();

        let expected: FrequencySet = table
            .frequencies(SubBand::Ghz24)
            .into_iter()
            .chain([5180])
            .collect();
        assert_eq!(freqs, expected);
    }

    #[test]
    fn every_resolved_frequency_traces_back_to_a_bucket() {
        let table = StandardChannelTable::new();
        let settings = ScanSettings::builder()
            .add_bucket_with_band(10_000, ReportFlags::AFTER_EACH_SCAN, Band::Ghz5WithDfs)
            .add_bucket_with_channels(10_000, ReportFlags::AFTER_EACH_SCAN, &[11])
            .build();

        let freqs = FrequencySetResolver::new(&table)
            .resolve(&settings.buckets)
            .unwrap();

        let mut allowed: Vec<u32> = table.frequencies(SubBand::Ghz5);
        allowed.extend(table.frequencies(SubBand::Ghz5Dfs));
        allowed.push(2462);
        assert!(freqs.iter().all(|f| allowed.contains(f)));
        assert_eq!(freqs.len(), allowed.len());
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let table = StandardChannelTable::new();
        let settings = ScanSettings::builder()
            .add_bucket_with_channels(10_000, ReportFlags::AFTER_EACH_SCAN, &[1, 999])
            .build();

        let err = FrequencySetResolver::new(&table)
            .resolve(&settings.buckets)
            .unwrap_err();
        assert!(matches!(err, ScanError::UnknownChannel(999)));
    }
}
