use std::collections::BTreeSet;
use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Set of centre frequencies in MHz. Ordered only so that logs and
/// comparisons are stable.
pub type FrequencySet = BTreeSet<u32>;

/// Identity of one active background scan configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackgroundScanId(pub u32);

impl fmt::Display for BackgroundScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Radio scan mode requested from the driver
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ScanType {
    #[default]
    LowLatency,
    LowPower,
    HighAccuracy,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowLatency => write!(f, "low-latency"),
            Self::LowPower => write!(f, "low-power"),
            Self::HighAccuracy => write!(f, "high-accuracy"),
        }
    }
}

/// A contiguous block of channels in the channel table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubBand {
    Ghz24,
    /// 5 GHz channels without DFS requirements
    Ghz5,
    /// 5 GHz channels subject to DFS
    Ghz5Dfs,
    Ghz6,
    Ghz60,
}

/// Named band a bucket may scan instead of explicit channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Band {
    Ghz24,
    Ghz5,
    Ghz5DfsOnly,
    Ghz5WithDfs,
    Ghz24And5,
    Ghz24And5WithDfs,
    Ghz6,
    Ghz60,
    All,
}

impl Band {
    /// The channel-table blocks this band is made of
    pub fn sub_bands(self) -> &'static [SubBand] {
        use SubBand::*;
        match self {
            Self::Ghz24 => &[Ghz24],
            Self::Ghz5 => &[Ghz5],
            Self::Ghz5DfsOnly => &[Ghz5Dfs],
            Self::Ghz5WithDfs => &[Ghz5, Ghz5Dfs],
            Self::Ghz24And5 => &[Ghz24, Ghz5],
            Self::Ghz24And5WithDfs => &[Ghz24, Ghz5, Ghz5Dfs],
            Self::Ghz6 => &[Ghz6],
            Self::Ghz60 => &[Ghz60],
            Self::All => &[Ghz24, Ghz5, Ghz5Dfs, Ghz6, Ghz60],
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ghz24 => write!(f, "2.4 GHz"),
            Self::Ghz5 => write!(f, "5 GHz"),
            Self::Ghz5DfsOnly => write!(f, "5 GHz (DFS only)"),
            Self::Ghz5WithDfs => write!(f, "5 GHz + DFS"),
            Self::Ghz24And5 => write!(f, "2.4 + 5 GHz"),
            Self::Ghz24And5WithDfs => write!(f, "2.4 + 5 GHz + DFS"),
            Self::Ghz6 => write!(f, "6 GHz"),
            Self::Ghz60 => write!(f, "60 GHz"),
            Self::All => write!(f, "all bands"),
        }
    }
}

/// Per-bucket reporting flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportFlags(u32);

impl ReportFlags {
    pub const AFTER_BUFFER_FULL: Self = Self(0);
    pub const AFTER_EACH_SCAN: Self = Self(1);
    pub const FULL_SCAN_RESULT: Self = Self(2);
    pub const NO_BATCH: Self = Self(4);

    /// `AFTER_BUFFER_FULL` is the zero value, so it is contained in every set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether results are reported in batches at all
    pub const fn is_batched(self) -> bool {
        !self.contains(Self::NO_BATCH)
    }
}

impl BitOr for ReportFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Status codes shared by driver admission results and failure reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    Succeeded,
    Unspecified,
    InvalidListener,
    InvalidRequest,
    NotAuthorized,
    DuplicateRequest,
    Busy,
    Abort,
    NoDevice,
    InvalidArgs,
    /// Produced by the scan core itself, never by the driver
    Timeout,
}

impl ReasonCode {
    pub fn code(self) -> i32 {
        match self {
            Self::Succeeded => 0,
            Self::Unspecified => -1,
            Self::InvalidListener => -2,
            Self::InvalidRequest => -3,
            Self::NotAuthorized => -4,
            Self::DuplicateRequest => -5,
            Self::Busy => -6,
            Self::Abort => -7,
            Self::NoDevice => -8,
            Self::InvalidArgs => -9,
            Self::Timeout => -10,
        }
    }

    /// Unknown codes collapse to `Unspecified`
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Succeeded,
            -2 => Self::InvalidListener,
            -3 => Self::InvalidRequest,
            -4 => Self::NotAuthorized,
            -5 => Self::DuplicateRequest,
            -6 => Self::Busy,
            -7 => Self::Abort,
            -8 => Self::NoDevice,
            -9 => Self::InvalidArgs,
            -10 => Self::Timeout,
            _ => Self::Unspecified,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Succeeded => "succeeded",
            Self::Unspecified => "unspecified",
            Self::InvalidListener => "invalid listener",
            Self::InvalidRequest => "invalid request",
            Self::NotAuthorized => "not authorized",
            Self::DuplicateRequest => "duplicate request",
            Self::Busy => "busy",
            Self::Abort => "aborted",
            Self::NoDevice => "no device",
            Self::InvalidArgs => "invalid arguments",
            Self::Timeout => "timeout",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// A network detection as reported by the driver surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScanRecord {
    pub ssid: String,
    pub bssid: String,
    /// dBm
    pub signal_strength: i32,
    /// MHz
    pub frequency: u32,
    /// Monotonic detection time in microseconds
    pub timestamp_micros: u64,
    #[serde(default)]
    pub information_elements: Vec<u8>,
}

impl RawScanRecord {
    pub fn new(
        ssid: impl Into<String>,
        bssid: impl Into<String>,
        signal_strength: i32,
        frequency: u32,
        timestamp_micros: u64,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            bssid: bssid.into(),
            signal_strength,
            frequency,
            timestamp_micros,
            information_elements: Vec::new(),
        }
    }

    /// Detection time on the nanosecond scale used for scan start stamps
    pub fn timestamp_nanos(&self) -> u64 {
        self.timestamp_micros.saturating_mul(1_000)
    }
}

/// Reconciled results of one completed scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResultSet {
    /// Bit i is set when bucket i was part of the scan. Always 0 for single scans.
    pub buckets_scanned: u32,
    pub results: Vec<RawScanRecord>,
}

impl ScanResultSet {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RawScanRecord> {
        self.results.iter()
    }

    pub fn ssids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.ssid.as_str()).collect()
    }
}
