use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;
use tracing::info;

use crate::driver::{ReplayOptions, ReplayOutcome};
use crate::scanner::types::{Band, ReasonCode, ReportFlags, ScanType};
use crate::scanner::ScanSettings;

// ─── Embedded Default ────────────────────────────────────────────────────
/// Baked into the binary at compile time. Always available as the base layer.
const DEFAULT_CONFIG_TOML: &str = include_str!("../default_config.toml");

// ─── CLI Arguments (override layer) ─────────────────────────────────────
/// nexus-scan: run wireless scans through the scan orchestration core
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "nexus-scan", version, about, long_about = None)]
pub struct CliArgs {
    /// Interface to scan on (overrides config file)
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Log level filter (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Path to a custom config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the default config to stdout and exit
    #[arg(long)]
    pub print_default_config: bool,

    /// Band to scan
    #[arg(short, long, value_enum)]
    pub band: Option<Band>,

    /// Extra channel to scan, by number or MHz (repeatable)
    #[arg(long = "channel")]
    pub channels: Vec<u32>,

    /// Hidden SSID to probe for (repeatable)
    #[arg(long = "hidden")]
    pub hidden_networks: Vec<String>,

    /// Scan type
    #[arg(long, value_enum)]
    pub scan_type: Option<ScanType>,

    /// Print each result as it is reported
    #[arg(long)]
    pub full_results: bool,

    /// Enable 6 GHz reduced neighbour report discovery
    #[arg(long)]
    pub rnr: bool,

    /// Scan timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// JSON fixture of networks for the replay driver
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// How the replay driver answers
    #[arg(long, value_enum)]
    pub outcome: Option<ReplayOutcome>,

    /// Run a batched scan for this many cycles instead of a single scan
    #[arg(long)]
    pub batched: Option<u32>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

// ─── TOML Structs ───────────────────────────────────────────────────────

/// Root configuration, parsed from TOML, then overridden by CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub interface: String,
    pub log_level: String,
    /// Empty string = log to stderr
    pub log_file: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub timeout_ms: u64,
    pub scan_type: ScanType,
    pub band: Option<Band>,
    pub channels: Vec<u32>,
    pub hidden_networks: Vec<String>,
    pub full_results: bool,
    pub enable_6ghz_rnr: bool,
    pub base_period_ms: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Empty string = built-in fixture
    pub fixture: String,
    pub outcome: ReplayOutcome,
    pub completion_delay_ms: u64,
    pub max_scan_ssids: usize,
}

// ─── Defaults ───────────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        // Embedded TOML is fixed at compile time
        toml::from_str(DEFAULT_CONFIG_TOML)
            .expect("BUG: embedded default_config.toml is invalid TOML")
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".into(),
            log_level: "info".into(),
            log_file: String::new(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            scan_type: ScanType::LowLatency,
            band: Some(Band::Ghz24And5),
            channels: Vec::new(),
            hidden_networks: Vec::new(),
            full_results: false,
            enable_6ghz_rnr: false,
            base_period_ms: 10_000,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            fixture: String::new(),
            outcome: ReplayOutcome::Results,
            completion_delay_ms: 300,
            max_scan_ssids: crate::scanner::hidden::DEFAULT_MAX_SCAN_SSIDS,
        }
    }
}

// ─── Path Resolution & Accessors ────────────────────────────────────────

impl Config {
    /// Standard config file path: ~/.config/nexus-scan/config.toml
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nexus-scan")
            .join("config.toml")
    }

    pub fn interface(&self) -> &str {
        self.general.interface.trim()
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        let path = self.general.log_file.trim();
        if path.is_empty() { None } else { Some(PathBuf::from(path)) }
    }

    pub fn fixture(&self) -> Option<PathBuf> {
        let path = self.replay.fixture.trim();
        if path.is_empty() { None } else { Some(PathBuf::from(path)) }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan.timeout_ms)
    }

    /// Scan request described by the `[scan]` section: one bucket for the
    /// band and one for explicit channels, whichever are configured.
    pub fn scan_settings(&self) -> ScanSettings {
        let flags = if self.scan.full_results {
            ReportFlags::AFTER_EACH_SCAN | ReportFlags::FULL_SCAN_RESULT
        } else {
            ReportFlags::AFTER_EACH_SCAN
        };
        let period = self.scan.base_period_ms;

        let mut builder = ScanSettings::builder()
            .with_type(self.scan.scan_type)
            .with_base_period(period)
            .with_hidden_networks(self.scan.hidden_networks.iter().cloned())
            .with_6ghz_rnr(self.scan.enable_6ghz_rnr);
        if let Some(band) = self.scan.band {
            builder = builder.add_bucket_with_band(period, flags, band);
        }
        if !self.scan.channels.is_empty() {
            builder = builder.add_bucket_with_channels(period, flags, &self.scan.channels);
        }
        builder.build()
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            outcome: self.replay.outcome,
            failure_reason: ReasonCode::Unspecified,
            completion_delay: Duration::from_millis(self.replay.completion_delay_ms),
            max_scan_ssids: self.replay.max_scan_ssids,
        }
    }

    /// Apply command-line overrides on top of the file values
    pub fn apply_cli(&mut self, cli: &CliArgs) {
        if let Some(ref iface) = cli.interface {
            self.general.interface = iface.clone();
        }
        if let Some(ref level) = cli.log_level {
            self.general.log_level = level.clone();
        }
        if let Some(band) = cli.band {
            self.scan.band = Some(band);
        }
        if !cli.channels.is_empty() {
            self.scan.channels = cli.channels.clone();
        }
        if !cli.hidden_networks.is_empty() {
            self.scan.hidden_networks = cli.hidden_networks.clone();
        }
        if let Some(scan_type) = cli.scan_type {
            self.scan.scan_type = scan_type;
        }
        if cli.full_results {
            self.scan.full_results = true;
        }
        if cli.rnr {
            self.scan.enable_6ghz_rnr = true;
        }
        if let Some(timeout) = cli.timeout_ms {
            self.scan.timeout_ms = timeout;
        }
        if let Some(ref fixture) = cli.fixture {
            self.replay.fixture = fixture.display().to_string();
        }
        if let Some(outcome) = cli.outcome {
            self.replay.outcome = outcome;
        }
    }
}

// ─── Bootloader ─────────────────────────────────────────────────────────

/// The single entry point for configuration. Called exactly once at startup.
///
/// 1. Resolve config file path (CLI override or default)
/// 2. If the config file doesn't exist, create directory tree + write defaults
/// 3. Parse TOML from disk into Config
/// 4. Apply CLI overrides on top
pub fn load(cli: &CliArgs) -> Result<Config> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    load_from(&config_path, cli)
}

pub fn load_from(config_path: &Path, cli: &CliArgs) -> Result<Config> {
    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(config_path, DEFAULT_CONFIG_TOML).wrap_err_with(|| {
            format!(
                "Failed to write default config to {}",
                config_path.display()
            )
        })?;
        info!("Created default config at {}", config_path.display());
    }

    let toml_str = std::fs::read_to_string(config_path)
        .wrap_err_with(|| format!("Failed to read config from {}", config_path.display()))?;

    let mut config: Config = toml::from_str(&toml_str).wrap_err_with(|| {
        format!(
            "Failed to parse config at {}.\n\
             Delete the file to regenerate defaults, or run:\n  \
             nexus-scan --print-default-config > {:?}",
            config_path.display(),
            config_path
        )
    })?;

    config.apply_cli(cli);
    Ok(config)
}

/// Returns the embedded default config TOML string.
pub fn default_config_toml() -> &'static str {
    DEFAULT_CONFIG_TOML
}
