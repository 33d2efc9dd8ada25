use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use nexus_scan::clock::{Clock, MonotonicClock};
use nexus_scan::config::{self, CliArgs, Config};
use nexus_scan::driver::ReplayDriver;
use nexus_scan::scanner::channels::StandardChannelTable;
use nexus_scan::scanner::{BackgroundScanId, ForwardingHandler, HandlerEvent, ScanResultSet};
use nexus_scan::timer::TokioTimerService;
use nexus_scan::{EventQueue, ScannerContext, ScannerRegistry, WifiScanner};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        print!("{}", config::default_config_toml());
        return Ok(());
    }

    color_eyre::install()?;

    // Layered config: embedded defaults -> config file -> CLI flags
    let config = config::load(&cli)?;
    let _log_guard = init_logging(&config)?;

    info!("nexus-scan starting on {}", config.interface());

    let mut queue = EventQueue::new();
    let mut registry = ScannerRegistry::new();
    registry.insert(build_scanner(&config, &queue)?);

    match cli.batched {
        None => run_single(&config, &cli, &mut registry, &mut queue).await?,
        Some(cycles) => run_batched(&config, &cli, cycles, &mut registry, &mut queue).await?,
    }

    info!("nexus-scan exiting");
    Ok(())
}

/// Wire a scanner for the configured interface to the replay driver
fn build_scanner(config: &Config, queue: &EventQueue) -> Result<WifiScanner> {
    let networks = match config.fixture() {
        Some(path) => ReplayDriver::load_fixture(&path)
            .wrap_err_with(|| format!("Failed to load fixture {}", path.display()))?,
        None => ReplayDriver::default_fixture().wrap_err("Built-in fixture is invalid")?,
    };

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let driver = ReplayDriver::new(
        networks,
        config.replay_options(),
        clock.clone(),
        queue.sender(),
    );

    Ok(WifiScanner::new(ScannerContext {
        iface: config.interface().to_string(),
        driver: Arc::new(driver),
        timers: Arc::new(TokioTimerService::new(queue.sender())),
        clock,
        channels: Arc::new(StandardChannelTable::new()),
        events: queue.sender(),
        scan_timeout: config.scan_timeout(),
    }))
}

// ── Single scan ───────────────────────────────────────────────────────

async fn run_single(
    config: &Config,
    cli: &CliArgs,
    registry: &mut ScannerRegistry,
    queue: &mut EventQueue,
) -> Result<()> {
    let iface = config.interface();
    let settings = config.scan_settings();
    let (handler, mut outcomes) = ForwardingHandler::channel();

    if !registry
        .get_mut(iface)?
        .start_single_scan(Some(&settings), Some(handler))
    {
        bail!("Scan on {} was refused", iface);
    }

    loop {
        match next_outcome(registry, queue, &mut outcomes).await? {
            HandlerEvent::FullResult { record, .. } => {
                if !cli.json {
                    println!(
                        "+ {} {} {} MHz",
                        display_ssid(&record.ssid),
                        record.bssid,
                        record.frequency
                    );
                }
            }
            HandlerEvent::StatusAvailable => {
                let results = registry.get(iface)?.get_latest_single_scan_results();
                print_results(&results, cli.json)?;
                return Ok(());
            }
            HandlerEvent::RequestFailed(reason) => {
                return Err(eyre!("Scan on {} failed: {}", iface, reason));
            }
        }
    }
}

// ── Batched scan ──────────────────────────────────────────────────────

async fn run_batched(
    config: &Config,
    cli: &CliArgs,
    cycles: u32,
    registry: &mut ScannerRegistry,
    queue: &mut EventQueue,
) -> Result<()> {
    if cycles == 0 {
        bail!("--batched needs at least one cycle");
    }
    let iface = config.interface();
    let settings = config.scan_settings();
    let (handler, mut outcomes) = ForwardingHandler::channel();

    let Some(id) = registry
        .get_mut(iface)?
        .start_background_scan(Some(&settings), Some(handler))
    else {
        bail!("Batched scan on {} was refused", iface);
    };

    let mut completed = 0;
    let outcome = loop {
        match next_outcome(registry, queue, &mut outcomes).await {
            Ok(HandlerEvent::FullResult { .. }) => {}
            Ok(HandlerEvent::StatusAvailable) => {
                completed += 1;
                if let Some(results) = registry.get(iface)?.get_latest_batched_scan_results(id) {
                    if !cli.json {
                        println!("── cycle {}/{} ──", completed, cycles);
                    }
                    print_results(&results, cli.json)?;
                }
                if completed >= cycles {
                    break Ok(());
                }
            }
            Ok(HandlerEvent::RequestFailed(reason)) => {
                break Err(eyre!("Batched scan {} failed: {}", id, reason));
            }
            Err(e) => break Err(e),
        }
    };

    stop(registry, iface, id);
    outcome
}

fn stop(registry: &mut ScannerRegistry, iface: &str, id: BackgroundScanId) {
    if let Ok(scanner) = registry.get_mut(iface) {
        scanner.stop_batched_scan(id);
    }
}

// ── Dispatch loop ─────────────────────────────────────────────────────

/// Serve the dispatch queue until the handler reports something
async fn next_outcome(
    registry: &mut ScannerRegistry,
    queue: &mut EventQueue,
    outcomes: &mut mpsc::UnboundedReceiver<HandlerEvent>,
) -> Result<HandlerEvent> {
    loop {
        tokio::select! {
            biased;
            Some(outcome) = outcomes.recv() => return Ok(outcome),
            Some(event) = queue.next() => registry.dispatch(event),
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                bail!("Interrupted");
            }
            else => bail!("Dispatch queue closed"),
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────

fn display_ssid(ssid: &str) -> &str {
    if ssid.is_empty() {
        "<hidden>"
    } else {
        ssid
    }
}

fn print_results(results: &ScanResultSet, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    println!("{:<32} {:<17} {:>6} {:>6}", "SSID", "BSSID", "MHz", "dBm");
    for record in results.iter() {
        println!(
            "{:<32} {:<17} {:>6} {:>6}",
            display_ssid(&record.ssid),
            record.bssid,
            record.frequency,
            record.signal_strength
        );
    }
    println!("{} networks", results.len());
    Ok(())
}

/// Initialize tracing to stderr, or to the configured log file.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    match config.log_file() {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .wrap_err_with(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
