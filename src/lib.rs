//! nexus-scan: scan orchestration between a wireless scanning API and a
//! radio driver surface.
//!
//! A [`scanner::WifiScanner`] per interface accepts single and background
//! scan requests, resolves them into concrete driver requests, and
//! reconciles the driver's asynchronous notifications with the requests
//! that caused them. Every notification, timer expiry and deferred failure
//! flows through one [`event::EventQueue`], so scanner state is never
//! touched concurrently.

pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod scanner;
pub mod timer;

pub use error::{ScanError, ScanResult};
pub use event::{EventQueue, ScannerEvent};
pub use scanner::{ScannerContext, ScannerRegistry, WifiScanner};
