use thiserror::Error;

use crate::scanner::types::ReasonCode;

/// Unified error type for nexus-scan
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Unknown channel: {0} has no entry in the channel table")]
    UnknownChannel(u32),

    #[error("No channels to scan")]
    NoChannels,

    #[error("Unknown interface: {0}")]
    UnknownInterface(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    /// Reason reported to a scan handler when this error rejects a request
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::UnknownChannel(_) => ReasonCode::InvalidRequest,
            Self::UnknownInterface(_) => ReasonCode::NoDevice,
            _ => ReasonCode::Unspecified,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
