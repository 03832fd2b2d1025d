//! Crate-level error types.
//!
//! Decoder pass/fail outcomes are *not* errors — see [`crate::registry::DecodeOutcome`].
//! This module covers the surrounding failures: bad configuration, a device
//! that can't be opened, a malformed fixture string. These map onto the
//! process exit codes from the external-interfaces contract (0 normal, 1
//! configuration error, 2 device open failure).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid frequency list: {0}")]
    InvalidFrequency(String),

    #[error("unknown protocol name or number: {0}")]
    UnknownProtocol(String),

    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {reason}")]
    Malformed { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input source configured (need --device or --read-file)")]
    NoSource,

    #[error("failed to open input source {0:?}: {1}")]
    OpenFailed(String, String),
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture string is empty")]
    Empty,

    #[error("expected '{{' at offset {0}")]
    MissingOpenBrace(usize),

    #[error("expected '}}' after bit count at offset {0}")]
    MissingCloseBrace(usize),

    #[error("invalid bit count at offset {0}")]
    InvalidBitCount(usize),

    #[error("invalid hex digit {digit:?} at offset {offset}")]
    InvalidHexDigit { digit: char, offset: usize },

    #[error("row has {have} hex nibbles but declares {want} bits (need at least {need_nibbles} nibbles)")]
    TooFewNibbles {
        have: usize,
        want: usize,
        need_nibbles: usize,
    },
}

/// Exit code mapping from the External Interfaces contract.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const DEVICE_OPEN_FAILURE: i32 = 2;
}
