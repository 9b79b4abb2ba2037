//! Error types for every stage of a snapshot run.
//!
//! Only [`ConfigError`] is fatal. Everything raised while a snapshot cycle is
//! in flight ends up in a [`CycleError`], which the scheduler logs before
//! moving on to the next tick.

use std::path::PathBuf;

use alloy::primitives::hex::FromHexError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid json_rpc_address {url:?}: {reason}")]
    InvalidRpcAddress { url: String, reason: String },

    #[error("invalid address {value:?} in {field}: {source}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        #[source]
        source: AddressError,
    },

    #[error(
        "asset_map name {name:?} of market {address} \
         contains a tab or a line break"
    )]
    InvalidAssetName { address: String, name: String },

    #[error("asset_map lists market {address} more than once")]
    DuplicateAsset { address: String },

    #[error("scan_interval must be a positive number of seconds")]
    ZeroScanInterval,

    #[error("snapshot_window of {0} seconds is out of range")]
    WindowOutOfRange(u64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressError {
    #[error("not valid hex: {0}")]
    Hex(#[from] FromHexError),

    #[error("expected 20 bytes, got {0}")]
    Length(usize),
}

/// A result buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error(
        "unexpected end of buffer reading {what}: \
         needed {needed} bytes, {remaining} left"
    )]
    UnexpectedEof { what: &'static str, needed: usize, remaining: usize },

    #[error("irregular var-uint encoding of {value}")]
    IrregularVarUint { value: u64 },
}

/// A read-only contract invocation failed before yielding a result buffer.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("RPC transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {desc}")]
    Rpc { code: i64, desc: String },

    #[error("pre-exec response has no result")]
    MissingResult,

    #[error("contract execution failed with state {0}")]
    ExecutionFailed(u8),

    #[error("pre-exec result is not hex: {0}")]
    ResultHex(#[from] FromHexError),
}

/// A failed call to one contract accessor.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invoking {method} on {contract}: {source}")]
    Invocation {
        contract: String,
        method: &'static str,
        #[source]
        source: InvocationError,
    },

    #[error("decoding {method} result from {contract}: {source}")]
    Decode {
        contract: String,
        method: &'static str,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("listing markets: {0}")]
    ListMarkets(#[source] ChainError),

    #[error("querying reserves of market {market}: {source}")]
    Market {
        market: String,
        #[source]
        source: ChainError,
    },
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("aggregating reserves: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("writing snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing snapshot {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
