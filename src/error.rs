// src/error.rs
//! Error taxonomy for the ingestion pipeline.
//!
//! Every stage boundary returns one of these. The pipeline decides per stage whether a
//! failure costs one tuple (normalization), one source (fetch/extraction) or one chunk
//! (storage). Only `ConfigError` is allowed to stop the process, and only at startup.

use thiserror::Error;

/// Transport-level failures. A source that hits one of these contributes zero records.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("page at {url} looks blocked or empty ({bytes} bytes)")]
    Blocked { url: String, bytes: usize },

    #[error("timed out after {secs}s waiting for content at {url}")]
    Timeout { url: String, secs: u64 },

    #[error("could not parse feed at {url}: {message}")]
    Parse { url: String, message: String },
}

/// Malformed field text. The tuple carrying it is dropped, never escalated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("invalid date text: {0:?}")]
    InvalidDate(String),

    #[error("invalid location text: {0:?}")]
    InvalidLocation(String),

    #[error("empty title")]
    EmptyTitle,
}

/// No strategy in the chain produced usable rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no extraction strategy produced rows for {url}")]
    EmptyExtraction { url: String },
}

/// Storage failures, reported per chunk by the writer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage network error: {0}")]
    Network(String),

    #[error("storage API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("conflict on `{key}`: {message}")]
    Conflict { key: String, message: String },
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}

/// Missing or malformed configuration. Fatal at startup only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("failed to read config at {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}
