use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Debug, Error)]
pub enum HarvestError {
    /// Network or HTTP failure. Fatal for a pagination run.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// A readiness wait ran out of time.
    #[error("timed out after {}ms waiting for {what}", .after.as_millis())]
    Timeout { what: String, after: Duration },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid selector {0:?}")]
    Selector(String),

    #[error("session already closed")]
    SessionClosed,

    #[error("failed to write dataset: {0}")]
    Sink(String),
}

impl HarvestError {
    pub fn transport(url: &str, message: impl ToString) -> Self {
        HarvestError::Transport {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HarvestError::Timeout { .. })
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(err: std::io::Error) -> Self {
        HarvestError::Sink(err.to_string())
    }
}

impl From<csv::Error> for HarvestError {
    fn from(err: csv::Error) -> Self {
        HarvestError::Sink(err.to_string())
    }
}

/// A fatal run failure, with what had been collected before it.
#[derive(Debug, Error)]
#[error("run aborted on page {page} after collecting {collected} records: {source}")]
pub struct RunError {
    pub collected: usize,
    pub page: u32,
    #[source]
    pub source: HarvestError,
}

/// A reveal run that failed part way, with what had been extracted so far.
#[derive(Debug, Error)]
#[error("collection aborted after {reveals} reveals and {collected} records: {source}")]
pub struct CollectError {
    pub collected: usize,
    pub reveals: u32,
    #[source]
    pub source: HarvestError,
}
