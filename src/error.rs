use thiserror::Error;

/// Errors reported by [`ShardedMap`](crate::ShardedMap).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A read access targeted a key that is not in the map.
    #[error("key not found")]
    KeyNotFound,

    /// The shard or mutex layout was rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
