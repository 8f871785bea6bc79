use crate::types::{Address, BlockRange};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("parse error: {reason}")]
    Parse { reason: String },

    #[error("no contract code at {address} as of block {latest}")]
    NotFound { address: Address, latest: u64 },

    #[error("log query for blocks {range} failed: {reason}")]
    ChunkFetch { range: BlockRange, reason: String },

    #[error("decode error for {context}: {reason}")]
    Decode { context: String, reason: String },

    #[error("cache entry {key} is unreadable: {reason}")]
    CacheParse { key: String, reason: String },

    #[error("subscription for {address} ended: {reason}")]
    Subscription { address: Address, reason: String },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn decode(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
