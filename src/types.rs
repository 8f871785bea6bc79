use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A 20-byte EVM account or contract address.
///
/// Always held in lowercase `0x`-prefixed form so equality and hashing are
/// case-insensitive with respect to the checksummed input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub const LEN: usize = 20;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != Self::LEN {
            return Err(Error::Parse {
                reason: format!("address must be {} bytes, got {}", Self::LEN, bytes.len()),
            });
        }
        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| Error::Parse {
                reason: format!("address {trimmed:?} is missing 0x prefix"),
            })?;
        let bytes = hex::decode(digits).map_err(|e| Error::Parse {
            reason: format!("address {trimmed:?} is not hex: {e}"),
        })?;
        Self::from_bytes(&bytes)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive block-height range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> u64 {
        if self.to < self.from {
            0
        } else {
            self.to - self.from + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, height: u64) -> bool {
        self.from <= height && height <= self.to
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// Splits `[from, to]` into contiguous, non-overlapping ranges of at most
/// `chunk_size` blocks. Empty when `from > to`.
pub fn plan_chunks(from: u64, to: u64, chunk_size: NonZeroU64) -> Vec<BlockRange> {
    let span = chunk_size.get();
    let mut chunks = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(span - 1).min(to);
        chunks.push(BlockRange::new(start, end));
        match end.checked_add(1) {
            Some(next) => start = next,
            None => break,
        }
    }
    chunks
}

/// An undecoded log record as returned by the node's log query or push stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Hash of the transaction that emitted the log (hex).
    pub transaction_hash: String,
    /// Block in which the transaction landed.
    pub block_number: u64,
    /// Position of the log within its block.
    pub log_index: u32,
    /// Indexed topics, `topics[0]` being the event signature hash (hex).
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed fields (hex).
    pub data: String,
}

/// Parameters of a single log query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topic: String,
    pub range: BlockRange,
}

/// One entry of a batched multi-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub address: Address,
    /// Name of the view function to invoke, e.g. `getCampaignDetails`.
    pub selector: String,
}

/// Per-item result of a batched multi-read with partial failure allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CallOutcome {
    Success { result: serde_json::Value },
    Failure { error: String },
}
