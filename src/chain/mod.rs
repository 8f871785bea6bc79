pub mod abi;

use std::future::Future;

use futures::stream::BoxStream;
use sha3::{Digest, Keccak256};

use crate::error::Error;
use crate::types::{Address, CallOutcome, ContractCall, LogFilter, RawLog};

pub const DONATED_EVENT_SIGNATURE: &str = "Donated(address,uint256,uint256)";
pub const CAMPAIGN_DETAILS_SELECTOR: &str = "getCampaignDetails";

/// Push stream of logs produced by [`ChainReader::subscribe`].
pub type LogStream = BoxStream<'static, Result<RawLog, Error>>;

/// Read-only access to a remote node.
///
/// Every method is a single round trip. Implementations decide transport,
/// retries and timeouts; this crate adds none on top.
pub trait ChainReader: Send + Sync {
    /// Deployed bytecode at `address` as of `height`. Empty when there is none.
    fn code_at(
        &self,
        address: &Address,
        height: u64,
    ) -> impl Future<Output = Result<Vec<u8>, Error>> + Send;

    fn current_height(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    fn logs(&self, filter: &LogFilter) -> impl Future<Output = Result<Vec<RawLog>, Error>> + Send;

    /// Opens a push stream of new logs emitted by `address` under `topic`.
    fn subscribe(
        &self,
        address: &Address,
        topic: &str,
    ) -> impl Future<Output = Result<LogStream, Error>> + Send;

    /// Executes all `calls` in one request. A failing call yields a
    /// [`CallOutcome::Failure`] entry instead of failing the request.
    fn batch_read(
        &self,
        calls: &[ContractCall],
    ) -> impl Future<Output = Result<Vec<CallOutcome>, Error>> + Send;

    /// Addresses of every campaign deployed by `factory`.
    fn list_deployed(
        &self,
        factory: &Address,
    ) -> impl Future<Output = Result<Vec<Address>, Error>> + Send;
}

/// An event identified by its canonical Solidity signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    signature: String,
    topic: String,
}

impl EventDescriptor {
    pub fn new(signature: &str) -> Self {
        Self {
            signature: signature.to_string(),
            topic: event_topic(signature),
        }
    }

    pub fn donated() -> Self {
        Self::new(DONATED_EVENT_SIGNATURE)
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// `topics[0]` value of matching logs.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn matches(&self, log: &RawLog) -> bool {
        log.topics
            .first()
            .is_some_and(|t| t.eq_ignore_ascii_case(&self.topic))
    }
}

/// Keccak-256 of the event signature, hex encoded with `0x` prefix.
pub fn event_topic(signature: &str) -> String {
    let digest = Keccak256::digest(signature.as_bytes());
    format!("0x{}", hex::encode(digest))
}
