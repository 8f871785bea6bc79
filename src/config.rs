use std::num::NonZeroU64;
use std::time::Duration;

use serde::Deserialize;

use crate::chain::{CAMPAIGN_DETAILS_SELECTOR, DONATED_EVENT_SIGNATURE, EventDescriptor};
use crate::error::Error;
use crate::types::Address;
use crate::units::{CAMPAIGN_AMOUNT_DECIMALS, DONATION_TOKEN_DECIMALS};

/// Block span of one log query. Kept below the 500-block cap that common
/// hosted providers enforce on `eth_getLogs`.
pub const DEFAULT_CHUNK_SIZE: u64 = 500;
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexerConfig {
    pub chunk_size: u64,
    pub chunk_delay_ms: u64,
    pub donation_decimals: u32,
    pub campaign_decimals: u32,
    pub donation_event: String,
    pub detail_selector: String,
    pub factory_address: Option<Address>,
    pub denylist: Vec<Address>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay_ms: DEFAULT_CHUNK_DELAY_MS,
            donation_decimals: DONATION_TOKEN_DECIMALS,
            campaign_decimals: CAMPAIGN_AMOUNT_DECIMALS,
            donation_event: DONATED_EVENT_SIGNATURE.to_string(),
            detail_selector: CAMPAIGN_DETAILS_SELECTOR.to_string(),
            factory_address: None,
            denylist: Vec::new(),
        }
    }
}

impl IndexerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.chunk_size == 0 {
            return Err(Error::Parse {
                reason: "chunkSize must be greater than zero".into(),
            });
        }
        if self.donation_event.trim().is_empty() {
            return Err(Error::Parse {
                reason: "donationEvent must not be empty".into(),
            });
        }
        if self.detail_selector.trim().is_empty() {
            return Err(Error::Parse {
                reason: "detailSelector must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn chunk_size(&self) -> NonZeroU64 {
        NonZeroU64::new(self.chunk_size).unwrap_or(NonZeroU64::MIN)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn donation_event(&self) -> EventDescriptor {
        EventDescriptor::new(&self.donation_event)
    }
}
