use std::sync::Arc;

use crate::campaigns::record::decode_detail_record;
use crate::campaigns::{CampaignDetail, Denylist};
use crate::chain::{CAMPAIGN_DETAILS_SELECTOR, ChainReader};
use crate::config::IndexerConfig;
use crate::error::Error;
use crate::types::{Address, CallOutcome, ContractCall};
use crate::units::CAMPAIGN_AMOUNT_DECIMALS;

/// Reads and decodes detail records for many campaigns in one batched call.
#[derive(Debug, Clone)]
pub struct BatchDetailAggregator {
    selector: String,
    decimals: u32,
}

impl Default for BatchDetailAggregator {
    fn default() -> Self {
        Self::new(CAMPAIGN_DETAILS_SELECTOR, CAMPAIGN_AMOUNT_DECIMALS)
    }
}

impl BatchDetailAggregator {
    pub fn new(selector: &str, decimals: u32) -> Self {
        Self {
            selector: selector.to_string(),
            decimals,
        }
    }

    pub fn from_config(config: &IndexerConfig) -> Self {
        Self::new(&config.detail_selector, config.campaign_decimals)
    }

    /// Returns one [`CampaignDetail`] per address whose read succeeded with a
    /// well-formed record, in input order. Failed or malformed items are
    /// logged and dropped; only a failure of the batch request itself is an
    /// error.
    pub async fn aggregate<R: ChainReader>(
        &self,
        reader: &R,
        addresses: &[Address],
    ) -> Result<Vec<CampaignDetail>, Error> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let calls: Vec<ContractCall> = addresses
            .iter()
            .map(|address| ContractCall {
                address: address.clone(),
                selector: self.selector.clone(),
            })
            .collect();
        let outcomes = reader.batch_read(&calls).await?;
        if outcomes.len() != addresses.len() {
            tracing::warn!(
                requested = addresses.len(),
                received = outcomes.len(),
                "batch read returned a mismatched number of results"
            );
        }

        let details: Vec<CampaignDetail> = addresses
            .iter()
            .zip(outcomes.iter())
            .filter_map(|(address, outcome)| self.decode_outcome(address, outcome))
            .collect();

        tracing::info!(
            requested = addresses.len(),
            decoded = details.len(),
            "aggregated campaign details"
        );
        Ok(details)
    }

    fn decode_outcome(&self, address: &Address, outcome: &CallOutcome) -> Option<CampaignDetail> {
        match outcome {
            CallOutcome::Success { result } => {
                match decode_detail_record(address, result, self.decimals) {
                    Ok(detail) => Some(detail),
                    Err(e) => {
                        tracing::warn!(%address, error = %e, "dropping malformed campaign record");
                        None
                    }
                }
            }
            CallOutcome::Failure { error } => {
                tracing::warn!(%address, %error, "campaign detail read failed");
                None
            }
        }
    }
}

/// Lists the campaigns deployed by a factory.
pub struct CampaignDirectory<R> {
    reader: Arc<R>,
    aggregator: BatchDetailAggregator,
    denylist: Denylist,
}

impl<R: ChainReader> CampaignDirectory<R> {
    pub fn new(reader: Arc<R>, aggregator: BatchDetailAggregator, denylist: Denylist) -> Self {
        Self {
            reader,
            aggregator,
            denylist,
        }
    }

    pub fn from_config(reader: Arc<R>, config: &IndexerConfig) -> Self {
        Self::new(
            reader,
            BatchDetailAggregator::from_config(config),
            config.denylist.iter().cloned().collect(),
        )
    }

    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    /// Reads the factory's deployed list, aggregates details and removes
    /// denied campaigns.
    pub async fn list_campaigns(&self, factory: &Address) -> Result<Vec<CampaignDetail>, Error> {
        let addresses = self.reader.list_deployed(factory).await?;
        tracing::debug!(%factory, count = addresses.len(), "factory returned campaigns");
        let details = self.aggregator.aggregate(self.reader.as_ref(), &addresses).await?;
        Ok(self.denylist.apply(details))
    }
}
