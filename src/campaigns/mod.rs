pub mod aggregator;
pub mod record;

use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Number of links in the progress chain drawn on a campaign card.
pub const PROGRESS_CHAIN_LINKS: u32 = 12;

/// Decoded summary of one campaign contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDetail {
    pub contract_address: Address,
    pub title: String,
    pub description: String,
    /// Split from the comma-joined on-chain `imageUrl` field.
    pub image_urls: Vec<String>,
    pub goal_amount: Decimal,
    pub raised_amount: Decimal,
    pub charity_wallet: Address,
    pub creator_name: String,
    /// Unix seconds.
    pub creation_date: u64,
    /// Absent on records written before the field existed.
    pub allow_deletion: Option<bool>,
}

impl CampaignDetail {
    pub fn primary_image(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }

    /// Funding progress in percent, capped at 100. Zero when the goal is zero.
    pub fn progress_percent(&self) -> Decimal {
        if self.goal_amount.is_zero() {
            return Decimal::ZERO;
        }
        (self.raised_amount / self.goal_amount * Decimal::ONE_HUNDRED).min(Decimal::ONE_HUNDRED)
    }

    /// How many of `total` chain links are filled at the current progress.
    pub fn filled_links(&self, total: u32) -> u32 {
        let filled = (self.progress_percent() / Decimal::ONE_HUNDRED * Decimal::from(total)).floor();
        filled.to_u32().unwrap_or(0)
    }
}

pub fn split_image_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Addresses excluded from presentation regardless of on-chain validity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Denylist(HashSet<Address>);

impl Denylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains(address)
    }

    pub fn insert(&mut self, address: Address) -> bool {
        self.0.insert(address)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drops denied campaigns, keeping the order of the rest.
    pub fn apply(&self, details: Vec<CampaignDetail>) -> Vec<CampaignDetail> {
        if self.0.is_empty() {
            return details;
        }
        details
            .into_iter()
            .filter(|d| {
                let denied = self.contains(&d.contract_address);
                if denied {
                    tracing::debug!(address = %d.contract_address, "campaign hidden by denylist");
                }
                !denied
            })
            .collect()
    }
}

impl FromIterator<Address> for Denylist {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Splits campaigns into those paying out to `wallet` and all others,
/// each keeping input order.
pub fn partition_by_charity(
    details: Vec<CampaignDetail>,
    wallet: &Address,
) -> (Vec<CampaignDetail>, Vec<CampaignDetail>) {
    details
        .into_iter()
        .partition(|d| d.charity_wallet == *wallet)
}
