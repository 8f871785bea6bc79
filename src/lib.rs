#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::dbg_macro,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::panic,
    )
)]

pub mod campaigns;
pub mod chain;
pub mod config;
pub mod donation;
pub mod error;
pub mod types;
pub mod units;

#[cfg(feature = "native")]
pub mod history;

#[cfg(feature = "wasm")]
pub mod wasm;

#[cfg(test)]
mod test_support;

pub use campaigns::aggregator::{BatchDetailAggregator, CampaignDirectory};
pub use campaigns::record::decode_detail_record;
pub use campaigns::{CampaignDetail, Denylist, PROGRESS_CHAIN_LINKS, partition_by_charity};
pub use chain::{ChainReader, EventDescriptor, LogStream, event_topic};
pub use config::IndexerConfig;
pub use donation::{DonationEvent, DonationKey, decode_donation, decode_donations};
pub use error::Error;
#[cfg(feature = "native")]
pub use history::cache::{CacheEntry, CacheUpdate, DonationCache, Lookup, SessionStore};
#[cfg(feature = "native")]
pub use history::feed::{FeedHandle, FeedStatus};
#[cfg(feature = "native")]
pub use history::fetcher::{ChunkedLogFetcher, FetchReport};
#[cfg(feature = "native")]
pub use history::live::{LiveEventMerger, LiveExit};
#[cfg(feature = "native")]
pub use history::locator::locate_deployment_block;
#[cfg(feature = "native")]
pub use history::{DonationFeed, DonationHistory};
pub use types::{Address, BlockRange, CallOutcome, ContractCall, LogFilter, RawLog, plan_chunks};
pub use units::format_units;
