pub mod cache;
pub mod feed;
pub mod fetcher;
pub mod live;
pub mod locator;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::chain::ChainReader;
use crate::donation::DonationEvent;
use crate::error::Error;
use crate::history::cache::{DonationCache, Lookup};
use crate::history::feed::{FeedHandle, FeedStatus};
use crate::history::live::{LiveEventMerger, LiveExit};
use crate::types::Address;

/// Entry point for showing one contract's donation history.
///
/// Opening a feed starts the live merger, then serves the cache (blocking on
/// a full fetch when there is nothing cached) and applies the background
/// revalidation result when it lands.
pub struct DonationHistory<R> {
    cache: DonationCache<R>,
}

impl<R: ChainReader + 'static> DonationHistory<R> {
    pub fn new(cache: DonationCache<R>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &DonationCache<R> {
        &self.cache
    }

    pub async fn open(&self, address: &Address) -> Result<DonationFeed, Error> {
        let handle = FeedHandle::new(address.clone());
        let epoch = handle.epoch();

        let live = LiveEventMerger::new(
            handle.clone(),
            epoch,
            self.cache.event().clone(),
            self.cache.decimals(),
        )
        .spawn(Arc::clone(self.cache.reader()));

        let refresh = match self.cache.load(address).await {
            Ok(Lookup::Fresh(donations)) => {
                handle.apply_snapshot(epoch, donations);
                None
            }
            Ok(Lookup::Stale { donations, refresh }) => {
                handle.apply_snapshot(epoch, donations);
                let target = handle.clone();
                Some(tokio::spawn(async move {
                    match refresh.await {
                        Ok(Ok(donations)) => {
                            if !target.apply_snapshot(epoch, donations) {
                                tracing::debug!(address = %target.address(), "feed closed before refresh landed");
                            }
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(address = %target.address(), error = %e, "background refresh failed; keeping cached donations");
                        }
                        Err(e) => {
                            tracing::warn!(address = %target.address(), error = %e, "background refresh task aborted");
                        }
                    }
                }))
            }
            Err(e) => {
                live.abort();
                return Err(e);
            }
        };
        handle.finish_loading(epoch);

        Ok(DonationFeed {
            handle,
            live: Some(live),
            refresh,
        })
    }
}

/// An open view of one contract's donations.
///
/// Dropping or closing the feed invalidates it: in-flight refreshes and the
/// live merger stop writing to it.
pub struct DonationFeed {
    handle: FeedHandle,
    live: Option<JoinHandle<LiveExit>>,
    refresh: Option<JoinHandle<()>>,
}

impl DonationFeed {
    pub fn address(&self) -> &Address {
        self.handle.address()
    }

    pub fn status(&self) -> FeedStatus {
        self.handle.status()
    }

    /// Donations currently shown, newest first.
    pub fn donations(&self) -> Vec<DonationEvent> {
        self.handle.snapshot()
    }

    pub fn handle(&self) -> &FeedHandle {
        &self.handle
    }

    /// Waits for the background revalidation, if one was started, to be
    /// applied.
    pub async fn settled(&mut self) {
        if let Some(refresh) = self.refresh.take()
            && let Err(e) = refresh.await
        {
            tracing::warn!(address = %self.handle.address(), error = %e, "refresh apply task failed");
        }
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.handle.invalidate();
        if let Some(live) = self.live.take() {
            live.abort();
        }
    }
}

impl Drop for DonationFeed {
    fn drop(&mut self) {
        self.shutdown();
    }
}
