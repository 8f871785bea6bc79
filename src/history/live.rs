use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::chain::{ChainReader, EventDescriptor, LogStream};
use crate::donation::decode_donation;
use crate::error::Error;
use crate::history::feed::{Epoch, FeedHandle};

/// Why a live merger stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LiveExit {
    /// The feed was closed; further writes would be discarded.
    FeedClosed,
    /// The node ended the stream.
    StreamEnded,
    /// The stream failed or could not be opened. Not retried.
    StreamFailed,
}

/// Prepends pushed donation logs to a feed as they arrive.
pub struct LiveEventMerger {
    feed: FeedHandle,
    epoch: Epoch,
    event: EventDescriptor,
    decimals: u32,
}

impl LiveEventMerger {
    pub fn new(feed: FeedHandle, epoch: Epoch, event: EventDescriptor, decimals: u32) -> Self {
        Self {
            feed,
            epoch,
            event,
            decimals,
        }
    }

    /// Subscribes through `reader` and runs the merger on a spawned task.
    pub fn spawn<R: ChainReader + 'static>(self, reader: Arc<R>) -> JoinHandle<LiveExit> {
        tokio::spawn(async move {
            let address = self.feed.address().clone();
            match reader.subscribe(&address, self.event.topic()).await {
                Ok(stream) => self.run(stream).await,
                Err(e) => {
                    let err = Error::Subscription {
                        address,
                        reason: e.to_string(),
                    };
                    tracing::warn!(error = %err, "live donations unavailable");
                    LiveExit::StreamFailed
                }
            }
        })
    }

    pub async fn run(self, mut stream: LogStream) -> LiveExit {
        let address = self.feed.address().clone();
        while let Some(item) = stream.next().await {
            if !self.feed.is_current(self.epoch) {
                return LiveExit::FeedClosed;
            }

            let log = match item {
                Ok(log) => log,
                Err(e) => {
                    let err = Error::Subscription {
                        address: address.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!(error = %err, "live donation stream failed");
                    return LiveExit::StreamFailed;
                }
            };

            if !self.event.matches(&log) {
                continue;
            }
            match decode_donation(&log, self.decimals) {
                Ok(donation) => {
                    tracing::info!(%address, tx = %donation.tx_hash, amount = %donation.amount, "new donation");
                    if !self.feed.prepend_live(self.epoch, donation) {
                        return LiveExit::FeedClosed;
                    }
                }
                Err(e) => {
                    tracing::warn!(%address, error = %e, "skipping undecodable live log");
                }
            }
        }

        tracing::debug!(%address, "live donation stream ended");
        LiveExit::StreamEnded
    }
}
