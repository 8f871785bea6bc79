use std::num::NonZeroU64;
use std::time::Duration;

use crate::chain::{ChainReader, EventDescriptor};
use crate::config::{DEFAULT_CHUNK_DELAY_MS, DEFAULT_CHUNK_SIZE, IndexerConfig};
use crate::error::Error;
pub use crate::types::plan_chunks;
use crate::types::{Address, BlockRange, LogFilter, RawLog};

#[derive(Debug, Default)]
pub struct FetchReport {
    /// Retrieved logs in ascending `(block_number, log_index)` order.
    pub logs: Vec<RawLog>,
    /// Ranges whose query failed and were skipped.
    pub failed_chunks: Vec<BlockRange>,
    pub chunks_queried: usize,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
    }
}

/// Serial, throttled historical log retrieval.
#[derive(Debug, Clone)]
pub struct ChunkedLogFetcher {
    chunk_size: NonZeroU64,
    delay: Duration,
}

impl Default for ChunkedLogFetcher {
    fn default() -> Self {
        Self {
            chunk_size: NonZeroU64::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroU64::MIN),
            delay: Duration::from_millis(DEFAULT_CHUNK_DELAY_MS),
        }
    }
}

impl ChunkedLogFetcher {
    pub fn new(chunk_size: NonZeroU64, delay: Duration) -> Self {
        Self { chunk_size, delay }
    }

    pub fn from_config(config: &IndexerConfig) -> Self {
        Self::new(config.chunk_size(), config.chunk_delay())
    }

    pub fn chunk_size(&self) -> NonZeroU64 {
        self.chunk_size
    }

    /// Queries `[from, to]` one chunk at a time, sleeping `delay` between
    /// queries. A failing chunk is logged and skipped, so the report may be
    /// missing that chunk's logs; this never fails as a whole.
    pub async fn fetch<R: ChainReader>(
        &self,
        reader: &R,
        address: &Address,
        event: &EventDescriptor,
        from: u64,
        to: u64,
    ) -> FetchReport {
        let chunks = plan_chunks(from, to, self.chunk_size);
        tracing::info!(
            %address,
            from,
            to,
            chunks = chunks.len(),
            "fetching historical logs"
        );

        let mut report = FetchReport::default();
        for (i, range) in chunks.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let filter = LogFilter {
                address: address.clone(),
                topic: event.topic().to_string(),
                range: *range,
            };
            report.chunks_queried += 1;
            match reader.logs(&filter).await {
                Ok(logs) => {
                    tracing::debug!(%address, %range, count = logs.len(), "fetched chunk");
                    report.logs.extend(logs);
                }
                Err(e) => {
                    let err = Error::ChunkFetch {
                        range: *range,
                        reason: e.to_string(),
                    };
                    tracing::warn!(%address, error = %err, "skipping failed chunk");
                    report.failed_chunks.push(*range);
                }
            }
        }

        report
            .logs
            .sort_by(|a, b| (a.block_number, a.log_index).cmp(&(b.block_number, b.log_index)));
        report
    }
}
