//! In-memory [`ChainReader`] for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use futures::channel::mpsc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::chain::{ChainReader, EventDescriptor, LogStream};
use crate::error::Error;
use crate::types::{Address, BlockRange, CallOutcome, ContractCall, LogFilter, RawLog};

pub(crate) const DONOR: &str = "0xab5801a7d398351b8be11c439e05c5b3259aec9b";
pub(crate) const CHARITY: &str = "0x9b5f0d4f3e7a1a2c3d4e5f60718293a4b5c6d7e8";

type LiveSender = mpsc::UnboundedSender<Result<RawLog, Error>>;

#[derive(Default)]
pub(crate) struct MockChain {
    latest: u64,
    /// Contract address to the first height with code.
    contracts: HashMap<Address, u64>,
    /// Served for every address.
    shared_logs: Vec<RawLog>,
    logs_by_address: Mutex<HashMap<Address, Vec<RawLog>>>,
    failing: Vec<BlockRange>,
    queried: Mutex<Vec<BlockRange>>,
    code_probes: AtomicUsize,
    batch_calls: AtomicUsize,
    log_gate: Option<Arc<Semaphore>>,
    refuse_subscriptions: bool,
    live: Mutex<HashMap<Address, Vec<LiveSender>>>,
    details: HashMap<Address, CallOutcome>,
    factories: HashMap<Address, Vec<Address>>,
}

impl MockChain {
    pub(crate) fn new(latest: u64) -> Self {
        Self {
            latest,
            ..Self::default()
        }
    }

    pub(crate) fn with_contract(mut self, address: Address, deployed: u64) -> Self {
        self.contracts.insert(address, deployed);
        self
    }

    pub(crate) fn with_logs(mut self, logs: Vec<RawLog>) -> Self {
        self.shared_logs.extend(logs);
        self
    }

    pub(crate) fn with_logs_for(self, address: Address, logs: Vec<RawLog>) -> Self {
        self.logs_by_address
            .lock()
            .entry(address)
            .or_default()
            .extend(logs);
        self
    }

    pub(crate) fn failing_range(mut self, range: BlockRange) -> Self {
        self.failing.push(range);
        self
    }

    /// Every log query waits for a permit after being recorded.
    pub(crate) fn with_log_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.log_gate = Some(gate);
        self
    }

    pub(crate) fn refusing_subscriptions(mut self) -> Self {
        self.refuse_subscriptions = true;
        self
    }

    pub(crate) fn with_detail(mut self, address: Address, outcome: CallOutcome) -> Self {
        self.details.insert(address, outcome);
        self
    }

    pub(crate) fn with_factory(mut self, factory: Address, deployed: Vec<Address>) -> Self {
        self.factories.insert(factory, deployed);
        self
    }

    /// Records a new log for `address` and pushes it to open subscriptions.
    pub(crate) fn push_log(&self, address: Address, log: RawLog) {
        if let Some(senders) = self.live.lock().get_mut(&address) {
            senders.retain(|tx| tx.unbounded_send(Ok(log.clone())).is_ok());
        }
        self.logs_by_address
            .lock()
            .entry(address)
            .or_default()
            .push(log);
    }

    pub(crate) fn queried_ranges(&self) -> Vec<BlockRange> {
        self.queried.lock().clone()
    }

    pub(crate) fn code_probes(&self) -> usize {
        self.code_probes.load(Ordering::SeqCst)
    }

    pub(crate) fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

impl ChainReader for MockChain {
    async fn code_at(&self, address: &Address, height: u64) -> Result<Vec<u8>, Error> {
        self.code_probes.fetch_add(1, Ordering::SeqCst);
        let deployed = self.contracts.get(address).is_some_and(|d| *d <= height);
        Ok(if deployed { vec![0x60, 0x80] } else { Vec::new() })
    }

    async fn current_height(&self) -> Result<u64, Error> {
        Ok(self.latest)
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, Error> {
        self.queried.lock().push(filter.range);
        if let Some(gate) = &self.log_gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| Error::Rpc(e.to_string()))?;
        }
        if self.failing.contains(&filter.range) {
            return Err(Error::Rpc(format!("query for {} timed out", filter.range)));
        }

        let own = self
            .logs_by_address
            .lock()
            .get(&filter.address)
            .cloned()
            .unwrap_or_default();
        Ok(self
            .shared_logs
            .iter()
            .cloned()
            .chain(own)
            .filter(|log| {
                filter.range.contains(log.block_number)
                    && log
                        .topics
                        .first()
                        .is_some_and(|t| t.eq_ignore_ascii_case(&filter.topic))
            })
            .collect())
    }

    async fn subscribe(&self, address: &Address, _topic: &str) -> Result<LogStream, Error> {
        if self.refuse_subscriptions {
            return Err(Error::Rpc("subscriptions not supported".into()));
        }
        let (tx, rx) = mpsc::unbounded();
        self.live.lock().entry(address.clone()).or_default().push(tx);
        Ok(rx.boxed())
    }

    async fn batch_read(&self, calls: &[ContractCall]) -> Result<Vec<CallOutcome>, Error> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(calls
            .iter()
            .map(|call| {
                self.details
                    .get(&call.address)
                    .cloned()
                    .unwrap_or_else(|| CallOutcome::Failure {
                        error: "execution reverted".into(),
                    })
            })
            .collect())
    }

    async fn list_deployed(&self, factory: &Address) -> Result<Vec<Address>, Error> {
        self.factories
            .get(factory)
            .cloned()
            .ok_or_else(|| Error::Rpc(format!("{factory} is not a campaign factory")))
    }
}

/// A `Donated` log from [`DONOR`] with a transaction hash unique to
/// `(block, log_index)`.
pub(crate) fn donation_log(block: u64, log_index: u32, raw_amount: u128) -> RawLog {
    RawLog {
        transaction_hash: format!("0x{block:056x}{log_index:08x}"),
        block_number: block,
        log_index,
        topics: vec![
            EventDescriptor::donated().topic().to_string(),
            format!("0x000000000000000000000000{}", &DONOR[2..]),
        ],
        data: format!("0x{raw_amount:064x}{:064x}", 1_700_000_000 + block),
    }
}

/// A current-layout detail record with whole-unit `goal` and `raised`.
pub(crate) fn detail_record(title: &str, goal: u128, raised: u128) -> serde_json::Value {
    let scale = 10_u128.pow(crate::units::CAMPAIGN_AMOUNT_DECIMALS);
    serde_json::json!([
        title,
        format!("About {title}"),
        format!("ipfs://{title}.png"),
        (goal * scale).to_string(),
        (raised * scale).to_string(),
        CHARITY,
        "creator",
        1_720_000_000_u64,
        false
    ])
}
