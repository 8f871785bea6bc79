#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use donochain_indexer::{
    Address, CallOutcome, ChainReader, ContractCall, Error, LogFilter, LogStream, RawLog,
};
use futures::StreamExt;
use futures::channel::mpsc;
use parking_lot::Mutex;
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub fn load<T: DeserializeOwned>(filename: &str) -> T {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let path = format!("{manifest_dir}/tests/fixtures/{filename}");
    let data =
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"));
    serde_json::from_str(&data).unwrap_or_else(|e| panic!("failed to parse {path}: {e}"))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationFixture {
    pub contract: Address,
    pub deployed_at: u64,
    pub latest: u64,
    pub logs: Vec<RawLog>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignEntry {
    pub address: Address,
    pub outcome: CallOutcome,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignFixture {
    pub factory: Address,
    pub campaigns: Vec<CampaignEntry>,
}

impl CampaignFixture {
    pub fn addresses(&self) -> Vec<Address> {
        self.campaigns.iter().map(|c| c.address.clone()).collect()
    }
}

type Subscriber = (Address, mpsc::UnboundedSender<Result<RawLog, Error>>);

/// Node backed by fixture data, with a movable chain head.
#[derive(Default)]
pub struct FixtureChain {
    latest: AtomicU64,
    deployments: HashMap<Address, u64>,
    logs: Mutex<Vec<(Address, RawLog)>>,
    outcomes: HashMap<Address, CallOutcome>,
    factories: HashMap<Address, Vec<Address>>,
    subscribers: Mutex<Vec<Subscriber>>,
    log_queries: AtomicUsize,
}

impl FixtureChain {
    pub fn from_donations(fixture: &DonationFixture) -> Self {
        let chain = Self {
            latest: AtomicU64::new(fixture.latest),
            ..Self::default()
        }
        .with_deployment(fixture.contract.clone(), fixture.deployed_at);
        chain.logs.lock().extend(
            fixture
                .logs
                .iter()
                .map(|log| (fixture.contract.clone(), log.clone())),
        );
        chain
    }

    pub fn from_campaigns(fixture: &CampaignFixture) -> Self {
        let mut chain = Self::default();
        chain
            .factories
            .insert(fixture.factory.clone(), fixture.addresses());
        for entry in &fixture.campaigns {
            chain
                .outcomes
                .insert(entry.address.clone(), entry.outcome.clone());
        }
        chain
    }

    pub fn with_deployment(mut self, address: Address, height: u64) -> Self {
        self.deployments.insert(address, height);
        self
    }

    /// Mines `log` for `address`: advances the head to its block and pushes it
    /// to open subscriptions.
    pub fn emit(&self, address: &Address, log: RawLog) {
        self.latest.fetch_max(log.block_number, Ordering::SeqCst);
        self.subscribers.lock().retain(|(subscribed, tx)| {
            subscribed != address || tx.unbounded_send(Ok(log.clone())).is_ok()
        });
        self.logs.lock().push((address.clone(), log));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    pub fn log_queries(&self) -> usize {
        self.log_queries.load(Ordering::SeqCst)
    }
}

impl ChainReader for FixtureChain {
    async fn code_at(&self, address: &Address, height: u64) -> Result<Vec<u8>, Error> {
        Ok(match self.deployments.get(address) {
            Some(deployed) if *deployed <= height => vec![0x60, 0x80, 0x60, 0x40],
            _ => Vec::new(),
        })
    }

    async fn current_height(&self) -> Result<u64, Error> {
        Ok(self.latest.load(Ordering::SeqCst))
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, Error> {
        self.log_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .logs
            .lock()
            .iter()
            .filter(|(address, log)| {
                *address == filter.address
                    && filter.range.contains(log.block_number)
                    && log
                        .topics
                        .first()
                        .is_some_and(|t| t.eq_ignore_ascii_case(&filter.topic))
            })
            .map(|(_, log)| log.clone())
            .collect())
    }

    async fn subscribe(&self, address: &Address, _topic: &str) -> Result<LogStream, Error> {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.lock().push((address.clone(), tx));
        Ok(rx.boxed())
    }

    async fn batch_read(&self, calls: &[ContractCall]) -> Result<Vec<CallOutcome>, Error> {
        Ok(calls
            .iter()
            .map(|call| {
                self.outcomes
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

/// Polls `done` until it holds, failing the test after a few seconds.
pub async fn eventually(what: &str, mut done: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    if waited.is_err() {
        panic!("timed out waiting for {what}");
    }
}
