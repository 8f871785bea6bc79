use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::chain::{ChainReader, EventDescriptor};
use crate::config::IndexerConfig;
use crate::donation::{DonationEvent, decode_donations};
use crate::error::Error;
use crate::history::fetcher::ChunkedLogFetcher;
use crate::history::locator::locate_deployment_block;
use crate::types::Address;
use crate::units::DONATION_TOKEN_DECIMALS;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

pub fn cache_key(address: &Address) -> String {
    format!("donations_{address}")
}

/// Stored form of one contract's donation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub contract_address: Address,
    /// Newest first.
    pub donations: Vec<DonationEvent>,
    /// Unix milliseconds.
    pub stored_at: u64,
}

/// Session-scoped string store, the backing for [`DonationCache`].
///
/// Created when a browsing session starts and torn down with [`end`]; nothing
/// in it outlives the session.
///
/// [`end`]: SessionStore::end
#[derive(Default)]
pub struct SessionStore {
    entries: RwLock<HashMap<String, String>>,
    generation: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Writes `value` only if the store has not been ended since `generation`
    /// was read. The check and the insert happen under one write lock.
    pub fn set_if_generation(&self, generation: u64, key: impl Into<String>, value: impl Into<String>) -> bool {
        let mut entries = self.entries.write();
        if self.generation() != generation {
            return false;
        }
        entries.insert(key.into(), value.into());
        true
    }

    /// Ends the session: drops every entry and fences off in-flight writers.
    pub fn end(&self) {
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
    }
}

/// Broadcast after a refresh replaced the stored list for `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUpdate {
    pub address: Address,
    pub donations: Vec<DonationEvent>,
}

/// Result of [`DonationCache::load`].
pub enum Lookup {
    /// No usable entry existed; this list was just fetched and stored.
    Fresh(Vec<DonationEvent>),
    /// Served from the store. `refresh` resolves once the background pass
    /// has replaced the entry.
    Stale {
        donations: Vec<DonationEvent>,
        refresh: JoinHandle<Result<Vec<DonationEvent>, Error>>,
    },
}

impl Lookup {
    pub fn donations(&self) -> &[DonationEvent] {
        match self {
            Self::Fresh(donations) | Self::Stale { donations, .. } => donations,
        }
    }
}

struct CacheInner<R> {
    reader: Arc<R>,
    store: Arc<SessionStore>,
    fetcher: ChunkedLogFetcher,
    event: EventDescriptor,
    decimals: u32,
    updates: broadcast::Sender<CacheUpdate>,
}

/// Stale-while-revalidate cache of decoded donation lists per contract.
pub struct DonationCache<R> {
    inner: Arc<CacheInner<R>>,
}

impl<R> Clone for DonationCache<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: ChainReader + 'static> DonationCache<R> {
    pub fn new(reader: Arc<R>, store: Arc<SessionStore>, fetcher: ChunkedLogFetcher) -> Self {
        Self::with_event(reader, store, fetcher, EventDescriptor::donated(), DONATION_TOKEN_DECIMALS)
    }

    pub fn with_event(
        reader: Arc<R>,
        store: Arc<SessionStore>,
        fetcher: ChunkedLogFetcher,
        event: EventDescriptor,
        decimals: u32,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(CacheInner {
                reader,
                store,
                fetcher,
                event,
                decimals,
                updates,
            }),
        }
    }

    pub fn from_config(reader: Arc<R>, store: Arc<SessionStore>, config: &IndexerConfig) -> Self {
        Self::with_event(
            reader,
            store,
            ChunkedLogFetcher::from_config(config),
            config.donation_event(),
            config.donation_decimals,
        )
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.inner.reader
    }

    pub fn event(&self) -> &EventDescriptor {
        &self.inner.event
    }

    pub fn decimals(&self) -> u32 {
        self.inner.decimals
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<CacheUpdate> {
        self.inner.updates.subscribe()
    }

    /// Reads the stored entry for `address`. Unreadable entries are removed
    /// and reported as a miss.
    pub fn cached(&self, address: &Address) -> Option<CacheEntry> {
        let key = cache_key(address);
        let raw = self.inner.store.get(&key)?;
        match parse_entry(&key, &raw, address) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(%address, error = %e, "discarding cache entry");
                self.inner.store.remove(&key);
                None
            }
        }
    }

    /// Serves the stored list immediately and revalidates in the background,
    /// or fetches synchronously on a miss.
    pub async fn load(&self, address: &Address) -> Result<Lookup, Error> {
        if let Some(entry) = self.cached(address) {
            tracing::debug!(%address, count = entry.donations.len(), "serving cached donations");
            let cache = self.clone();
            let target = address.clone();
            let refresh = tokio::spawn(async move { cache.refresh(&target).await });
            return Ok(Lookup::Stale {
                donations: entry.donations,
                refresh,
            });
        }

        self.refresh(address).await.map(Lookup::Fresh)
    }

    /// Runs a full locate + fetch pass and replaces the stored entry.
    pub async fn refresh(&self, address: &Address) -> Result<Vec<DonationEvent>, Error> {
        let inner = &self.inner;
        let generation = inner.store.generation();

        let deployment_block = locate_deployment_block(inner.reader.as_ref(), address).await?;
        let latest = inner.reader.current_height().await?;
        let report = inner
            .fetcher
            .fetch(inner.reader.as_ref(), address, &inner.event, deployment_block, latest)
            .await;
        if !report.is_complete() {
            tracing::warn!(
                %address,
                failed = report.failed_chunks.len(),
                "donation history may be incomplete"
            );
        }

        let logs: Vec<_> = report
            .logs
            .into_iter()
            .filter(|log| inner.event.matches(log))
            .collect();
        let donations = decode_donations(&logs, inner.decimals);

        let entry = CacheEntry {
            contract_address: address.clone(),
            donations,
            stored_at: now_millis(),
        };
        let serialized = serde_json::to_string(&entry)?;
        if inner
            .store
            .set_if_generation(generation, cache_key(address), serialized)
        {
            tracing::info!(%address, count = entry.donations.len(), "stored donations");
            // No receivers is fine.
            let _ = inner.updates.send(CacheUpdate {
                address: address.clone(),
                donations: entry.donations.clone(),
            });
        } else {
            tracing::debug!(%address, "session ended during refresh; result not stored");
        }

        Ok(entry.donations)
    }
}

fn parse_entry(key: &str, raw: &str, address: &Address) -> Result<CacheEntry, Error> {
    let entry: CacheEntry = serde_json::from_str(raw).map_err(|e| Error::CacheParse {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    if entry.contract_address != *address {
        return Err(Error::CacheParse {
            key: key.to_string(),
            reason: format!("entry belongs to {}", entry.contract_address),
        });
    }
    Ok(entry)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::panic,
    reason = "test code uses unwrap/panic for concise assertions"
)]
mod tests {
    use std::num::NonZeroU64;
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use super::*;
    use crate::test_support::{MockChain, donation_log};

    fn contract() -> Address {
        "0x00000000000000000000000000000000000000c1".parse().unwrap()
    }

    fn other() -> Address {
        "0x00000000000000000000000000000000000000c2".parse().unwrap()
    }

    fn cache_over(chain: MockChain, store: Arc<SessionStore>) -> DonationCache<MockChain> {
        let fetcher = ChunkedLogFetcher::new(NonZeroU64::new(500).unwrap(), Duration::ZERO);
        DonationCache::new(Arc::new(chain), store, fetcher)
    }

    #[test]
    fn store_round_trips_entries_in_order() {
        let store = SessionStore::new();
        let donations = decode_donations(
            &[
                donation_log(3, 0, 3_000_000),
                donation_log(1, 0, 1_000_000),
                donation_log(2, 0, 2_000_000),
            ],
            6,
        );
        let entry = CacheEntry {
            contract_address: contract(),
            donations,
            stored_at: 1,
        };
        let key = cache_key(&contract());
        store.set(key.clone(), serde_json::to_string(&entry).unwrap());

        let back = parse_entry(&key, &store.get(&key).unwrap(), &contract()).unwrap();
        assert_eq!(back, entry);
        let blocks: Vec<u64> = back.donations.iter().map(|d| d.block_number).collect();
        assert_eq!(blocks, vec![3, 2, 1]);
    }

    #[test]
    fn ended_store_rejects_old_generation_writes() {
        let store = SessionStore::new();
        let generation = store.generation();
        store.set("a", "1");
        store.end();
        assert!(store.is_empty());
        assert!(!store.set_if_generation(generation, "b", "2"));
        assert!(store.set_if_generation(store.generation(), "b", "2"));
        assert_eq!(store.get("b").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn miss_fetches_and_stores() {
        let chain = MockChain::new(1_000)
            .with_contract(contract(), 100)
            .with_logs_for(contract(), vec![donation_log(150, 0, 5_000_000)]);
        let store = Arc::new(SessionStore::new());
        let cache = cache_over(chain, Arc::clone(&store));

        let lookup = cache.load(&contract()).await.unwrap();
        assert!(matches!(lookup, Lookup::Fresh(_)));
        assert_eq!(lookup.donations().len(), 1);
        assert_eq!(lookup.donations()[0].amount.to_string(), "5");
        assert_eq!(cache.cached(&contract()).unwrap().donations.len(), 1);
    }

    #[tokio::test]
    async fn entries_hold_only_their_own_contract() {
        let chain = MockChain::new(1_000)
            .with_contract(contract(), 100)
            .with_contract(other(), 100)
            .with_logs_for(contract(), vec![donation_log(150, 0, 1)])
            .with_logs_for(other(), vec![donation_log(160, 0, 1), donation_log(170, 0, 1)]);
        let store = Arc::new(SessionStore::new());
        let cache = cache_over(chain, store);

        cache.load(&contract()).await.unwrap();
        cache.load(&other()).await.unwrap();
        assert_eq!(cache.cached(&contract()).unwrap().donations.len(), 1);
        assert_eq!(cache.cached(&other()).unwrap().donations.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let chain = MockChain::new(1_000).with_contract(contract(), 100);
        let store = Arc::new(SessionStore::new());
        store.set(cache_key(&contract()), "{not json");
        let cache = cache_over(chain, Arc::clone(&store));

        assert!(cache.cached(&contract()).is_none());
        assert!(store.get(&cache_key(&contract())).is_none());
        let lookup = cache.load(&contract()).await.unwrap();
        assert!(matches!(lookup, Lookup::Fresh(_)));
    }

    #[tokio::test]
    async fn entry_for_another_contract_is_a_miss() {
        let store = Arc::new(SessionStore::new());
        let foreign = CacheEntry {
            contract_address: other(),
            donations: Vec::new(),
            stored_at: 0,
        };
        store.set(cache_key(&contract()), serde_json::to_string(&foreign).unwrap());
        let cache = cache_over(MockChain::new(10), store);
        assert!(cache.cached(&contract()).is_none());
    }

    #[tokio::test]
    async fn not_found_surfaces_on_miss() {
        let cache = cache_over(MockChain::new(10), Arc::new(SessionStore::new()));
        assert!(matches!(
            cache.load(&contract()).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn stale_entry_is_served_then_replaced_wholesale() {
        let chain = MockChain::new(1_000)
            .with_contract(contract(), 100)
            .with_logs_for(
                contract(),
                vec![
                    donation_log(110, 0, 1_000_000),
                    donation_log(120, 0, 2_000_000),
                    donation_log(130, 0, 3_000_000),
                ],
            );
        let store = Arc::new(SessionStore::new());
        let cache = cache_over(chain, Arc::clone(&store));
        cache.load(&contract()).await.unwrap();

        cache
            .reader()
            .push_log(contract(), donation_log(140, 0, 4_000_000));
        let mut updates = cache.subscribe_updates();

        let Lookup::Stale { donations, refresh } = cache.load(&contract()).await.unwrap() else {
            panic!("expected a cache hit");
        };
        assert_eq!(donations.len(), 3);

        let refreshed = refresh.await.unwrap().unwrap();
        assert_eq!(refreshed.len(), 4);
        assert_eq!(updates.recv().await.unwrap().donations, refreshed);

        let stored = cache.cached(&contract()).unwrap().donations;
        assert_eq!(stored, refreshed);
        assert_eq!(stored[0].block_number, 140);
    }

    #[tokio::test]
    async fn refresh_abandoned_by_session_end_is_not_stored() {
        let gate = Arc::new(Semaphore::new(0));
        let chain = MockChain::new(1_000)
            .with_contract(contract(), 100)
            .with_logs_for(contract(), vec![donation_log(150, 0, 1)])
            .with_log_gate(Arc::clone(&gate));
        let store = Arc::new(SessionStore::new());
        let cache = cache_over(chain, Arc::clone(&store));
        let mut updates = cache.subscribe_updates();

        let task = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh(&contract()).await })
        };
        while cache.reader().queried_ranges().is_empty() {
            tokio::task::yield_now().await;
        }
        store.end();
        gate.add_permits(8);

        let donations = task.await.unwrap().unwrap();
        assert_eq!(donations.len(), 1);
        assert!(store.is_empty());
        assert!(updates.try_recv().is_err());
    }
}
