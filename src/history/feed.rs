use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::donation::{DonationEvent, DonationKey, sort_newest_first};
use crate::types::Address;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum FeedStatus {
    /// The first fetch is still outstanding.
    Loading,
    /// Loaded, and there are no donations to show.
    Empty,
    Ready,
}

/// Generation captured when work is scheduled against a feed. Writes carrying
/// an older epoch than the feed's current generation are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u64);

#[derive(Default)]
struct Displayed {
    /// Newest first.
    donations: Vec<DonationEvent>,
    /// Live arrivals not yet confirmed by a historical fetch.
    pending_live: Vec<DonationEvent>,
}

struct FeedState {
    address: Address,
    generation: AtomicU64,
    loading: AtomicBool,
    displayed: Mutex<Displayed>,
}

/// The donation sequence shown for one contract, shared between the
/// historical refresh path and the live merger.
#[derive(Clone)]
pub struct FeedHandle {
    state: Arc<FeedState>,
}

impl FeedHandle {
    pub fn new(address: Address) -> Self {
        Self {
            state: Arc::new(FeedState {
                address,
                generation: AtomicU64::new(0),
                loading: AtomicBool::new(true),
                displayed: Mutex::new(Displayed::default()),
            }),
        }
    }

    pub fn address(&self) -> &Address {
        &self.state.address
    }

    pub fn epoch(&self) -> Epoch {
        Epoch(self.state.generation.load(Ordering::Acquire))
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.epoch() == epoch
    }

    /// Invalidates every epoch handed out so far.
    pub fn invalidate(&self) {
        self.state.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn status(&self) -> FeedStatus {
        if self.state.loading.load(Ordering::Acquire) {
            FeedStatus::Loading
        } else if self.state.displayed.lock().donations.is_empty() {
            FeedStatus::Empty
        } else {
            FeedStatus::Ready
        }
    }

    pub fn snapshot(&self) -> Vec<DonationEvent> {
        self.state.displayed.lock().donations.clone()
    }

    pub fn len(&self) -> usize {
        self.state.displayed.lock().donations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn finish_loading(&self, epoch: Epoch) {
        if self.is_current(epoch) {
            self.state.loading.store(false, Ordering::Release);
        }
    }

    /// Installs a historical snapshot. Live arrivals the snapshot does not
    /// contain yet are carried over; everything else is replaced.
    /// Returns `false` if `epoch` is stale and nothing was written.
    pub fn apply_snapshot(&self, epoch: Epoch, snapshot: Vec<DonationEvent>) -> bool {
        let mut displayed = self.state.displayed.lock();
        if !self.is_current(epoch) {
            return false;
        }

        let indexed: HashSet<DonationKey> = snapshot.iter().map(DonationEvent::key).collect();
        displayed.pending_live.retain(|d| !indexed.contains(&d.key()));

        let mut donations = snapshot;
        donations.extend(displayed.pending_live.iter().cloned());
        sort_newest_first(&mut donations);
        displayed.donations = donations;
        true
    }

    /// Prepends a live arrival unless an event with the same identity is
    /// already shown. Returns `false` if `epoch` is stale.
    pub fn prepend_live(&self, epoch: Epoch, donation: DonationEvent) -> bool {
        let mut displayed = self.state.displayed.lock();
        if !self.is_current(epoch) {
            return false;
        }

        let key = donation.key();
        if displayed.donations.iter().any(|d| d.key() == key) {
            tracing::debug!(address = %self.state.address, tx = %donation.tx_hash, "live donation already shown");
            return true;
        }
        displayed.pending_live.push(donation.clone());
        displayed.donations.insert(0, donation);
        true
    }
}
