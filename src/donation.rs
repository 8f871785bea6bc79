use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::abi;
use crate::error::Error;
use crate::types::{Address, RawLog};
use crate::units::format_units;

/// A decoded `Donated` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationEvent {
    pub tx_hash: String,
    pub log_index: u32,
    pub block_number: u64,
    pub donor: Address,
    pub amount: Decimal,
    /// Unix seconds, as recorded by the contract.
    pub timestamp: u64,
}

/// Identity of a donation: the emitting transaction and the log's position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DonationKey {
    pub tx_hash: String,
    pub log_index: u32,
}

impl DonationEvent {
    pub fn key(&self) -> DonationKey {
        DonationKey {
            tx_hash: self.tx_hash.to_ascii_lowercase(),
            log_index: self.log_index,
        }
    }

    /// Newest-first ordering on `(block_number, log_index)`.
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        other
            .block_number
            .cmp(&self.block_number)
            .then(other.log_index.cmp(&self.log_index))
    }
}

pub fn sort_newest_first(donations: &mut [DonationEvent]) {
    donations.sort_by(DonationEvent::cmp_newest_first);
}

/// Decodes `Donated(address indexed donor, uint256 amount, uint256 timestamp)`.
///
/// Logs carrying only the signature topic are read with the donor as the
/// first data word.
pub fn decode_donation(log: &RawLog, decimals: u32) -> Result<DonationEvent, Error> {
    let context = format!("donation log {}#{}", log.transaction_hash, log.log_index);
    let words = abi::decode_words(&log.data).map_err(|e| Error::decode(&context, e.to_string()))?;

    let (donor, amount_word, timestamp_word) = match (log.topics.get(1), words.as_slice()) {
        (Some(donor_topic), [amount, timestamp, ..]) => {
            let donor_word = abi::decode_topic(donor_topic)?;
            (abi::word_to_address(&donor_word, "donor")?, amount, timestamp)
        }
        (None, [donor, amount, timestamp, ..]) => {
            (abi::word_to_address(donor, "donor")?, amount, timestamp)
        }
        _ => {
            return Err(Error::decode(
                context,
                format!(
                    "unexpected layout: {} topics, {} data words",
                    log.topics.len(),
                    words.len()
                ),
            ));
        }
    };

    let raw_amount = abi::word_to_u128(amount_word, "amount")?;
    let amount = format_units(raw_amount, decimals).map_err(|e| Error::decode(&context, e.to_string()))?;

    Ok(DonationEvent {
        tx_hash: log.transaction_hash.clone(),
        log_index: log.log_index,
        block_number: log.block_number,
        donor,
        amount,
        timestamp: abi::word_to_u64(timestamp_word, "timestamp")?,
    })
}

/// Decodes every log, dropping (and logging) the ones that do not decode,
/// and returns the result newest first.
pub fn decode_donations(logs: &[RawLog], decimals: u32) -> Vec<DonationEvent> {
    let mut donations: Vec<DonationEvent> = logs
        .iter()
        .filter_map(|log| match decode_donation(log, decimals) {
            Ok(donation) => Some(donation),
            Err(e) => {
                tracing::warn!(
                    tx = %log.transaction_hash,
                    log_index = log.log_index,
                    error = %e,
                    "skipping undecodable donation log"
                );
                None
            }
        })
        .collect();
    sort_newest_first(&mut donations);
    donations
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::chain::EventDescriptor;
    use crate::units::DONATION_TOKEN_DECIMALS;

    const DONOR: &str = "0xab5801a7d398351b8be11c439e05c5b3259aec9b";

    fn donor_topic() -> String {
        format!("0x000000000000000000000000{}", &DONOR[2..])
    }

    fn make_log(block_number: u64, log_index: u32, amount: u128, timestamp: u64) -> RawLog {
        RawLog {
            transaction_hash: format!("0x{block_number:064x}"),
            block_number,
            log_index,
            topics: vec![EventDescriptor::donated().topic().to_string(), donor_topic()],
            data: format!("0x{amount:064x}{timestamp:064x}"),
        }
    }

    #[test]
    fn decodes_indexed_donor_layout() {
        let log = make_log(120, 3, 5_000_000, 1_720_000_000);
        let donation = decode_donation(&log, DONATION_TOKEN_DECIMALS).unwrap();
        assert_eq!(donation.donor.as_str(), DONOR);
        assert_eq!(donation.amount, Decimal::from(5));
        assert_eq!(donation.timestamp, 1_720_000_000);
        assert_eq!(donation.block_number, 120);
        assert_eq!(donation.log_index, 3);
    }

    #[test]
    fn decodes_unindexed_donor_layout() {
        let log = RawLog {
            topics: vec![EventDescriptor::donated().topic().to_string()],
            data: format!(
                "0x{}{:064x}{:064x}",
                &donor_topic()[2..],
                2_500_000_u128,
                1_720_000_100_u64
            ),
            ..make_log(7, 0, 0, 0)
        };
        let donation = decode_donation(&log, DONATION_TOKEN_DECIMALS).unwrap();
        assert_eq!(donation.donor.as_str(), DONOR);
        assert_eq!(donation.amount.to_string(), "2.5");
    }

    #[test]
    fn short_data_is_a_decode_error() {
        let log = RawLog {
            data: format!("0x{:064x}", 1_u8),
            ..make_log(1, 0, 0, 0)
        };
        assert!(matches!(
            decode_donation(&log, DONATION_TOKEN_DECIMALS),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn sort_is_by_block_then_log_index_descending() {
        let mut donations: Vec<DonationEvent> = [(10, 0), (12, 1), (12, 4), (11, 0)]
            .into_iter()
            .map(|(b, i)| decode_donation(&make_log(b, i, 1, 1), 6).unwrap())
            .collect();
        sort_newest_first(&mut donations);
        let order: Vec<(u64, u32)> = donations
            .iter()
            .map(|d| (d.block_number, d.log_index))
            .collect();
        assert_eq!(order, vec![(12, 4), (12, 1), (11, 0), (10, 0)]);
    }

    #[test]
    fn decode_donations_drops_bad_logs_and_orders_result() {
        let bad = RawLog {
            data: "0xdead".to_string(),
            ..make_log(15, 0, 0, 0)
        };
        let logs = vec![make_log(10, 0, 1_000_000, 1), bad, make_log(20, 0, 2_000_000, 2)];
        let donations = decode_donations(&logs, DONATION_TOKEN_DECIMALS);
        assert_eq!(donations.len(), 2);
        assert_eq!(donations[0].block_number, 20);
        assert_eq!(donations[1].block_number, 10);
    }

    #[test]
    fn key_ignores_hash_case() {
        let a = decode_donation(&make_log(1, 2, 1, 1), 6).unwrap();
        let b = DonationEvent {
            tx_hash: a.tx_hash.to_uppercase().replacen("0X", "0x", 1),
            ..a.clone()
        };
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn serde_round_trip_keeps_amount_exact() {
        let donation = decode_donation(&make_log(1, 0, 1_234_567, 9), 6).unwrap();
        let json = serde_json::to_string(&donation).unwrap();
        let back: DonationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, donation);
        assert_eq!(back.amount.to_string(), "1.234567");
    }
}
