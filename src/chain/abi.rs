//! Minimal ABI word handling for the fixed-width fields this crate reads.

use crate::error::Error;
use crate::types::Address;

pub const WORD_LEN: usize = 32;

pub type Word = [u8; WORD_LEN];

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Splits ABI-encoded hex data into 32-byte words.
pub fn decode_words(data: &str) -> Result<Vec<Word>, Error> {
    let bytes = hex::decode(strip_hex_prefix(data))
        .map_err(|e| Error::decode("log data", format!("invalid hex: {e}")))?;
    if bytes.len() % WORD_LEN != 0 {
        return Err(Error::decode(
            "log data",
            format!("length {} is not a multiple of {WORD_LEN}", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(WORD_LEN)
        .map(|chunk| {
            let mut word = [0_u8; WORD_LEN];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

/// Parses a single 32-byte hex topic.
pub fn decode_topic(topic: &str) -> Result<Word, Error> {
    let words = decode_words(topic)?;
    match words.as_slice() {
        [word] => Ok(*word),
        _ => Err(Error::decode(
            "log topic",
            format!("expected one word, got {}", words.len()),
        )),
    }
}

/// Reads a `uint256` word that must fit in `u128`.
pub fn word_to_u128(word: &Word, field: &str) -> Result<u128, Error> {
    let (high, low) = word.split_at(WORD_LEN - 16);
    if high.iter().any(|b| *b != 0) {
        return Err(Error::decode(field, "value exceeds 128 bits"));
    }
    let mut buf = [0_u8; 16];
    buf.copy_from_slice(low);
    Ok(u128::from_be_bytes(buf))
}

pub fn word_to_u64(word: &Word, field: &str) -> Result<u64, Error> {
    let value = word_to_u128(word, field)?;
    u64::try_from(value).map_err(|_| Error::decode(field, "value exceeds 64 bits"))
}

/// Reads a left-padded `address` word.
pub fn word_to_address(word: &Word, field: &str) -> Result<Address, Error> {
    let (padding, body) = word.split_at(WORD_LEN - Address::LEN);
    if padding.iter().any(|b| *b != 0) {
        return Err(Error::decode(field, "address word has non-zero padding"));
    }
    Address::from_bytes(body)
}

/// Parses an unsigned integer returned by a decoded contract read.
///
/// Nodes and client libraries disagree on how big integers travel through
/// JSON, so numbers, decimal strings and `0x` hex strings are all accepted.
pub fn json_to_u128(value: &serde_json::Value, field: &str) -> Result<u128, Error> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| Error::decode(field, format!("{n} is not an unsigned integer"))),
        serde_json::Value::String(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(digits) => u128::from_str_radix(digits, 16),
                None => s.parse::<u128>(),
            };
            parsed.map_err(|e| Error::decode(field, format!("{s:?} is not a u128: {e}")))
        }
        other => Err(Error::decode(
            field,
            format!("expected unsigned integer, got {other}"),
        )),
    }
}
