use std::num::NonZeroU64;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::campaigns::record::decode_detail_record;
use crate::campaigns::{CampaignDetail, PROGRESS_CHAIN_LINKS};
use crate::chain::event_topic;
use crate::donation::decode_donation;
use crate::types::{Address, RawLog, plan_chunks};
use crate::units::{CAMPAIGN_AMOUNT_DECIMALS, DONATION_TOKEN_DECIMALS};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = JSON)]
    fn parse(s: &str) -> JsValue;
}

fn to_js(value: &serde_json::Value) -> JsValue {
    match serde_json::to_string(value) {
        Ok(json_str) => parse(&json_str),
        Err(_) => JsValue::NULL,
    }
}

fn to_js_typed<T: Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or_else(|e| error_result(&e.to_string()))
}

fn error_result(msg: &str) -> JsValue {
    let obj = serde_json::json!({"error": msg});
    to_js(&obj)
}

/// Topic hash for an event signature such as `Donated(address,uint256,uint256)`.
#[wasm_bindgen]
pub fn wasm_event_topic(signature: &str) -> String {
    event_topic(signature)
}

/// Inclusive `[from, to]` ranges the history fetch would query.
#[wasm_bindgen]
pub fn wasm_plan_chunks(from: f64, to: f64, chunk_size: f64) -> JsValue {
    let Some(size) = NonZeroU64::new(chunk_size as u64) else {
        return error_result("chunk size must be positive");
    };
    to_js_typed(&plan_chunks(from as u64, to as u64, size))
}

/// Decodes one `Donated` log given as JSON (`transactionHash`, `blockNumber`,
/// `logIndex`, `topics`, `data`).
#[wasm_bindgen]
pub fn decode_donation_log(log_json: &str, decimals: Option<u32>) -> JsValue {
    let log: RawLog = match serde_json::from_str(log_json) {
        Ok(log) => log,
        Err(e) => return error_result(&format!("Invalid log JSON: {e}")),
    };
    match decode_donation(&log, decimals.unwrap_or(DONATION_TOKEN_DECIMALS)) {
        Ok(donation) => to_js_typed(&donation),
        Err(e) => error_result(&e.to_string()),
    }
}

/// Decodes a `getCampaignDetails` result array for `address`.
#[wasm_bindgen]
pub fn decode_campaign_detail(address: &str, record_json: &str, decimals: Option<u32>) -> JsValue {
    let address: Address = match address.parse() {
        Ok(a) => a,
        Err(e) => return error_result(&e.to_string()),
    };
    let record: serde_json::Value = match serde_json::from_str(record_json) {
        Ok(v) => v,
        Err(_) => return error_result("Invalid JSON"),
    };
    match decode_detail_record(&address, &record, decimals.unwrap_or(CAMPAIGN_AMOUNT_DECIMALS)) {
        Ok(detail) => to_js_typed(&detail),
        Err(e) => error_result(&e.to_string()),
    }
}

/// Progress of a decoded campaign: `{ percent, filledLinks, totalLinks }`.
#[wasm_bindgen]
pub fn campaign_progress(detail_json: &str) -> JsValue {
    let detail: CampaignDetail = match serde_json::from_str(detail_json) {
        Ok(d) => d,
        Err(e) => return error_result(&format!("Invalid campaign JSON: {e}")),
    };
    let obj = serde_json::json!({
        "percent": detail.progress_percent().to_string(),
        "filledLinks": detail.filled_links(PROGRESS_CHAIN_LINKS),
        "totalLinks": PROGRESS_CHAIN_LINKS,
    });
    to_js(&obj)
}
