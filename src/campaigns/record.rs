//! Shape-checked decoding of the `getCampaignDetails` tuple.

use serde_json::Value;

use crate::campaigns::{CampaignDetail, split_image_urls};
use crate::chain::abi::json_to_u128;
use crate::error::Error;
use crate::types::Address;
use crate::units::format_units;

/// Field names of the detail tuple, in ABI order.
pub const DETAIL_FIELDS: [&str; 9] = [
    "title",
    "description",
    "imageUrl",
    "goalAmount",
    "raisedAmount",
    "charityWallet",
    "creatorName",
    "creationDate",
    "allowDeletion",
];

/// Records written before `allowDeletion` was added.
pub const LEGACY_FIELD_COUNT: usize = 8;
pub const FIELD_COUNT: usize = DETAIL_FIELDS.len();

struct Fields<'a> {
    context: String,
    values: &'a [Value],
}

impl Fields<'_> {
    fn get(&self, index: usize) -> Result<(&'static str, &Value), Error> {
        let name = DETAIL_FIELDS
            .get(index)
            .copied()
            .ok_or_else(|| Error::decode(&self.context, format!("no field at index {index}")))?;
        let value = self
            .values
            .get(index)
            .ok_or_else(|| Error::decode(&self.context, format!("missing field {name}")))?;
        Ok((name, value))
    }

    fn mismatch(&self, name: &str, expected: &str, got: &Value) -> Error {
        Error::decode(&self.context, format!("field {name}: expected {expected}, got {got}"))
    }

    fn string(&self, index: usize) -> Result<String, Error> {
        let (name, value) = self.get(index)?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| self.mismatch(name, "string", value))
    }

    fn uint(&self, index: usize) -> Result<u128, Error> {
        let (name, value) = self.get(index)?;
        json_to_u128(value, name).map_err(|e| Error::decode(&self.context, e.to_string()))
    }

    fn address(&self, index: usize) -> Result<Address, Error> {
        let (name, value) = self.get(index)?;
        let raw = value
            .as_str()
            .ok_or_else(|| self.mismatch(name, "address", value))?;
        raw.parse()
            .map_err(|e: Error| Error::decode(&self.context, format!("field {name}: {e}")))
    }

    fn boolean(&self, index: usize) -> Result<bool, Error> {
        let (name, value) = self.get(index)?;
        value
            .as_bool()
            .ok_or_else(|| self.mismatch(name, "bool", value))
    }
}

/// Decodes one detail read result for `address`.
///
/// The value must be an array of exactly [`LEGACY_FIELD_COUNT`] or
/// [`FIELD_COUNT`] elements whose types match [`DETAIL_FIELDS`]. Amounts are
/// scaled down by `decimals`.
pub fn decode_detail_record(
    address: &Address,
    value: &Value,
    decimals: u32,
) -> Result<CampaignDetail, Error> {
    let context = format!("campaign {address}");
    let values = value
        .as_array()
        .ok_or_else(|| Error::decode(&context, format!("expected a tuple, got {value}")))?;
    if values.len() != LEGACY_FIELD_COUNT && values.len() != FIELD_COUNT {
        return Err(Error::decode(
            &context,
            format!(
                "expected {LEGACY_FIELD_COUNT} or {FIELD_COUNT} fields, got {}",
                values.len()
            ),
        ));
    }

    let fields = Fields { context, values };
    let amount = |index: usize| -> Result<_, Error> {
        let raw = fields.uint(index)?;
        format_units(raw, decimals).map_err(|e| Error::decode(&fields.context, e.to_string()))
    };
    let creation_date = u64::try_from(fields.uint(7)?)
        .map_err(|_| Error::decode(&fields.context, "creationDate exceeds 64 bits"))?;
    let allow_deletion = if values.len() == FIELD_COUNT {
        Some(fields.boolean(8)?)
    } else {
        None
    };

    Ok(CampaignDetail {
        contract_address: address.clone(),
        title: fields.string(0)?,
        description: fields.string(1)?,
        image_urls: split_image_urls(&fields.string(2)?),
        goal_amount: amount(3)?,
        raised_amount: amount(4)?,
        charity_wallet: fields.address(5)?,
        creator_name: fields.string(6)?,
        creation_date,
        allow_deletion,
    })
}
