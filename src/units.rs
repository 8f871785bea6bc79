use rust_decimal::Decimal;

use crate::error::Error;

/// Decimals of the stablecoin donations are made in.
pub const DONATION_TOKEN_DECIMALS: u32 = 6;
/// Scale of `goalAmount` / `raisedAmount` in campaign detail records.
pub const CAMPAIGN_AMOUNT_DECIMALS: u32 = 18;

/// Converts a fixed-point on-chain integer into a decimal value,
/// e.g. `5_000_000` with 6 decimals is `5`.
pub fn format_units(raw: u128, decimals: u32) -> Result<Decimal, Error> {
    let signed = i128::try_from(raw).map_err(|_| Error::Parse {
        reason: format!("amount {raw} exceeds i128"),
    })?;
    Decimal::try_from_i128_with_scale(signed, decimals)
        .map(|d| d.normalize())
        .map_err(|e| Error::Parse {
            reason: format!("amount {raw} with {decimals} decimals is not representable: {e}"),
        })
}
