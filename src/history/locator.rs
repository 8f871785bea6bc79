use crate::chain::ChainReader;
use crate::error::Error;
use crate::types::Address;

/// Finds the first block at which `address` has bytecode.
///
/// Bytecode presence is assumed monotonic in height, so this is a binary
/// search over `[0, latest]` costing O(log latest) sequential `code_at` calls.
pub async fn locate_deployment_block<R: ChainReader>(
    reader: &R,
    address: &Address,
) -> Result<u64, Error> {
    let latest = reader.current_height().await?;
    if reader.code_at(address, latest).await?.is_empty() {
        return Err(Error::NotFound {
            address: address.clone(),
            latest,
        });
    }

    // Invariant: code is present at `high`, absent below `low`.
    let (mut low, mut high) = (0_u64, latest);
    let mut probes = 1_u32;
    while low < high {
        let mid = low + (high - low) / 2;
        probes += 1;
        if reader.code_at(address, mid).await?.is_empty() {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    tracing::debug!(%address, deployment_block = high, latest, probes, "located deployment block");
    Ok(high)
}
