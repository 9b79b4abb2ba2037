//! Aggregation of market reserves behind the root contract.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use tracing::*;

use crate::address::format_address;
use crate::codec::Source;
use crate::config::AssetMap;
use crate::error::{AggregationError, ChainError, DecodeError};
use crate::onchain::OnChain;

/// Root contract accessor returning every market address.
pub const ALL_MARKETS: &str = "allMarkets";
/// Market accessor returning its total reserves as an i128.
pub const TOTAL_RESERVES: &str = "totalReserves";

/// Decimal balances keyed by asset display name.
pub type Reserves = BTreeMap<String, String>;

/// Decode a var-uint count followed by that many addresses.
pub fn decode_markets(buf: &[u8]) -> Result<Vec<Address>, DecodeError> {
    let mut source = Source::new(buf);
    let count = source.next_var_uint()?;

    (0..count).map(|_| source.next_address()).collect()
}

pub fn decode_reserve(buf: &[u8]) -> Result<i128, DecodeError> {
    Source::new(buf).next_i128()
}

async fn call<T>(
    onchain: &impl OnChain,
    contract: Address,
    method: &'static str,
    decode: impl FnOnce(&[u8]) -> Result<T, DecodeError>,
) -> Result<T, ChainError> {
    let bytes = onchain.pre_exec(contract, method, &[]).await.map_err(
        |source| ChainError::Invocation {
            contract: format_address(&contract),
            method,
            source,
        },
    )?;

    decode(&bytes).map_err(|source| ChainError::Decode {
        contract: format_address(&contract),
        method,
        source,
    })
}

/// List the markets registered on the root contract, in contract order.
pub async fn list_markets(
    onchain: &impl OnChain,
    root: Address,
) -> Result<Vec<Address>, ChainError> {
    let markets = call(onchain, root, ALL_MARKETS, decode_markets).await?;
    debug!(
        "Root contract {} lists {} markets",
        format_address(&root),
        markets.len()
    );
    Ok(markets)
}

/// Query the total reserves of every market behind `root`.
///
/// Markets are queried one after the other and the first failure aborts the
/// whole aggregation. Markets missing from `asset_map` are reported under
/// their address.
pub async fn total_reserve(
    onchain: &impl OnChain,
    root: Address,
    asset_map: &AssetMap,
) -> Result<Reserves, AggregationError> {
    let markets = list_markets(onchain, root)
        .await
        .map_err(AggregationError::ListMarkets)?;

    let mut reserves = Reserves::new();
    for market in markets {
        let market_hex = format_address(&market);

        let reserve = call(onchain, market, TOTAL_RESERVES, decode_reserve)
            .await
            .map_err(|source| AggregationError::Market {
                market: market_hex.clone(),
                source,
            })?;

        let name = match asset_map.get(&market) {
            Some(name) => name.to_string(),
            None => {
                warn!(
                    "Market {market_hex} has no asset name, \
                     reporting it by address"
                );
                market_hex
            }
        };
        trace!("{name} reserves: {reserve}");

        let previous = reserves.insert(name.clone(), reserve.to_string());
        if let Some(previous) = previous {
            warn!(
                "Asset {name} is mapped to several markets, \
                 replacing reserve {previous}"
            );
        }
    }

    Ok(reserves)
}
