//! Native and ERC-20 balance queries
//!
//! Read-only, single-call helpers; nothing here touches private keys.

use crate::chain::ChainClient;
use crate::error::RpcError;
use alloy::primitives::{Address, Bytes, U256};

/// ERC20 `balanceOf(address)` selector
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// ERC20 `decimals()` selector
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// Assumed when a token does not answer `decimals()`
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Native currency balance in smallest units
pub async fn native_balance<C: ChainClient + ?Sized>(
    client: &C,
    owner: Address,
) -> Result<U256, RpcError> {
    client.balance_at(owner).await
}

/// ERC-20 token balance in the token's smallest units
pub async fn token_balance<C: ChainClient + ?Sized>(
    client: &C,
    token: Address,
    owner: Address,
) -> Result<U256, RpcError> {
    let result = client
        .call_contract(token, balance_of_calldata(owner))
        .await?;

    // Decode U256 from result bytes
    let balance = if result.len() >= 32 {
        U256::from_be_slice(&result[..32])
    } else {
        tracing::debug!(token = %token, len = result.len(), "Short balanceOf response");
        U256::ZERO
    };
    Ok(balance)
}

/// Decimals reported by an ERC-20 token
///
/// Tokens that return a short or out-of-range answer default to 18.
pub async fn token_decimals<C: ChainClient + ?Sized>(
    client: &C,
    token: Address,
) -> Result<u8, RpcError> {
    let result = client
        .call_contract(token, Bytes::from(DECIMALS_SELECTOR.to_vec()))
        .await?;

    if result.len() < 32 {
        tracing::debug!(token = %token, len = result.len(), "Short decimals response");
        return Ok(DEFAULT_TOKEN_DECIMALS);
    }
    // uint8 is right-aligned in the word; anything above it is not a valid answer
    if result[..31].iter().any(|b| *b != 0) {
        return Ok(DEFAULT_TOKEN_DECIMALS);
    }
    Ok(result[31])
}

/// Encode: selector + address left-padded to 32 bytes
fn balance_of_calldata(owner: Address) -> Bytes {
    let mut calldata = Vec::with_capacity(36);
    calldata.extend_from_slice(&BALANCE_OF_SELECTOR);
    calldata.extend_from_slice(&[0u8; 12]);
    calldata.extend_from_slice(owner.as_slice());
    Bytes::from(calldata)
}
