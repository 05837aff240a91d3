//! Conversion between smallest-unit integers and display amounts
//!
//! Native amounts use 18 decimals (wei <-> ether). Formatting is exact;
//! parsing truncates any fractional digits beyond the scale toward zero.

use crate::{Error, Result};
use alloy::primitives::U256;

/// Decimals of the native currency
pub const ETHER_DECIMALS: u8 = 18;

/// Format a smallest-unit amount in the native display unit
pub fn to_display(wei: U256) -> String {
    format_units(wei, ETHER_DECIMALS)
}

/// Parse a native display amount into smallest units, truncating excess precision
pub fn from_display(amount: &str) -> Result<U256> {
    parse_units(amount, ETHER_DECIMALS)
}

/// Parse an integer smallest-unit amount
pub fn parse_smallest(amount: &str) -> Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(amount, "expected a non-negative integer"));
    }
    parse_digits(amount, amount)
}

/// Format a U256 value with decimals
pub fn format_units(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        // Format with decimal places
        let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = remainder_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}

/// Parse a decimal string into an integer scaled by `10^decimals`
///
/// Fractional digits past `decimals` are dropped, not rounded.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let input = amount.trim();
    let (whole, frac) = match input.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (input, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid(amount, "empty amount"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(amount, "expected a non-negative decimal number"));
    }

    let scale = decimals as usize;
    let kept = &frac[..frac.len().min(scale)];
    if kept.len() < frac.len() {
        tracing::debug!(amount = %input, decimals, "Truncating excess fractional digits");
    }

    let mut digits = String::with_capacity(whole.len() + scale);
    digits.push_str(whole);
    digits.push_str(kept);
    digits.extend(std::iter::repeat('0').take(scale - kept.len()));

    parse_digits(&digits, amount)
}

fn parse_digits(digits: &str, original: &str) -> Result<U256> {
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|e| invalid(original, &e.to_string()))
}

fn invalid(amount: &str, reason: &str) -> Error {
    Error::Validation(format!("invalid amount '{}': {}", amount, reason))
}
