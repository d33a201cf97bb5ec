//! Decimal amounts to base units, and the slippage floor

use crate::error::{SubmissionError, SubmissionResult};

use ethers::types::{U256, U512};
use ethers::utils::parse_units;

/// Convert a decimal string such as "0.001" into base units
pub fn to_base_units(amount: &str, decimals: u32) -> SubmissionResult<U256> {
    let amount = amount.trim();
    if amount.is_empty() || amount.starts_with('-') {
        return Err(SubmissionError::InvalidAmount(format!(
            "{:?} is not a positive decimal",
            amount
        )));
    }

    let units = parse_units(amount, decimals)
        .map_err(|e| SubmissionError::InvalidAmount(format!("{}: {}", amount, e)))?;
    let units = U256::from(units);

    if units.is_zero() {
        return Err(SubmissionError::InvalidAmount(format!(
            "{} is zero at {} decimals",
            amount, decimals
        )));
    }
    Ok(units)
}

/// Largest power of ten that fits in a U512
const MAX_EXP10: usize = 154;

/// Slippage as `digits / 10^scale`, read from its shortest decimal form
fn slippage_fraction(slippage_percent: f64) -> SubmissionResult<(U512, usize)> {
    // f64 Display never uses exponent notation
    let text = slippage_percent.to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let digits = U512::from_dec_str(&format!("{}{}", whole, fraction))
        .map_err(|_| SubmissionError::InvalidSlippage(slippage_percent))?;
    Ok((digits, fraction.len()))
}

/// floor(amount * (1 - slippage / 100)) for slippage in [0, 100), computed exactly
pub fn min_output(amount: U256, slippage_percent: f64) -> SubmissionResult<U256> {
    if !slippage_percent.is_finite() || !(0.0..100.0).contains(&slippage_percent) {
        return Err(SubmissionError::InvalidSlippage(slippage_percent));
    }

    if slippage_percent == 0.0 {
        return Ok(amount);
    }
    let (digits, scale) = slippage_fraction(slippage_percent)?;
    if digits.is_zero() || amount.is_zero() {
        return Ok(amount);
    }

    // amount - ceil(amount * digits / 10^(scale + 2))
    let product = U512::from(amount) * digits;
    let loss = if scale + 2 > MAX_EXP10 {
        // Divisor exceeds the product, so the loss is a fraction of one unit
        U512::one()
    } else {
        let (quotient, remainder) = product.div_mod(U512::exp10(scale + 2));
        if remainder.is_zero() {
            quotient
        } else {
            quotient + 1
        }
    };

    U256::try_from(U512::from(amount) - loss)
        .map_err(|_| SubmissionError::InvalidAmount(format!("{} overflows", amount)))
}
