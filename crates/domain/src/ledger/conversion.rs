use super::errors::LedgerError;

/// Converts an upstream USD cost to whole credits, rounding half away from zero.
pub fn usd_to_credits(cost_usd: f64, usd_to_credits_rate: f64) -> Result<i64, LedgerError> {
    if !cost_usd.is_finite() || cost_usd < 0.0 {
        return Err(LedgerError::InvalidAmount(format!(
            "cost must be a non-negative number, got {cost_usd}"
        )));
    }
    if !usd_to_credits_rate.is_finite() || usd_to_credits_rate < 0.0 {
        return Err(LedgerError::InvalidAmount(format!(
            "exchange rate must be a non-negative number, got {usd_to_credits_rate}"
        )));
    }

    let credits = (cost_usd * usd_to_credits_rate).round();
    if credits > i64::MAX as f64 {
        return Err(LedgerError::InvalidAmount(format!(
            "cost {cost_usd} overflows the credit range"
        )));
    }

    Ok(credits as i64)
}
