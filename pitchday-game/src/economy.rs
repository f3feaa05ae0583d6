//! Pure investment economics: shares, payouts, bankroll settlement.

use crate::constants::DAILY_BANKROLL_FLOOR_USD;
use crate::numbers;
use crate::state::BankrollState;

/// Fraction of gross revenue an investment earns, capped. A non-positive
/// valuation yields no share rather than dividing by zero.
#[must_use]
pub fn ownership_share(invested_usd: f64, valuation_usd: f64, cap_fraction: f64) -> f64 {
    if valuation_usd <= 0.0 || !valuation_usd.is_finite() || !invested_usd.is_finite() {
        return 0.0;
    }
    (invested_usd / valuation_usd).min(cap_fraction).max(0.0)
}

/// Largest whole-dollar investment the cap and available funds permit.
/// Non-finite inputs permit nothing; `f64::min` would otherwise discard a
/// NaN valuation and let the full requested amount through.
#[must_use]
pub fn max_investable(valuation_usd: f64, cap_fraction: f64, available_funds: f64) -> i64 {
    if !valuation_usd.is_finite() || !available_funds.is_finite() {
        return 0;
    }
    let ceiling = (valuation_usd * cap_fraction).min(available_funds);
    numbers::floor_f64_to_i64(ceiling).max(0)
}

/// Floor a requested amount, then clamp it into `[0, max_investable]`.
/// Callers must treat a result of zero as a rejected request, not a
/// zero-value success.
#[must_use]
pub fn clamp_investment(requested_usd: f64, max_investable_usd: i64) -> i64 {
    numbers::floor_f64_to_i64(requested_usd).clamp(0, max_investable_usd.max(0))
}

#[must_use]
pub fn gross_revenue(units_sold: i64, unit_price_usd: i64) -> i64 {
    units_sold.saturating_mul(unit_price_usd)
}

/// `round(gross * share)` in whole dollars.
#[must_use]
pub fn payout(gross_revenue_usd: i64, share: f64) -> i64 {
    numbers::round_f64_to_i64(numbers::i64_to_f64(gross_revenue_usd) * share)
}

/// Post-transaction bankroll, never negative.
#[must_use]
pub fn settle_bankroll(old_bankroll_usd: i64, invested_usd: i64, payout_usd: i64) -> i64 {
    old_bankroll_usd
        .saturating_sub(invested_usd)
        .saturating_add(payout_usd)
        .max(0)
}

/// Apply the daily floor on the first observation of a new date key only.
/// Mid-day transactions may drop the bankroll below the floor; the floor
/// returns at the next rollover. Returns whether a rollover happened.
pub fn apply_daily_floor(state: &mut BankrollState, date_key: &str) -> bool {
    if state.last_seen_date_key.as_deref() == Some(date_key) {
        return false;
    }
    state.last_seen_date_key = Some(date_key.to_string());
    if state.bankroll_usd < DAILY_BANKROLL_FLOOR_USD {
        state.bankroll_usd = DAILY_BANKROLL_FLOOR_USD;
    }
    true
}
