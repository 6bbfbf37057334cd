//! Affordability-based credit limit calculation.
//!
//! The residual monthly payment a client can afford under a debt-to-income
//! ceiling (PDN) is converted into a credit-line increment using the share of
//! the line that is typically drawn down per period.

use crate::models::{CreditLimitInput, CreditLimitResult};

/// Regulatory debt-to-income ceiling.
pub const PDN_REGULATORY: f64 = 0.50;

/// Bank-internal debt-to-income ceiling.
pub const PDN_BANK: f64 = 0.40;

/// Drawdown share used when the current limit gives no usable ratio.
pub const FALLBACK_DRAWDOWN: f64 = 0.15;

/// Number of periods existing obligations are amortized over.
pub const AMORTIZATION_PERIODS: f64 = 36.0;

/// Computes the legal maximum and the recommended credit limit.
///
/// Never fails: intermediate values are clamped at zero, unusable drawdown
/// ratios fall back to [`FALLBACK_DRAWDOWN`], and blacklisted or overdue
/// clients get zero for both figures.
pub fn calculate(input: &CreditLimitInput) -> CreditLimitResult {
    if input.blacklist_flag == 1 || input.overdue_sum > 0.0 {
        return CreditLimitResult::default();
    }

    let income = finite_or_zero(input.predicted_income);
    let current_limit = finite_or_zero(input.active_cc_max_limit);
    let outstanding = finite_or_zero(input.outstand_sum);

    let existing_payment = (outstanding / AMORTIZATION_PERIODS).max(0.0);
    let denom = drawdown_ratio(current_limit, input.turn_cur_credit_avg);

    let residual_legal = (PDN_REGULATORY * income - existing_payment).max(0.0);
    let residual_bank = (PDN_BANK * income - existing_payment).max(0.0);

    let add_legal = (residual_legal / denom).max(0.0);
    let add_bank = (residual_bank / denom).max(0.0);

    // A negative current limit must not drag the result below zero
    let base = current_limit.max(0.0);

    CreditLimitResult {
        limit_legal: base + add_legal,
        recommendation_credit_limit: base + add_bank,
    }
}

/// Share of the credit line drawn per period, `avg / C`.
fn drawdown_ratio(current_limit: f64, avg_payment: f64) -> f64 {
    if current_limit <= 0.0 {
        return FALLBACK_DRAWDOWN;
    }
    let ratio = avg_payment / current_limit;
    if !ratio.is_finite() || ratio <= 0.0 {
        FALLBACK_DRAWDOWN
    } else {
        ratio
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
