//! Invoice derivation.
//!
//! An invoice is never stored: it is derived from configuration plus the PR's
//! creation time on every evaluation. The memo is the PR number, the payment
//! window is the 30 days following PR creation, and the acceptable amounts are
//! the configured price points in order.

use chrono::{DateTime, Utc};

use crate::config::PaymentConfig;
use crate::types::PrNumber;

/// Payment window length: 30 days, in milliseconds (ledger timestamps are ms).
const PAYMENT_WINDOW_MS: i64 = 30 * 86_400 * 1000;

/// Floor of the accepted tolerance percentage.
const TOLERANCE_FLOOR: f64 = 95.0;

/// Ceiling of the accepted tolerance percentage.
const TOLERANCE_CEIL: f64 = 100.0;

/// One acceptable payment for an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    /// Advertised amount in decimal token units.
    pub amount: f64,
    /// Display symbol.
    pub symbol: String,
    /// Full on-chain token identifier.
    pub token: String,
    /// Smallest amount that still satisfies this price point.
    pub min_amount: f64,
}

/// The payment expectation for one pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    /// Memo correlating payments with the PR (the PR number as a string).
    pub memo: String,
    /// Destination address.
    pub address: String,
    /// Start of the payment window, ms since epoch (PR creation time).
    pub window_start: i64,
    /// End of the payment window, ms since epoch (creation + 30 days).
    pub window_end: i64,
    /// Acceptable payments, evaluated in configured order.
    pub price_points: Vec<PricePoint>,
}

impl Invoice {
    /// Derives the invoice for a pull request from payment configuration.
    pub fn derive(payment: &PaymentConfig, pr: PrNumber, created_at: DateTime<Utc>) -> Invoice {
        let window_start = created_at.timestamp_millis();

        let price_points = payment
            .options
            .iter()
            .map(|option| PricePoint {
                amount: option.amount,
                symbol: option.symbol.clone(),
                token: option.token.clone(),
                min_amount: min_amount(payment.tolerance_percent, option.amount),
            })
            .collect();

        Invoice {
            memo: pr.memo(),
            address: payment.address.clone(),
            window_start,
            window_end: window_start + PAYMENT_WINDOW_MS,
            price_points,
        }
    }
}

/// Smallest acceptable amount for a price point.
///
/// The tolerance percentage is clamped to [95, 100]: values below the floor
/// would let a payment fall too far short, values above 100 would demand more
/// than advertised.
pub fn min_amount(tolerance_percent: f64, amount: f64) -> f64 {
    // Dividing last keeps the advertised amounts exact (95% of 2000 must be
    // 1900, not 1900.0000000000002, or an exact payment reads as short).
    amount * tolerance_percent.clamp(TOLERANCE_FLOOR, TOLERANCE_CEIL) / 100.0
}
