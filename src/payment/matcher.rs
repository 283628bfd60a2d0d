//! Payment matching against ledger transactions.
//!
//! Pure evaluation: given the transactions seen at an address and the
//! parameters of one price point, decide whether the invoice is satisfied and
//! which transactions contributed. No side effects, deterministic, and safe to
//! re-run on every engine evaluation.

use serde::{Deserialize, Serialize};

use crate::types::TxHash;

/// Ledger amounts are fixed-point integers with eight decimal places.
pub const AMOUNT_PRECISION: f64 = 100_000_000.0;

/// The kind of a ledger transaction. Only transfers can satisfy an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxKind {
    Transfer,
    #[serde(other)]
    Other,
}

/// A transaction as reported by the blockchain collaborator. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub hash: TxHash,
    /// Fixed-point amount (decimal value × 10^8).
    pub amount: i64,
    /// Token symbol, e.g. "TWT-8C2".
    pub token: String,
    /// Block timestamp, ms since epoch.
    pub block_time: i64,
    /// Free-form transaction memo.
    pub memo: String,
    /// Source address.
    pub from: String,
    /// Destination address.
    pub to: String,
    pub kind: TxKind,
}

impl LedgerTransaction {
    /// The amount in decimal token units.
    pub fn decimal_amount(&self) -> f64 {
        self.amount as f64 / AMOUNT_PRECISION
    }
}

/// Outcome of evaluating one price point against the ledger.
///
/// Derived and ephemeral: computed fresh on every evaluation, never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentStatus {
    /// Whether the summed matching amount reaches the minimum.
    pub paid: bool,
    /// Sum of matching amounts, in decimal token units.
    pub amount: f64,
    /// The token this status was evaluated for.
    pub token: String,
    /// The matching transactions, in ledger order.
    pub transactions: Vec<LedgerTransaction>,
}

impl PaymentStatus {
    /// An unpaid, zero-amount status.
    pub fn unpaid() -> PaymentStatus {
        PaymentStatus::default()
    }
}

/// Decides whether a single transaction counts towards an invoice.
///
/// All five predicates must hold: it is a transfer, it was sent to the invoice
/// address, its block time falls inside the payment window (inclusive), its
/// memo matches, and its token matches. Memo and token comparisons are
/// case-insensitive; the address comparison is exact.
pub fn matches(
    tx: &LedgerTransaction,
    address: &str,
    memo: &str,
    token: &str,
    window_start: i64,
    window_end: i64,
) -> bool {
    if tx.kind != TxKind::Transfer {
        return false;
    }
    if tx.to != address {
        return false;
    }
    if tx.block_time < window_start || tx.block_time > window_end {
        return false;
    }
    if !tx.memo.eq_ignore_ascii_case(memo) {
        return false;
    }
    if !tx.token.eq_ignore_ascii_case(token) {
        return false;
    }

    true
}

/// Evaluates one price point against a set of ledger transactions.
///
/// Sums the amounts of all matching transactions and compares the total
/// against `min_amount`. An empty transaction list yields an unpaid,
/// zero-amount status.
#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    txs: &[LedgerTransaction],
    address: &str,
    memo: &str,
    token: &str,
    window_start: i64,
    window_end: i64,
    min_amount: f64,
) -> PaymentStatus {
    if txs.is_empty() {
        return PaymentStatus::unpaid();
    }

    let mut sum = 0.0;
    let mut matching = Vec::new();

    for tx in txs {
        if !matches(tx, address, memo, token, window_start, window_end) {
            continue;
        }

        sum += tx.decimal_amount();
        matching.push(tx.clone());
    }

    PaymentStatus {
        paid: sum >= min_amount,
        amount: sum,
        token: token.to_string(),
        transactions: matching,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ADDRESS: &str = "bnb1tqq9llyr3dyjd559dha6z5r5etk3qfwk07m098";
    const MEMO: &str = "3395";
    const TOKEN: &str = "TWT-8C2";
    const WINDOW_START: i64 = 1_000_000;
    const WINDOW_END: i64 = 2_000_000;

    fn transfer(amount_decimal: f64) -> LedgerTransaction {
        LedgerTransaction {
            hash: TxHash::from("AB12"),
            amount: (amount_decimal * AMOUNT_PRECISION) as i64,
            token: TOKEN.to_string(),
            block_time: 1_500_000,
            memo: MEMO.to_string(),
            from: "bnb1sender".to_string(),
            to: ADDRESS.to_string(),
            kind: TxKind::Transfer,
        }
    }

    fn eval(txs: &[LedgerTransaction], min: f64) -> PaymentStatus {
        evaluate(txs, ADDRESS, MEMO, TOKEN, WINDOW_START, WINDOW_END, min)
    }

    #[test]
    fn empty_ledger_is_unpaid_zero() {
        let status = eval(&[], 1900.0);
        assert!(!status.paid);
        assert_eq!(status.amount, 0.0);
        assert!(status.transactions.is_empty());
    }

    #[test]
    fn single_sufficient_transfer_pays() {
        let status = eval(&[transfer(2000.0)], 1900.0);
        assert!(status.paid);
        assert_eq!(status.amount, 2000.0);
        assert_eq!(status.transactions.len(), 1);
        assert_eq!(status.token, TOKEN);
    }

    #[test]
    fn amount_just_below_minimum_is_unpaid() {
        let status = eval(&[transfer(1899.99)], 1900.0);
        assert!(!status.paid);
        assert_eq!(status.transactions.len(), 1);
    }

    #[test]
    fn exact_minimum_pays() {
        let status = eval(&[transfer(1900.0)], 1900.0);
        assert!(status.paid);
    }

    #[test]
    fn exact_tolerance_boundary_payment_pays() {
        // A contributor paying exactly the advertised tolerance amount must
        // never be judged short by rounding in the threshold itself.
        let min = crate::payment::min_amount(95.0, 2000.0);
        let status = eval(&[transfer(1900.0)], min);
        assert!(status.paid);
    }

    #[test]
    fn partial_payments_accumulate() {
        let status = eval(&[transfer(1000.0), transfer(950.0)], 1900.0);
        assert!(status.paid);
        assert_eq!(status.amount, 1950.0);
        assert_eq!(status.transactions.len(), 2);
    }

    #[test]
    fn partial_payments_below_threshold_stay_unpaid() {
        let status = eval(&[transfer(1000.0), transfer(800.0)], 1900.0);
        assert!(!status.paid);
        assert_eq!(status.amount, 1800.0);
    }

    #[test]
    fn matching_subset_keeps_ledger_order() {
        let mut early = transfer(500.0);
        early.hash = TxHash::from("FIRST");
        let mut bogus = transfer(9999.0);
        bogus.memo = "other".to_string();
        let mut late = transfer(1500.0);
        late.hash = TxHash::from("SECOND");

        let status = eval(&[early, bogus, late], 1900.0);
        assert!(status.paid);
        let hashes: Vec<&str> = status
            .transactions
            .iter()
            .map(|tx| tx.hash.as_str())
            .collect();
        assert_eq!(hashes, vec!["FIRST", "SECOND"]);
    }

    #[test]
    fn wrong_memo_never_matches() {
        let mut tx = transfer(1_000_000.0);
        tx.memo = "9999".to_string();
        assert!(!eval(&[tx], 1900.0).paid);
    }

    #[test]
    fn memo_comparison_is_case_insensitive() {
        let mut tx = transfer(2000.0);
        tx.memo = MEMO.to_uppercase();
        assert!(eval(&[tx], 1900.0).paid);
    }

    #[test]
    fn token_comparison_is_case_insensitive() {
        let mut tx = transfer(2000.0);
        tx.token = "twt-8c2".to_string();
        assert!(eval(&[tx], 1900.0).paid);
    }

    #[test]
    fn wrong_destination_never_matches() {
        let mut tx = transfer(1_000_000.0);
        tx.to = "bnb1somewhereelse".to_string();
        assert!(!eval(&[tx], 1900.0).paid);
    }

    #[test]
    fn out_of_window_never_matches() {
        let mut before = transfer(1_000_000.0);
        before.block_time = WINDOW_START - 1;
        let mut after = transfer(1_000_000.0);
        after.block_time = WINDOW_END + 1;

        assert!(!eval(&[before], 1900.0).paid);
        assert!(!eval(&[after], 1900.0).paid);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let mut at_start = transfer(2000.0);
        at_start.block_time = WINDOW_START;
        let mut at_end = transfer(2000.0);
        at_end.block_time = WINDOW_END;

        assert!(eval(&[at_start], 1900.0).paid);
        assert!(eval(&[at_end], 1900.0).paid);
    }

    #[test]
    fn non_transfer_never_matches() {
        let mut tx = transfer(1_000_000.0);
        tx.kind = TxKind::Other;
        assert!(!eval(&[tx], 1900.0).paid);
    }

    #[test]
    fn fixed_point_conversion() {
        let tx = LedgerTransaction {
            amount: 123_456_789,
            ..transfer(0.0)
        };
        assert!((tx.decimal_amount() - 1.23456789).abs() < 1e-12);
    }

    #[test]
    fn tx_kind_deserializes_unknown_as_other() {
        let kind: TxKind = serde_json::from_str("\"FREEZE_TOKEN\"").unwrap();
        assert_eq!(kind, TxKind::Other);
        let kind: TxKind = serde_json::from_str("\"TRANSFER\"").unwrap();
        assert_eq!(kind, TxKind::Transfer);
    }

    // ─── Property tests ───

    fn arb_tx() -> impl Strategy<Value = LedgerTransaction> {
        (
            "[0-9A-F]{8}",
            0i64..10_000_000_000_000,
            prop_oneof![Just(TOKEN.to_string()), Just("BNB".to_string())],
            WINDOW_START - 100_000..WINDOW_END + 100_000,
            prop_oneof![Just(MEMO.to_string()), Just("other".to_string())],
            prop_oneof![Just(ADDRESS.to_string()), Just("bnb1other".to_string())],
            prop_oneof![Just(TxKind::Transfer), Just(TxKind::Other)],
        )
            .prop_map(|(hash, amount, token, block_time, memo, to, kind)| {
                LedgerTransaction {
                    hash: TxHash::new(hash),
                    amount,
                    token,
                    block_time,
                    memo,
                    from: "bnb1sender".to_string(),
                    to,
                    kind,
                }
            })
    }

    proptest! {
        /// The summed amount always equals the sum over the matching subset.
        #[test]
        fn amount_is_sum_of_matching_subset(txs in prop::collection::vec(arb_tx(), 0..20)) {
            let status = eval(&txs, 1900.0);

            let expected: f64 = txs
                .iter()
                .filter(|tx| matches(tx, ADDRESS, MEMO, TOKEN, WINDOW_START, WINDOW_END))
                .map(|tx| tx.decimal_amount())
                .sum();

            prop_assert!((status.amount - expected).abs() < 1e-9);
            prop_assert_eq!(status.paid, status.amount >= 1900.0);
        }

        /// Every reported transaction satisfies all five predicates.
        #[test]
        fn reported_transactions_all_match(txs in prop::collection::vec(arb_tx(), 0..20)) {
            let status = eval(&txs, 1900.0);
            for tx in &status.transactions {
                prop_assert!(matches(tx, ADDRESS, MEMO, TOKEN, WINDOW_START, WINDOW_END));
            }
        }
    }
}
