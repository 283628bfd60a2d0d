//! Invoice derivation and payment evaluation.

pub mod invoice;
pub mod matcher;

pub use invoice::{min_amount, Invoice, PricePoint};
pub use matcher::{
    evaluate, LedgerTransaction, PaymentStatus, TxKind, AMOUNT_PRECISION,
};

use crate::blockchain::{Ledger, LedgerError};

/// Evaluates an invoice against the ledger.
///
/// Price points are tried in configured order. For each point the address's
/// transactions are fetched fresh and run through the matcher; the first point
/// that is fully paid wins. If none is, the last (unpaid) status is returned,
/// so callers can still report a partial amount for the final point.
pub async fn check_invoice(
    ledger: &dyn Ledger,
    invoice: &Invoice,
) -> Result<PaymentStatus, LedgerError> {
    let mut last = PaymentStatus::unpaid();

    for point in &invoice.price_points {
        let txs = ledger.transactions(&invoice.address).await?;

        let status = evaluate(
            &txs,
            &invoice.address,
            &invoice.memo,
            &point.token,
            invoice.window_start,
            invoice.window_end,
            point.min_amount,
        );

        if status.paid {
            return Ok(status);
        }

        last = status;
    }

    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::types::{PrNumber, TxHash};
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FixedLedger {
        txs: Vec<LedgerTransaction>,
    }

    #[async_trait]
    impl Ledger for FixedLedger {
        async fn transactions(
            &self,
            _address: &str,
        ) -> Result<Vec<LedgerTransaction>, LedgerError> {
            Ok(self.txs.clone())
        }

        async fn burn(&self, _token: &str, _amount: f64) -> Result<Option<TxHash>, LedgerError> {
            Ok(None)
        }
    }

    fn invoice() -> Invoice {
        let config = test_config();
        let created = chrono::Utc.with_ymd_and_hms(2022, 4, 1, 12, 0, 0).unwrap();
        Invoice::derive(&config.payment, PrNumber(3395), created)
    }

    fn tx(amount_decimal: f64, token: &str, invoice: &Invoice) -> LedgerTransaction {
        LedgerTransaction {
            hash: TxHash::from("HASH"),
            amount: (amount_decimal * AMOUNT_PRECISION) as i64,
            token: token.to_string(),
            block_time: invoice.window_start + 1,
            memo: invoice.memo.clone(),
            from: "bnb1sender".to_string(),
            to: invoice.address.clone(),
            kind: TxKind::Transfer,
        }
    }

    #[tokio::test]
    async fn first_paid_price_point_wins() {
        let invoice = invoice();
        let ledger = FixedLedger {
            txs: vec![tx(2000.0, "TWT-8C2", &invoice)],
        };

        let status = check_invoice(&ledger, &invoice).await.unwrap();
        assert!(status.paid);
        assert_eq!(status.token, "TWT-8C2");
    }

    #[tokio::test]
    async fn later_price_point_can_satisfy() {
        let invoice = invoice();
        let ledger = FixedLedger {
            txs: vec![tx(5.0, "BNB", &invoice)],
        };

        let status = check_invoice(&ledger, &invoice).await.unwrap();
        assert!(status.paid);
        assert_eq!(status.token, "BNB");
    }

    #[tokio::test]
    async fn unpaid_returns_last_point_status() {
        let invoice = invoice();
        // Partial payment towards the second (BNB) point only.
        let ledger = FixedLedger {
            txs: vec![tx(1.0, "BNB", &invoice)],
        };

        let status = check_invoice(&ledger, &invoice).await.unwrap();
        assert!(!status.paid);
        assert_eq!(status.token, "BNB");
        assert_eq!(status.amount, 1.0);
    }

    #[tokio::test]
    async fn empty_ledger_is_unpaid() {
        let invoice = invoice();
        let ledger = FixedLedger { txs: vec![] };

        let status = check_invoice(&ledger, &invoice).await.unwrap();
        assert!(!status.paid);
        assert_eq!(status.amount, 0.0);
    }
}
