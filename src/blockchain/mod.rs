//! Blockchain collaborator: ledger reads and token burns.
//!
//! The [`Ledger`] trait abstracts over the chain so the engine and tests never
//! touch the network. [`HttpLedger`] is the production implementation, backed
//! by the chain's public HTTP API and an optional signing service for burns.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::BlockchainConfig;
use crate::payment::{LedgerTransaction, AMOUNT_PRECISION};
use crate::types::TxHash;

/// Page size requested from the transaction API.
const TX_FETCH_LIMIT: u32 = 50;

/// Attempts per fetch before giving up.
const FETCH_ATTEMPTS: u32 = 4;

/// Pause between fetch retries.
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ledger API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("signing service returned {status}: {body}")]
    Signer {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Read and burn operations against the chain.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Returns recent transactions involving `address`, newest first, in the
    /// order the chain API reports them.
    async fn transactions(&self, address: &str) -> Result<Vec<LedgerTransaction>, LedgerError>;

    /// Burns `amount` (decimal units) of `token`. Returns the burn transaction
    /// hash, or `None` when burning is not possible for this token (the
    /// chain's native coin) or no signing service is configured.
    async fn burn(&self, token: &str, amount: f64) -> Result<Option<TxHash>, LedgerError>;
}

/// Builds an explorer link for a transaction.
pub fn explorer_tx_link(explorer_url: &str, hash: &TxHash) -> String {
    format!("{}/tx/{}", explorer_url.trim_end_matches('/'), hash)
}

/// Wire shape of one transaction as returned by the chain API.
#[derive(Debug, Deserialize)]
struct ApiTx {
    #[serde(rename = "txHash")]
    hash: String,
    /// Fixed-point amount, decimal value × 10^8.
    #[serde(rename = "value")]
    amount: i64,
    #[serde(rename = "txAsset")]
    asset: String,
    #[serde(rename = "blockTime")]
    block_time: i64,
    #[serde(default)]
    memo: String,
    #[serde(rename = "fromAddr")]
    from: String,
    #[serde(rename = "toAddr", default)]
    to: String,
    #[serde(rename = "txType")]
    kind: crate::payment::TxKind,
}

#[derive(Debug, Deserialize)]
struct TxPage {
    tx: Vec<ApiTx>,
}

#[derive(Debug, Deserialize)]
struct BurnResponse {
    hash: String,
}

impl From<ApiTx> for LedgerTransaction {
    fn from(tx: ApiTx) -> LedgerTransaction {
        LedgerTransaction {
            hash: TxHash::new(tx.hash),
            amount: tx.amount,
            token: tx.asset,
            block_time: tx.block_time,
            memo: tx.memo,
            from: tx.from,
            to: tx.to,
            kind: tx.kind,
        }
    }
}

/// Production ledger backed by the chain's HTTP API.
pub struct HttpLedger {
    http: reqwest::Client,
    config: BlockchainConfig,
}

impl HttpLedger {
    pub fn new(config: BlockchainConfig) -> HttpLedger {
        HttpLedger {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn fetch_page(&self, address: &str) -> Result<TxPage, LedgerError> {
        let url = format!(
            "{}/api/v1/transactions",
            self.config.api_url.trim_end_matches('/')
        );

        let response = self
            .http
            .get(&url)
            .query(&[("address", address), ("limit", &TX_FETCH_LIMIT.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Api { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn transactions(&self, address: &str) -> Result<Vec<LedgerTransaction>, LedgerError> {
        // The chain API drops requests under load; retry a few times before
        // surfacing the error.
        let mut last_err = None;
        for attempt in 0..FETCH_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(RETRY_DELAY).await;
            }

            match self.fetch_page(address).await {
                Ok(page) => {
                    return Ok(page.tx.into_iter().map(LedgerTransaction::from).collect());
                }
                Err(err) => {
                    warn!(%address, attempt, error = %err, "transaction fetch failed");
                    last_err = Some(err);
                }
            }
        }

        // `last_err` is always set after a failed loop.
        Err(last_err.unwrap_or(LedgerError::Api {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        }))
    }

    async fn burn(&self, token: &str, amount: f64) -> Result<Option<TxHash>, LedgerError> {
        let signer_url = match &self.config.signer_url {
            Some(url) => url,
            None => return Ok(None),
        };

        // The native coin cannot be burned.
        if token.eq_ignore_ascii_case(&self.config.native_symbol) {
            return Ok(None);
        }

        let base_units = (amount * AMOUNT_PRECISION) as i64;
        let url = format!("{}/burn", signer_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "token": token,
                "amount": base_units,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Signer { status, body });
        }

        let burn: BurnResponse = response.json().await?;
        debug!(token, amount, hash = %burn.hash, "tokens burned");

        Ok(Some(TxHash::new(burn.hash)))
    }
}
