//! Bot configuration.
//!
//! All tunables live in a single immutable [`Config`] value, deserialized from
//! a JSON file at startup and passed around as `Arc<Config>`. Nothing mutates
//! configuration after load; the engine receives it at construction time.
//!
//! The file path defaults to `config.json` and can be overridden with the
//! `CONFIG_PATH` environment variable.

use std::path::Path;

use chrono::Duration;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Login prefix identifying the bot's own GitHub account. Comments and
    /// reviews from logins starting with this prefix are treated as our own.
    pub service_name: String,

    #[serde(default)]
    pub http: HttpConfig,

    pub github: GithubConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    pub payment: PaymentConfig,

    pub blockchain: BlockchainConfig,

    #[serde(default)]
    pub messages: Messages,

    #[serde(default)]
    pub labels: Labels,

    #[serde(default)]
    pub users: UserAccess,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub limits: Limits,
}

impl Config {
    /// Loads configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

        let config: Config =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `CONFIG_PATH` or `config.json`.
    pub fn load_default() -> Result<Config, ConfigError> {
        let path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string());
        Config::load(path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.payment.options.is_empty() {
            return Err(ConfigError::Invalid(
                "payment.options must contain at least one price point".to_string(),
            ));
        }
        if self.payment.address.is_empty() {
            return Err(ConfigError::Invalid(
                "payment.address must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig { port: 3000 }
    }
}

/// GitHub access settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// Personal access token or installation token.
    pub token: String,
    /// Repository owner the bot watches.
    pub repo_owner: String,
    /// Repository name the bot watches.
    pub repo_name: String,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
}

/// Message queue settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// AMQP connection URL.
    pub url: String,
    /// Queue the classifier publishes to and the consumer drains.
    pub queue_name: String,
    /// Number of concurrent event handlers.
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            url: "amqp://127.0.0.1:5672".to_string(),
            queue_name: "merge_fee_bot_github_events".to_string(),
            workers: 4,
        }
    }
}

/// A configured acceptable payment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentOption {
    /// Expected amount in decimal token units.
    pub amount: f64,
    /// Display symbol (e.g. "TWT").
    pub symbol: String,
    /// Full on-chain token identifier (e.g. "TWT-8C2").
    pub token: String,
}

/// Payment settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Destination address payments must be sent to.
    pub address: String,
    /// Acceptable price points, evaluated in order; the first one fully
    /// satisfied wins.
    pub options: Vec<PaymentOption>,
    /// Accepted shortfall: a payment of `amount * tolerance/100` still counts.
    /// Clamped to [95, 100] at evaluation time.
    #[serde(default = "default_tolerance")]
    pub tolerance_percent: f64,
}

fn default_tolerance() -> f64 {
    100.0
}

/// Blockchain access settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainConfig {
    /// Base URL of the chain's HTTP API (transaction listing).
    pub api_url: String,
    /// Base URL of the block explorer, for links in comments.
    pub explorer_url: String,
    /// The chain's native coin symbol; native-coin payments are never burned.
    #[serde(default)]
    pub native_symbol: String,
    /// Optional signing-service endpoint for burn instructions. When unset,
    /// burns are skipped (reported as not performed).
    #[serde(default)]
    pub signer_url: Option<String>,
}

/// Comment templates. Placeholders (`$PAY1_AMOUNT`, `$QR_CODE`, ...) are
/// substituted by the content renderer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub initial: String,
    pub reminder: String,
    pub received: String,
    pub not_received: String,
    pub reviewed: String,
    pub closing_stale: String,
    pub burned: String,
}

impl Default for Messages {
    fn default() -> Self {
        Messages {
            initial: "Hi @$USER! In order to get this PR reviewed, please pay \
                      the processing fee: **$PAY1_AMOUNT $PAY1_SYMBOL** (or \
                      $PAY2_AMOUNT $PAY2_SYMBOL) to `$PAY1_ADDRESS` with memo \
                      `$PAY1_MEMO`.\n$QR_CODE"
                .to_string(),
            reminder: "Friendly reminder @$USER: the processing fee of \
                       **$PAY1_AMOUNT $PAY1_SYMBOL** has not been received yet. \
                       Send it to `$PAY1_ADDRESS` with memo `$PAY1_MEMO`.\n$QR_CODE"
                .to_string(),
            received: "Payment of **$PAID_AMOUNT $PAID_SYMBOL** received \
                       ([tx]($PAID_EXPLORER_LINK)), thanks! $MODERATORS"
                .to_string(),
            not_received: "Payment not yet received.".to_string(),
            reviewed: "This pull request has already been reviewed.".to_string(),
            closing_stale: "Closing this pull request: no payment was received \
                            within the allowed time."
                .to_string(),
            burned: "$PAID_AMOUNT $PAID_SYMBOL has been [burned]($BURN_EXPLORER_LINK)."
                .to_string(),
        }
    }
}

/// Label names applied by the bot.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Labels {
    /// Applied when payment is first requested.
    pub requested: String,
    /// Applied once payment is confirmed; its presence short-circuits
    /// further payment checks.
    pub paid: String,
}

impl Default for Labels {
    fn default() -> Self {
        Labels {
            requested: "Payment Requested".to_string(),
            paid: "Paid".to_string(),
        }
    }
}

/// User role settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserAccess {
    /// Recognised contributors exempt from the payment requirement.
    pub collaborators: Vec<String>,
    /// Users assigned to a PR once payment is confirmed.
    pub moderators: Vec<String>,
    /// When true, comments from users who are neither the PR author, a
    /// collaborator, nor the bot itself are deleted.
    pub delete_comments_from_external: bool,
}

impl UserAccess {
    pub fn is_collaborator(&self, login: &str) -> bool {
        self.collaborators.iter().any(|c| c == login)
    }
}

/// Time thresholds, in whole units for readable config files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Hours after creation before an unpaid PR becomes eligible for closing.
    pub max_age_close_hours: i64,
    /// Hours of inactivity before a payment reminder is posted.
    pub max_idle_remind_hours: i64,
    /// Seconds between reconciliation sweeps.
    pub reconcile_interval_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            max_age_close_hours: 24 * 14,
            max_idle_remind_hours: 24,
            reconcile_interval_secs: 3600,
        }
    }
}

impl Timeouts {
    pub fn max_age_close(&self) -> Duration {
        Duration::hours(self.max_age_close_hours)
    }

    pub fn max_idle_remind(&self) -> Duration {
        Duration::hours(self.max_idle_remind_hours)
    }

    pub fn reconcile_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reconcile_interval_secs)
    }
}

/// Hard limits on pull request contents.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of changed files accepted from non-collaborators.
    pub pr_files_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { pr_files_max: 20 }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        service_name: "merge-fee-bot".to_string(),
        http: HttpConfig::default(),
        github: GithubConfig {
            token: "test-token".to_string(),
            repo_owner: "owner".to_string(),
            repo_name: "repo".to_string(),
            webhook_secret: "secret".to_string(),
        },
        queue: QueueConfig::default(),
        payment: PaymentConfig {
            address: "bnb1tqq9llyr3dyjd559dha6z5r5etk3qfwk07m098".to_string(),
            options: vec![
                PaymentOption {
                    amount: 2000.0,
                    symbol: "TWT".to_string(),
                    token: "TWT-8C2".to_string(),
                },
                PaymentOption {
                    amount: 5.0,
                    symbol: "BNB".to_string(),
                    token: "BNB".to_string(),
                },
            ],
            tolerance_percent: 96.0,
        },
        blockchain: BlockchainConfig {
            api_url: "https://api.example.test".to_string(),
            explorer_url: "https://explorer.example.test".to_string(),
            native_symbol: "BNB".to_string(),
            signer_url: None,
        },
        messages: Messages::default(),
        labels: Labels::default(),
        users: UserAccess {
            collaborators: vec!["maintainer".to_string()],
            moderators: vec!["modone".to_string(), "modtwo".to_string()],
            delete_comments_from_external: true,
        },
        timeouts: Timeouts::default(),
        limits: Limits::default(),
    }
}
