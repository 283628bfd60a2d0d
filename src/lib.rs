//! Merge Fee Bot - a GitHub bot enforcing a pay-to-merge policy.
//!
//! External pull requests are invoiced with an on-chain payment request; the
//! bot watches the ledger, approves PRs once payment lands, reminds idle
//! authors, and closes PRs that never pay.

pub mod blockchain;
pub mod config;
pub mod content;
pub mod engine;
pub mod events;
pub mod github;
pub mod metrics;
pub mod payment;
pub mod queue;
pub mod reconcile;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
