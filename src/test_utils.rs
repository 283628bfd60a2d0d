//! Recording fakes shared by engine and server tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::blockchain::{Ledger, LedgerError};
use crate::engine::{DiscoveredToken, TokenValidator};
use crate::github::{GitHubApiError, GitHubHost};
use crate::payment::LedgerTransaction;
use crate::types::{ChangedFile, CommentId, HeadRef, PrNumber, PrReview, PrSnapshot, TxHash};

/// One side-effecting call made against the [`MockHost`], in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostAction {
    Comment { pr: PrNumber, body: String },
    DeleteComment(CommentId),
    Approve { pr: PrNumber, body: String },
    AddLabel { pr: PrNumber, label: String },
    Assign { pr: PrNumber, assignees: Vec<String> },
    Close(PrNumber),
}

/// In-memory [`GitHubHost`] that serves canned state and records writes.
///
/// Writes are recorded but deliberately not reflected back into the canned
/// state, which models the read-after-write lag of the real API.
#[derive(Default)]
pub(crate) struct MockHost {
    pull_request: Mutex<Option<PrSnapshot>>,
    open_pull_requests: Mutex<Vec<PrSnapshot>>,
    reviews: Mutex<Vec<PrReview>>,
    labels: Mutex<Vec<String>>,
    files: Mutex<Vec<ChangedFile>>,
    actions: Mutex<Vec<HostAction>>,
    next_comment_id: Mutex<u64>,
}

impl MockHost {
    pub(crate) fn set_pull_request(&self, pr: PrSnapshot) {
        *self.pull_request.lock().unwrap() = Some(pr);
    }

    pub(crate) fn set_open_pull_requests(&self, prs: Vec<PrSnapshot>) {
        *self.open_pull_requests.lock().unwrap() = prs;
    }

    pub(crate) fn set_reviews(&self, reviews: Vec<PrReview>) {
        *self.reviews.lock().unwrap() = reviews;
    }

    pub(crate) fn set_labels(&self, labels: Vec<String>) {
        *self.labels.lock().unwrap() = labels;
    }

    #[allow(dead_code)]
    pub(crate) fn set_files(&self, files: Vec<ChangedFile>) {
        *self.files.lock().unwrap() = files;
    }

    pub(crate) fn actions(&self) -> Vec<HostAction> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: HostAction) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl GitHubHost for MockHost {
    async fn pull_request(&self, pr: PrNumber) -> Result<PrSnapshot, GitHubApiError> {
        self.pull_request
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GitHubApiError::permanent_without_source(format!("no such PR {pr}")))
    }

    async fn open_pull_requests(&self) -> Result<Vec<PrSnapshot>, GitHubApiError> {
        Ok(self.open_pull_requests.lock().unwrap().clone())
    }

    async fn reviews(&self, _pr: PrNumber) -> Result<Vec<PrReview>, GitHubApiError> {
        Ok(self.reviews.lock().unwrap().clone())
    }

    async fn labels(&self, _pr: PrNumber) -> Result<Vec<String>, GitHubApiError> {
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn changed_files(&self, _pr: PrNumber) -> Result<Vec<ChangedFile>, GitHubApiError> {
        Ok(self.files.lock().unwrap().clone())
    }

    async fn post_comment(&self, pr: PrNumber, body: &str) -> Result<CommentId, GitHubApiError> {
        self.record(HostAction::Comment {
            pr,
            body: body.to_string(),
        });
        let mut next = self.next_comment_id.lock().unwrap();
        *next += 1;
        Ok(CommentId(*next))
    }

    async fn delete_comment(&self, comment_id: CommentId) -> Result<(), GitHubApiError> {
        self.record(HostAction::DeleteComment(comment_id));
        Ok(())
    }

    async fn approve(&self, pr: PrNumber, body: &str) -> Result<(), GitHubApiError> {
        self.record(HostAction::Approve {
            pr,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn add_label(&self, pr: PrNumber, label: &str) -> Result<(), GitHubApiError> {
        self.record(HostAction::AddLabel {
            pr,
            label: label.to_string(),
        });
        Ok(())
    }

    async fn add_assignees(
        &self,
        pr: PrNumber,
        assignees: &[String],
    ) -> Result<(), GitHubApiError> {
        self.record(HostAction::Assign {
            pr,
            assignees: assignees.to_vec(),
        });
        Ok(())
    }

    async fn close_pull_request(&self, pr: PrNumber) -> Result<(), GitHubApiError> {
        self.record(HostAction::Close(pr));
        Ok(())
    }
}

/// In-memory [`Ledger`] with a fixed transaction list.
#[derive(Default)]
pub(crate) struct MockLedger {
    transactions: Mutex<Vec<LedgerTransaction>>,
    burn_result: Mutex<Option<TxHash>>,
    fail_burn: Mutex<bool>,
    burn_calls: Mutex<Vec<(String, f64)>>,
}

impl MockLedger {
    pub(crate) fn with_transactions(transactions: Vec<LedgerTransaction>) -> MockLedger {
        MockLedger {
            transactions: Mutex::new(transactions),
            ..MockLedger::default()
        }
    }

    pub(crate) fn set_burn_result(&self, hash: Option<TxHash>) {
        *self.burn_result.lock().unwrap() = hash;
    }

    pub(crate) fn fail_burns(&self) {
        *self.fail_burn.lock().unwrap() = true;
    }

    pub(crate) fn burn_calls(&self) -> Vec<(String, f64)> {
        self.burn_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn transactions(&self, _address: &str) -> Result<Vec<LedgerTransaction>, LedgerError> {
        Ok(self.transactions.lock().unwrap().clone())
    }

    async fn burn(&self, token: &str, amount: f64) -> Result<Option<TxHash>, LedgerError> {
        self.burn_calls
            .lock()
            .unwrap()
            .push((token.to_string(), amount));
        if *self.fail_burn.lock().unwrap() {
            return Err(LedgerError::Signer {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "burn rejected".to_string(),
            });
        }
        Ok(self.burn_result.lock().unwrap().clone())
    }
}

/// Token validator that reports no findings.
pub(crate) struct PassingValidator;

#[async_trait]
impl TokenValidator for PassingValidator {
    async fn validate(&self, _head: &HeadRef, _token: &DiscoveredToken) -> Vec<String> {
        Vec::new()
    }
}
