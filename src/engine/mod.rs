//! PR lifecycle engine.
//!
//! The engine is a stateless state machine: every invocation reconstructs the
//! pull request's situation from GitHub (labels, reviews, timestamps) and the
//! ledger, then emits at most one action. Because nothing is persisted,
//! re-delivering an event re-derives the same decision, which keeps most
//! actions safe under at-least-once delivery. The one exception, the approval
//! path, is covered by [`ApprovalGuard`].

pub mod checks;
pub mod guard;

pub use checks::{DiscoveredToken, HttpTokenValidator, TokenValidator};
pub use guard::ApprovalGuard;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::blockchain::{explorer_tx_link, Ledger, LedgerError};
use crate::config::Config;
use crate::content::{substitute, TemplateValues};
use crate::events::consumer::EventProcessor;
use crate::events::{GithubEvent, IssueCommentEvent, PullRequestEvent, ReviewCommentEvent};
use crate::github::{GitHubApiError, GitHubHost};
use crate::metrics::Metrics;
use crate::payment::{self, Invoice, PaymentStatus, AMOUNT_PRECISION};
use crate::types::{PrNumber, PrSnapshot, ReviewVerdict};

/// Idle grace period before an old PR may be closed. Guards against closing a
/// PR that is being actively edited even though it is past the age limit.
fn close_grace() -> Duration {
    Duration::minutes(30)
}

/// Comment trigger for re-checking the current PR.
const CHECK_TRIGGER: &str = "/check";

/// Comment trigger for a full sweep over all open PRs.
const CHECK_ALL_TRIGGER: &str = "/checkall";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    GitHub(#[from] GitHubApiError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The action the engine took for one pull request evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NoAction,
    /// Payment was requested (label + invoice comment).
    RequestPayment,
    /// Payment detected; PR approved.
    Approve,
    /// Reminder comment posted.
    Remind,
    /// PR closed for age.
    CloseStale,
    /// Already approved or labelled paid; nothing owed.
    Reviewed,
}

/// Outcome of one evaluation: the decision plus whether the PR still expects
/// a payment (feeds the awaiting-payment gauge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    pub payment_expected: bool,
}

impl Evaluation {
    fn settled(decision: Decision) -> Evaluation {
        Evaluation {
            decision,
            payment_expected: false,
        }
    }

    fn pending(decision: Decision) -> Evaluation {
        Evaluation {
            decision,
            payment_expected: true,
        }
    }
}

/// The lifecycle engine with its collaborators.
pub struct Engine {
    config: Arc<Config>,
    github: Arc<dyn GitHubHost>,
    ledger: Arc<dyn Ledger>,
    validator: Arc<dyn TokenValidator>,
    metrics: Arc<Metrics>,
    approval_guard: ApprovalGuard,
    sweep_lock: tokio::sync::Mutex<()>,
}

impl Engine {
    pub fn new(
        config: Arc<Config>,
        github: Arc<dyn GitHubHost>,
        ledger: Arc<dyn Ledger>,
        validator: Arc<dyn TokenValidator>,
        metrics: Arc<Metrics>,
    ) -> Engine {
        Engine {
            config,
            github,
            ledger,
            validator,
            metrics,
            approval_guard: ApprovalGuard::new(),
            sweep_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn is_collaborator(&self, login: &str) -> bool {
        self.config.users.is_collaborator(login)
    }

    fn is_bot(&self, login: &str) -> bool {
        login.starts_with(&self.config.service_name)
    }

    /// Whether the bot has already left an approving review. Listing errors
    /// degrade to `false` so a flaky read re-enters the payment check rather
    /// than skipping it.
    async fn has_bot_approval(&self, pr: PrNumber) -> bool {
        match self.github.reviews(pr).await {
            Ok(reviews) => reviews.iter().any(|review| {
                self.is_bot(&review.reviewer) && review.verdict == ReviewVerdict::Approved
            }),
            Err(e) => {
                warn!(pr = %pr, error = %e, "failed to list reviews");
                false
            }
        }
    }

    async fn has_paid_label(&self, pr: PrNumber) -> bool {
        match self.github.labels(pr).await {
            Ok(labels) => labels.iter().any(|label| label == &self.config.labels.paid),
            Err(e) => {
                warn!(pr = %pr, error = %e, "failed to list labels");
                false
            }
        }
    }

    fn invoice_for(&self, pr: &PrSnapshot) -> Invoice {
        Invoice::derive(&self.config.payment, pr.number, pr.created_at)
    }

    /// Core state machine for one pull request.
    ///
    /// `debug` corresponds to a `/check` trigger: unpaid and already-settled
    /// states get an explicit status comment instead of silence.
    pub async fn evaluate(&self, pr: &PrSnapshot, debug: bool) -> Result<Evaluation, EngineError> {
        if self.is_collaborator(&pr.author) {
            return Ok(Evaluation::settled(Decision::NoAction));
        }

        if !pr.is_open() {
            return Ok(Evaluation::settled(Decision::NoAction));
        }

        let expecting_payment =
            !(self.has_bot_approval(pr.number).await || self.has_paid_label(pr.number).await);

        if !expecting_payment {
            if debug {
                let text = substitute(&self.config.messages.reviewed, &TemplateValues::default());
                self.github.post_comment(pr.number, &text).await?;
            }
            return Ok(Evaluation::settled(Decision::Reviewed));
        }

        let invoice = self.invoice_for(pr);
        let status = payment::check_invoice(self.ledger.as_ref(), &invoice).await?;

        if status.paid {
            self.approve(pr, &status).await?;
            return Ok(Evaluation::settled(Decision::Approve));
        }

        let now = Utc::now();
        let pr_age = now - pr.created_at;
        let idle_age = now - pr.updated_at;

        debug!(
            pr = %pr.number,
            pr_age_hours = pr_age.num_hours(),
            idle_hours = idle_age.num_hours(),
            "pull request still unpaid"
        );

        if pr_age >= self.config.timeouts.max_age_close() && idle_age > close_grace() {
            self.close_stale(pr).await?;
            return Ok(Evaluation::pending(Decision::CloseStale));
        }

        if debug {
            let text = substitute(
                &self.config.messages.not_received,
                &TemplateValues::default(),
            );
            self.github.post_comment(pr.number, &text).await?;
            return Ok(Evaluation::pending(Decision::NoAction));
        }

        if idle_age >= self.config.timeouts.max_idle_remind() {
            self.remind(pr).await?;
            return Ok(Evaluation::pending(Decision::Remind));
        }

        Ok(Evaluation::pending(Decision::NoAction))
    }

    /// Approval path: review, paid label, moderators, burn. Guarded against
    /// duplicate execution per (PR, amount).
    async fn approve(&self, pr: &PrSnapshot, status: &PaymentStatus) -> Result<(), EngineError> {
        let amount_units = (status.amount * AMOUNT_PRECISION) as i64;

        if !self.approval_guard.admit(pr.number, amount_units) {
            info!(pr = %pr.number, amount = status.amount, "approval already handled, skipping");
            return Ok(());
        }

        info!(
            pr = %pr.number,
            amount = status.amount,
            token = %status.token,
            "payment detected, approving"
        );

        let paid_symbol = status.token.split('-').next().unwrap_or(&status.token);
        let paid_link = status
            .transactions
            .first()
            .map(|tx| explorer_tx_link(&self.config.blockchain.explorer_url, &tx.hash))
            .unwrap_or_default();

        let text = substitute(
            &self.config.messages.received,
            &TemplateValues {
                paid_amount: status.amount,
                paid_symbol,
                paid_explorer_link: &paid_link,
                moderators: &self.config.users.moderators,
                ..TemplateValues::default()
            },
        );

        self.github.approve(pr.number, &text).await?;
        self.github
            .add_label(pr.number, &self.config.labels.paid)
            .await?;
        self.github
            .add_assignees(pr.number, &self.config.users.moderators)
            .await?;

        self.metrics.payments_detected.inc();

        // Burn failure must not unwind the approval that already happened.
        match self.ledger.burn(&status.token, status.amount).await {
            Ok(Some(hash)) => {
                let burn_link = explorer_tx_link(&self.config.blockchain.explorer_url, &hash);
                let text = substitute(
                    &self.config.messages.burned,
                    &TemplateValues {
                        paid_amount: status.amount,
                        paid_symbol,
                        burn_explorer_link: &burn_link,
                        ..TemplateValues::default()
                    },
                );
                self.github.post_comment(pr.number, &text).await?;
            }
            Ok(None) => {}
            Err(e) => {
                error!(pr = %pr.number, token = %status.token, error = %e, "token burn failed");
            }
        }

        Ok(())
    }

    async fn close_stale(&self, pr: &PrSnapshot) -> Result<(), EngineError> {
        info!(pr = %pr.number, "closing stale pull request");

        let text = substitute(
            &self.config.messages.closing_stale,
            &TemplateValues::default(),
        );
        self.github.post_comment(pr.number, &text).await?;
        self.github.close_pull_request(pr.number).await?;

        Ok(())
    }

    async fn remind(&self, pr: &PrSnapshot) -> Result<(), EngineError> {
        let invoice = self.invoice_for(pr);
        let text = substitute(
            &self.config.messages.reminder,
            &TemplateValues {
                invoice: Some(&invoice),
                user: &pr.author,
                ..TemplateValues::default()
            },
        );
        self.github.post_comment(pr.number, &text).await?;

        Ok(())
    }

    /// Posts the file/token check summary comment.
    async fn post_file_check(&self, pr: &PrSnapshot) -> Result<(), EngineError> {
        let files = self.github.changed_files(pr.number).await?;

        let summary = checks::file_check_summary(
            &files,
            pr.head.as_ref(),
            self.is_collaborator(&pr.author),
            self.config.limits.pr_files_max,
            self.validator.as_ref(),
        )
        .await;

        self.github.post_comment(pr.number, &summary).await?;

        Ok(())
    }

    pub async fn handle_pr_opened(&self, event: &PullRequestEvent) -> Result<Decision, EngineError> {
        self.metrics.pull_requests_created.inc();

        let pr = &event.pr;
        debug!(pr = %pr.number, author = %pr.author, "pull request opened");

        self.post_file_check(pr).await?;
        self.evaluate(pr, false).await?;

        if self.is_collaborator(&pr.author) {
            return Ok(Decision::NoAction);
        }

        self.github
            .add_label(pr.number, &self.config.labels.requested)
            .await?;

        let invoice = self.invoice_for(pr);
        let text = substitute(
            &self.config.messages.initial,
            &TemplateValues {
                invoice: Some(&invoice),
                user: &pr.author,
                ..TemplateValues::default()
            },
        );
        self.github.post_comment(pr.number, &text).await?;

        Ok(Decision::RequestPayment)
    }

    pub async fn handle_pr_synchronized(
        &self,
        event: &PullRequestEvent,
    ) -> Result<Decision, EngineError> {
        let pr = &event.pr;
        debug!(pr = %pr.number, "pull request synchronized");

        self.post_file_check(pr).await?;
        Ok(self.evaluate(pr, false).await?.decision)
    }

    pub async fn handle_issue_comment(
        &self,
        event: &IssueCommentEvent,
    ) -> Result<Decision, EngineError> {
        if self.is_collaborator(&event.pr_author) {
            return Ok(Decision::NoAction);
        }

        debug!(
            pr = %event.pr_number,
            author = %event.comment_author,
            "issue comment created"
        );

        let pr = self.github.pull_request(event.pr_number).await?;

        let debug_check = event.body.contains(CHECK_TRIGGER);

        if event.body.contains(CHECK_ALL_TRIGGER) {
            self.sweep(Some(&pr)).await?;
            return Ok(Decision::NoAction);
        }

        self.delete_comment_if_needed(event).await?;

        Ok(self.evaluate(&pr, debug_check).await?.decision)
    }

    pub async fn handle_review_comment(
        &self,
        event: &ReviewCommentEvent,
    ) -> Result<Decision, EngineError> {
        debug!(
            pr = %event.pr_number,
            author = %event.comment_author,
            "review comment created"
        );

        let pr = self.github.pull_request(event.pr_number).await?;
        Ok(self.evaluate(&pr, false).await?.decision)
    }

    /// Deletes a comment from outside the circle of PR author, collaborators,
    /// and the bot itself, when the policy is enabled.
    async fn delete_comment_if_needed(&self, event: &IssueCommentEvent) -> Result<(), EngineError> {
        if !self.config.users.delete_comments_from_external {
            return Ok(());
        }

        let author = &event.comment_author;
        let tolerated =
            self.is_bot(author) || author == &event.pr_author || self.is_collaborator(author);
        if tolerated {
            return Ok(());
        }

        info!(
            pr = %event.pr_number,
            author = %author,
            comment = %event.comment_id,
            "deleting external comment"
        );
        self.github.delete_comment(event.comment_id).await?;

        Ok(())
    }

    /// Evaluates every open pull request and refreshes the gauges.
    ///
    /// `trigger` is the PR whose event caused the sweep; GitHub's listing can
    /// lag behind the webhook, so it is appended if the listing missed it.
    /// Returns `false` when a sweep was already in progress.
    pub async fn sweep(&self, trigger: Option<&PrSnapshot>) -> Result<bool, EngineError> {
        let Ok(_running) = self.sweep_lock.try_lock() else {
            info!("sweep already in progress, skipping");
            return Ok(false);
        };

        let mut prs = self.github.open_pull_requests().await?;

        if let Some(trigger) = trigger {
            if !prs.iter().any(|p| p.number == trigger.number) {
                prs.push(trigger.clone());
            }
        }

        self.metrics.open_pull_requests.set(prs.len() as i64);

        let mut awaiting = 0i64;
        for pr in &prs {
            let evaluation = self.evaluate(pr, false).await?;
            if evaluation.payment_expected {
                awaiting += 1;
            }
        }

        self.metrics.pull_requests_awaiting_payment.set(awaiting);

        info!(open = prs.len(), awaiting, "sweep finished");

        Ok(true)
    }
}

#[async_trait]
impl EventProcessor for Engine {
    async fn process(&self, event: GithubEvent) -> Result<(), EngineError> {
        match event {
            GithubEvent::PullRequestOpened(e) => {
                self.handle_pr_opened(&e).await?;
            }
            GithubEvent::PullRequestSynchronized(e) => {
                self.handle_pr_synchronized(&e).await?;
            }
            GithubEvent::IssueCommentCreated(e) => {
                self.handle_issue_comment(&e).await?;
            }
            GithubEvent::ReviewCommentCreated(e) => {
                self.handle_review_comment(&e).await?;
            }
        }
        Ok(())
    }
}
