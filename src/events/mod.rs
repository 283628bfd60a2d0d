//! Typed GitHub events and the queue envelope that carries them.
//!
//! Webhook deliveries are classified into exactly four event types; everything
//! else is dropped at the edge. The envelope is the JSON wire shape on the
//! queue: a `type` tag plus one populated payload field.

pub mod classifier;
pub mod consumer;

pub use classifier::{classify, ParseError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CommentId, PrNumber, PrSnapshot};

/// An event the bot acts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GithubEvent {
    /// A pull request was opened or reopened.
    PullRequestOpened(PullRequestEvent),
    /// New commits were pushed to a pull request.
    PullRequestSynchronized(PullRequestEvent),
    /// A conversation-tab comment was created on a pull request.
    IssueCommentCreated(IssueCommentEvent),
    /// A review (diff) comment was created on a pull request.
    ReviewCommentCreated(ReviewCommentEvent),
}

impl GithubEvent {
    /// The pull request number this event concerns.
    pub fn pr_number(&self) -> PrNumber {
        match self {
            GithubEvent::PullRequestOpened(e) | GithubEvent::PullRequestSynchronized(e) => {
                e.pr.number
            }
            GithubEvent::IssueCommentCreated(e) => e.pr_number,
            GithubEvent::ReviewCommentCreated(e) => e.pr_number,
        }
    }
}

/// Payload for PR opened/synchronized events: the PR as the webhook saw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub pr: PrSnapshot,
}

/// Payload for issue-comment events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCommentEvent {
    pub pr_number: PrNumber,
    /// Login of the PR author, used by the comment-deletion policy.
    pub pr_author: String,
    pub comment_id: CommentId,
    /// Login of the comment author.
    pub comment_author: String,
    /// Comment body; carries `/check` and `/checkall` triggers.
    pub body: String,
}

/// Payload for review-comment events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCommentEvent {
    pub pr_number: PrNumber,
    pub comment_author: String,
}

/// The `type` tag on the queue envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "pull_request_opened")]
    PullRequestOpened,
    #[serde(rename = "pull_request_synchronize")]
    PullRequestSynchronized,
    #[serde(rename = "issue_comment_created")]
    IssueCommentCreated,
    #[serde(rename = "pull_request_review_comment_opened")]
    ReviewCommentCreated,
}

/// JSON wire shape on the queue: a tag plus exactly one payload field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pull_request: Option<PullRequestEvent>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub issue_comment: Option<IssueCommentEvent>,

    #[serde(
        rename = "pull_request_review_comment",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub review_comment: Option<ReviewCommentEvent>,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed event envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope tagged {kind:?} is missing its payload")]
    MissingPayload { kind: EventKind },
}

impl GithubEvent {
    pub fn into_envelope(self) -> EventEnvelope {
        let mut envelope = EventEnvelope {
            kind: EventKind::PullRequestOpened,
            pull_request: None,
            issue_comment: None,
            review_comment: None,
        };

        match self {
            GithubEvent::PullRequestOpened(e) => {
                envelope.kind = EventKind::PullRequestOpened;
                envelope.pull_request = Some(e);
            }
            GithubEvent::PullRequestSynchronized(e) => {
                envelope.kind = EventKind::PullRequestSynchronized;
                envelope.pull_request = Some(e);
            }
            GithubEvent::IssueCommentCreated(e) => {
                envelope.kind = EventKind::IssueCommentCreated;
                envelope.issue_comment = Some(e);
            }
            GithubEvent::ReviewCommentCreated(e) => {
                envelope.kind = EventKind::ReviewCommentCreated;
                envelope.review_comment = Some(e);
            }
        }

        envelope
    }

    /// Serializes this event into envelope JSON for publishing.
    pub fn encode(self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(&self.into_envelope())?)
    }

    /// Parses envelope JSON back into a typed event.
    pub fn decode(bytes: &[u8]) -> Result<GithubEvent, EnvelopeError> {
        let envelope: EventEnvelope = serde_json::from_slice(bytes)?;
        GithubEvent::try_from(envelope)
    }
}

impl TryFrom<EventEnvelope> for GithubEvent {
    type Error = EnvelopeError;

    fn try_from(envelope: EventEnvelope) -> Result<GithubEvent, EnvelopeError> {
        let kind = envelope.kind;
        let missing = || EnvelopeError::MissingPayload { kind };

        match kind {
            EventKind::PullRequestOpened => envelope
                .pull_request
                .map(GithubEvent::PullRequestOpened)
                .ok_or_else(missing),
            EventKind::PullRequestSynchronized => envelope
                .pull_request
                .map(GithubEvent::PullRequestSynchronized)
                .ok_or_else(missing),
            EventKind::IssueCommentCreated => envelope
                .issue_comment
                .map(GithubEvent::IssueCommentCreated)
                .ok_or_else(missing),
            EventKind::ReviewCommentCreated => envelope
                .review_comment
                .map(GithubEvent::ReviewCommentCreated)
                .ok_or_else(missing),
        }
    }
}
