//! Webhook payload classifier.
//!
//! Maps a raw GitHub webhook delivery (event type header + JSON body) to one
//! of the four typed events, or `None` for everything the bot ignores.
//!
//! # Classification
//!
//! 1. The event type comes from the `X-GitHub-Event` header
//! 2. The payload is parsed according to that type
//! 3. Irrelevant types and actions return `Ok(None)` (dropped, not an error)
//! 4. Malformed payloads return `Err` with details

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{CommentId, HeadRef, PrNumber, PrSnapshot, PrState};

use super::{GithubEvent, IssueCommentEvent, PullRequestEvent, ReviewCommentEvent};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Classifies a webhook delivery.
///
/// * `Ok(Some(event))` - a delivery the bot acts on
/// * `Ok(None)` - known shape but irrelevant (wrong action, comment on a
///   plain issue, unknown event type)
/// * `Err(e)` - malformed payload
pub fn classify(event_type: &str, payload: &[u8]) -> Result<Option<GithubEvent>, ParseError> {
    match event_type {
        "pull_request" => classify_pull_request(payload),
        "issue_comment" => classify_issue_comment(payload),
        "pull_request_review_comment" => classify_review_comment(payload),
        _ => Ok(None),
    }
}

// Raw payload structures matching GitHub's webhook JSON. Optional fields are
// used liberally; required ones are validated explicitly.

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    user: RawUser,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    state: String,
    head: Option<RawRef>,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    ref_name: String,
    repo: Option<RawHeadRepo>,
}

#[derive(Debug, Deserialize)]
struct RawHeadRepo {
    name: String,
    owner: Option<RawUser>,
}

impl RawPullRequest {
    fn into_snapshot(self) -> Result<PrSnapshot, ParseError> {
        let state = match self.state.as_str() {
            "open" => PrState::Open,
            "closed" => PrState::Closed,
            other => {
                return Err(ParseError::InvalidField {
                    field: "pull_request.state",
                    value: other.to_string(),
                });
            }
        };

        let head = self.head.and_then(|head| {
            let repo = head.repo?;
            let owner = repo.owner?;
            Some(HeadRef {
                owner: owner.login,
                repo: repo.name,
                branch: head.ref_name,
            })
        });

        Ok(PrSnapshot {
            number: PrNumber(self.number),
            author: self.user.login,
            created_at: self.created_at,
            updated_at: self.updated_at.unwrap_or(self.created_at),
            state,
            head,
        })
    }
}

fn classify_pull_request(payload: &[u8]) -> Result<Option<GithubEvent>, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;

    let opened = match raw.action.as_str() {
        "opened" | "reopened" => true,
        "synchronize" => false,
        // labeled, assigned, closed, ... are not relevant
        _ => return Ok(None),
    };

    let event = PullRequestEvent {
        pr: raw.pull_request.into_snapshot()?,
    };

    Ok(Some(if opened {
        GithubEvent::PullRequestOpened(event)
    } else {
        GithubEvent::PullRequestSynchronized(event)
    }))
}

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    action: String,
    issue: RawIssue,
    comment: RawComment,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    user: RawUser,
    // Present exactly when the issue is a pull request.
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    body: Option<String>,
    user: RawUser,
}

fn classify_issue_comment(payload: &[u8]) -> Result<Option<GithubEvent>, ParseError> {
    let raw: RawIssueCommentPayload = serde_json::from_slice(payload)?;

    if raw.action != "created" {
        return Ok(None);
    }

    // Comments on plain issues are not the bot's business.
    if raw.issue.pull_request.is_none() {
        return Ok(None);
    }

    Ok(Some(GithubEvent::IssueCommentCreated(IssueCommentEvent {
        pr_number: PrNumber(raw.issue.number),
        pr_author: raw.issue.user.login,
        comment_id: CommentId(raw.comment.id),
        comment_author: raw.comment.user.login,
        body: raw.comment.body.unwrap_or_default(),
    })))
}

#[derive(Debug, Deserialize)]
struct RawReviewCommentPayload {
    action: String,
    pull_request: RawReviewCommentPr,
    comment: RawComment,
}

#[derive(Debug, Deserialize)]
struct RawReviewCommentPr {
    number: u64,
}

fn classify_review_comment(payload: &[u8]) -> Result<Option<GithubEvent>, ParseError> {
    let raw: RawReviewCommentPayload = serde_json::from_slice(payload)?;

    if raw.action != "created" {
        return Ok(None);
    }

    Ok(Some(GithubEvent::ReviewCommentCreated(ReviewCommentEvent {
        pr_number: PrNumber(raw.pull_request.number),
        comment_author: raw.comment.user.login,
    })))
}
