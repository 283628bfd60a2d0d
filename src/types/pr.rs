//! Pull request snapshot types.
//!
//! The engine never stores PR state: every evaluation reconstructs the
//! authoritative picture from GitHub (labels, reviews, timestamps). These types
//! carry that snapshot across the collaborator boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::PrNumber;

/// Open/closed state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Closed,
}

/// The head side of a pull request, used to build raw-content URLs for
/// token file checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadRef {
    /// Owner of the fork the PR originates from.
    pub owner: String,
    /// Repository name of the fork.
    pub repo: String,
    /// Branch name on the fork.
    pub branch: String,
}

/// A point-in-time view of a pull request as GitHub reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrSnapshot {
    /// The PR number.
    pub number: PrNumber,

    /// Login of the PR author.
    pub author: String,

    /// When the PR was created. Anchors the invoice payment window.
    pub created_at: DateTime<Utc>,

    /// When the PR was last updated (pushes, comments, edits).
    pub updated_at: DateTime<Utc>,

    /// Open or closed.
    pub state: PrState,

    /// Head branch information, when available.
    pub head: Option<HeadRef>,
}

impl PrSnapshot {
    pub fn is_open(&self) -> bool {
        self.state == PrState::Open
    }
}

/// The verdict carried by a pull request review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    #[serde(other)]
    Pending,
}

/// A review on a pull request, as listed from GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrReview {
    /// Login of the reviewer.
    pub reviewer: String,
    /// The review state.
    pub verdict: ReviewVerdict,
}

/// Status of a changed file within a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    #[serde(other)]
    Other,
}

/// A file touched by a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Path of the file relative to the repository root.
    pub filename: String,
    /// What happened to the file.
    pub status: FileStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn review_verdict_json_format() {
        // GitHub reports review states in SCREAMING_SNAKE_CASE.
        assert_eq!(
            serde_json::to_string(&ReviewVerdict::Approved).unwrap(),
            "\"APPROVED\""
        );
        assert_eq!(
            serde_json::to_string(&ReviewVerdict::ChangesRequested).unwrap(),
            "\"CHANGES_REQUESTED\""
        );
    }

    #[test]
    fn file_status_tolerates_unknown_values() {
        let status: FileStatus = serde_json::from_str("\"copied\"").unwrap();
        assert_eq!(status, FileStatus::Other);
    }

    #[test]
    fn snapshot_is_open() {
        let snap = PrSnapshot {
            number: PrNumber(7),
            author: "octocat".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            state: PrState::Open,
            head: None,
        };
        assert!(snap.is_open());

        let closed = PrSnapshot {
            state: PrState::Closed,
            ..snap
        };
        assert!(!closed.is_open());
    }
}
