//! GitHub collaborator.
//!
//! [`GitHubHost`] is the seam between the lifecycle engine and the GitHub API:
//! the engine only ever talks to this trait, so tests can substitute a
//! recording fake. [`OctocrabHost`] is the production implementation.

pub mod client;
pub mod error;

pub use client::OctocrabHost;
pub use error::{GitHubApiError, GitHubErrorKind};

use async_trait::async_trait;

use crate::types::{ChangedFile, CommentId, PrNumber, PrReview, PrSnapshot};

/// Operations the lifecycle engine needs from GitHub, scoped to one repository.
#[async_trait]
pub trait GitHubHost: Send + Sync {
    /// Fetches the current snapshot of a pull request.
    async fn pull_request(&self, pr: PrNumber) -> Result<PrSnapshot, GitHubApiError>;

    /// Lists all currently open pull requests.
    async fn open_pull_requests(&self) -> Result<Vec<PrSnapshot>, GitHubApiError>;

    /// Lists the reviews on a pull request.
    async fn reviews(&self, pr: PrNumber) -> Result<Vec<PrReview>, GitHubApiError>;

    /// Lists the label names currently on a pull request.
    async fn labels(&self, pr: PrNumber) -> Result<Vec<String>, GitHubApiError>;

    /// Lists the files changed by a pull request.
    async fn changed_files(&self, pr: PrNumber) -> Result<Vec<ChangedFile>, GitHubApiError>;

    /// Posts an issue comment on a pull request.
    async fn post_comment(&self, pr: PrNumber, body: &str) -> Result<CommentId, GitHubApiError>;

    /// Deletes an issue comment.
    async fn delete_comment(&self, comment_id: CommentId) -> Result<(), GitHubApiError>;

    /// Creates an approving review on a pull request.
    async fn approve(&self, pr: PrNumber, body: &str) -> Result<(), GitHubApiError>;

    /// Adds a label to a pull request. Safe to repeat.
    async fn add_label(&self, pr: PrNumber, label: &str) -> Result<(), GitHubApiError>;

    /// Assigns users to a pull request.
    async fn add_assignees(&self, pr: PrNumber, assignees: &[String])
        -> Result<(), GitHubApiError>;

    /// Closes a pull request.
    async fn close_pull_request(&self, pr: PrNumber) -> Result<(), GitHubApiError>;
}
