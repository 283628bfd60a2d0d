//! Octocrab-backed [`GitHubHost`] implementation scoped to one repository.
//!
//! Uses the typed octocrab API where it covers an operation and falls back to
//! raw REST routes where it does not (reviews, labels, changed files).

use async_trait::async_trait;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};

use crate::github::error::GitHubApiError;
use crate::github::GitHubHost;
use crate::types::{
    ChangedFile, CommentId, HeadRef, PrNumber, PrReview, PrSnapshot, PrState, RepoId,
    ReviewVerdict,
};

/// A GitHub API client scoped to a specific repository.
#[derive(Clone)]
pub struct OctocrabHost {
    client: Octocrab,
    repo: RepoId,
}

impl OctocrabHost {
    pub fn new(client: Octocrab, repo: RepoId) -> Self {
        Self { client, repo }
    }

    /// Creates a client from a personal access token.
    pub fn from_token(token: impl Into<String>, repo: RepoId) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client, repo))
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    fn owner(&self) -> &str {
        &self.repo.owner
    }

    fn repo_name(&self) -> &str {
        &self.repo.repo
    }
}

impl std::fmt::Debug for OctocrabHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabHost")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

fn snapshot_from_pull(
    pull: octocrab::models::pulls::PullRequest,
) -> Result<PrSnapshot, GitHubApiError> {
    let number = PrNumber(pull.number);

    let author = pull
        .user
        .as_ref()
        .map(|user| user.login.clone())
        .ok_or_else(|| {
            GitHubApiError::permanent_without_source(format!("PR {} has no author", number))
        })?;

    let created_at = pull.created_at.ok_or_else(|| {
        GitHubApiError::permanent_without_source(format!(
            "PR {} has no creation timestamp",
            number
        ))
    })?;
    let updated_at = pull.updated_at.unwrap_or(created_at);

    let state = if pull.state == Some(octocrab::models::IssueState::Closed) {
        PrState::Closed
    } else {
        PrState::Open
    };

    let head = pull.head.repo.as_ref().and_then(|repo| {
        let owner = repo.owner.as_ref()?;
        Some(HeadRef {
            owner: owner.login.clone(),
            repo: repo.name.clone(),
            branch: pull.head.ref_field.clone(),
        })
    });

    Ok(PrSnapshot {
        number,
        author,
        created_at,
        updated_at,
        state,
        head,
    })
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    user: Option<ReviewUser>,
    state: ReviewVerdict,
}

#[derive(Debug, Deserialize)]
struct ReviewUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    name: String,
}

#[async_trait]
impl GitHubHost for OctocrabHost {
    async fn pull_request(&self, pr: PrNumber) -> Result<PrSnapshot, GitHubApiError> {
        let result = self
            .client
            .pulls(self.owner(), self.repo_name())
            .get(pr.0)
            .await;

        match result {
            Ok(pull) => snapshot_from_pull(pull),
            Err(e) => Err(GitHubApiError::from_octocrab(e)),
        }
    }

    async fn open_pull_requests(&self) -> Result<Vec<PrSnapshot>, GitHubApiError> {
        let mut page = 1u32;
        let mut all_prs = Vec::new();

        loop {
            let result = self
                .client
                .pulls(self.owner(), self.repo_name())
                .list()
                .state(octocrab::params::State::Open)
                .per_page(100)
                .page(page)
                .send()
                .await;

            match result {
                Ok(page_result) => {
                    let items = page_result.items;
                    let is_last_page = items.len() < 100;

                    for pull in items {
                        match snapshot_from_pull(pull) {
                            Ok(snapshot) => all_prs.push(snapshot),
                            Err(e) => {
                                tracing::warn!(error = %e, "skipping malformed pull request");
                            }
                        }
                    }

                    if is_last_page {
                        break;
                    }
                    page += 1;
                }
                Err(e) => return Err(GitHubApiError::from_octocrab(e)),
            }
        }

        Ok(all_prs)
    }

    async fn reviews(&self, pr: PrNumber) -> Result<Vec<PrReview>, GitHubApiError> {
        let url = format!(
            "/repos/{}/{}/pulls/{}/reviews?per_page=100",
            self.owner(),
            self.repo_name(),
            pr.0
        );

        let result: Result<Vec<ReviewResponse>, _> = self.client.get(&url, None::<&()>).await;

        match result {
            Ok(reviews) => Ok(reviews
                .into_iter()
                .filter_map(|review| {
                    Some(PrReview {
                        reviewer: review.user?.login,
                        verdict: review.state,
                    })
                })
                .collect()),
            Err(e) => Err(GitHubApiError::from_octocrab(e)),
        }
    }

    async fn labels(&self, pr: PrNumber) -> Result<Vec<String>, GitHubApiError> {
        let url = format!(
            "/repos/{}/{}/issues/{}/labels?per_page=100",
            self.owner(),
            self.repo_name(),
            pr.0
        );

        let result: Result<Vec<LabelResponse>, _> = self.client.get(&url, None::<&()>).await;

        match result {
            Ok(labels) => Ok(labels.into_iter().map(|label| label.name).collect()),
            Err(e) => Err(GitHubApiError::from_octocrab(e)),
        }
    }

    async fn changed_files(&self, pr: PrNumber) -> Result<Vec<ChangedFile>, GitHubApiError> {
        let url = format!(
            "/repos/{}/{}/pulls/{}/files?per_page=100",
            self.owner(),
            self.repo_name(),
            pr.0
        );

        let result: Result<Vec<ChangedFile>, _> = self.client.get(&url, None::<&()>).await;
        result.map_err(GitHubApiError::from_octocrab)
    }

    async fn post_comment(&self, pr: PrNumber, body: &str) -> Result<CommentId, GitHubApiError> {
        let result = self
            .client
            .issues(self.owner(), self.repo_name())
            .create_comment(pr.0, body)
            .await;

        match result {
            Ok(comment) => Ok(CommentId(comment.id.into_inner())),
            Err(e) => Err(GitHubApiError::from_octocrab(e)),
        }
    }

    async fn delete_comment(&self, comment_id: CommentId) -> Result<(), GitHubApiError> {
        self.client
            .issues(self.owner(), self.repo_name())
            .delete_comment(octocrab::models::CommentId(comment_id.0))
            .await
            .map_err(GitHubApiError::from_octocrab)
    }

    async fn approve(&self, pr: PrNumber, body: &str) -> Result<(), GitHubApiError> {
        let url = format!(
            "/repos/{}/{}/pulls/{}/reviews",
            self.owner(),
            self.repo_name(),
            pr.0
        );

        #[derive(Serialize)]
        struct ReviewRequest<'a> {
            body: &'a str,
            event: &'static str,
        }

        let result: Result<serde_json::Value, _> = self
            .client
            .post(&url, Some(&ReviewRequest { body, event: "APPROVE" }))
            .await;

        result.map(|_| ()).map_err(GitHubApiError::from_octocrab)
    }

    async fn add_label(&self, pr: PrNumber, label: &str) -> Result<(), GitHubApiError> {
        let url = format!(
            "/repos/{}/{}/issues/{}/labels",
            self.owner(),
            self.repo_name(),
            pr.0
        );

        #[derive(Serialize)]
        struct LabelRequest<'a> {
            labels: Vec<&'a str>,
        }

        let result: Result<serde_json::Value, _> = self
            .client
            .post(&url, Some(&LabelRequest { labels: vec![label] }))
            .await;

        result.map(|_| ()).map_err(GitHubApiError::from_octocrab)
    }

    async fn add_assignees(
        &self,
        pr: PrNumber,
        assignees: &[String],
    ) -> Result<(), GitHubApiError> {
        let url = format!(
            "/repos/{}/{}/issues/{}/assignees",
            self.owner(),
            self.repo_name(),
            pr.0
        );

        #[derive(Serialize)]
        struct AssigneesRequest<'a> {
            assignees: &'a [String],
        }

        let result: Result<serde_json::Value, _> = self
            .client
            .post(&url, Some(&AssigneesRequest { assignees }))
            .await;

        result.map(|_| ()).map_err(GitHubApiError::from_octocrab)
    }

    async fn close_pull_request(&self, pr: PrNumber) -> Result<(), GitHubApiError> {
        let url = format!("/repos/{}/{}/pulls/{}", self.owner(), self.repo_name(), pr.0);

        #[derive(Serialize)]
        struct StateRequest {
            state: &'static str,
        }

        let result: Result<serde_json::Value, _> = self
            .client
            .patch(&url, Some(&StateRequest { state: "closed" }))
            .await;

        result.map(|_| ()).map_err(GitHubApiError::from_octocrab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_response_deserializes_github_shape() {
        let json = r#"[
            {"user": {"login": "merge-fee-bot"}, "state": "APPROVED"},
            {"user": null, "state": "COMMENTED"},
            {"user": {"login": "alice"}, "state": "CHANGES_REQUESTED"}
        ]"#;

        let reviews: Vec<ReviewResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(reviews.len(), 3);
        assert_eq!(reviews[0].state, ReviewVerdict::Approved);
        assert!(reviews[1].user.is_none());
        assert_eq!(reviews[2].state, ReviewVerdict::ChangesRequested);
    }

    #[test]
    fn changed_file_deserializes_github_shape() {
        let json = r#"[
            {"filename": "blockchains/binance/assets/TWT-8C2/logo.png", "status": "added"},
            {"filename": "old.json", "status": "removed"}
        ]"#;

        let files: Vec<ChangedFile> = serde_json::from_str(json).unwrap();
        assert_eq!(files[0].status, crate::types::FileStatus::Added);
        assert_eq!(files[1].status, crate::types::FileStatus::Removed);
    }
}
