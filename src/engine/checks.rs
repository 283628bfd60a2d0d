//! File and token checks for opened/synchronized pull requests.
//!
//! Produces the summary comment: changed-file limits, forbidden paths,
//! deleted-file warnings, and per-token validation for any token whose logo
//! is added under `blockchains/<chain>/assets/<id>/logo.png`. Token metadata
//! validation is delegated to a [`TokenValidator`].

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::types::{ChangedFile, FileStatus, HeadRef};

/// A token added or modified by the PR, discovered from its logo path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredToken {
    /// Chain directory name, e.g. "binance".
    pub chain: String,
    /// On-chain token identifier, e.g. "TWT-8C2".
    pub id: String,
}

/// Validates one token's metadata. Findings are human-readable problem
/// descriptions; an empty list means the token passed.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, head: &HeadRef, token: &DiscoveredToken) -> Vec<String>;
}

/// Extracts the token behind `blockchains/<chain>/assets/<id>/logo.png`.
pub fn token_from_logo_path(path: &str) -> Option<DiscoveredToken> {
    let mut parts = path.split('/');
    if parts.next()? != "blockchains" {
        return None;
    }
    let chain = parts.next()?;
    if parts.next()? != "assets" {
        return None;
    }
    let id = parts.next()?;
    if parts.next()? != "logo.png" || parts.next().is_some() {
        return None;
    }

    Some(DiscoveredToken {
        chain: chain.to_string(),
        id: id.to_string(),
    })
}

/// Checks that a changed path is one the repository accepts in PRs.
/// Returns a problem description for paths outside the allowed layout.
pub fn check_file_allowed(path: &str) -> Option<String> {
    let parts: Vec<&str> = path.split('/').collect();

    let allowed = match parts.as_slice() {
        ["blockchains", _chain, "assets", _id, file] => {
            matches!(*file, "logo.png" | "info.json")
        }
        ["blockchains", _chain, "info", file] => matches!(*file, "logo.png" | "info.json"),
        ["blockchains", _chain, "validators", ..] => true,
        ["dapps", file] => file.ends_with(".png") || file.ends_with(".json"),
        _ => false,
    };

    if allowed {
        None
    } else {
        Some(format!("File `{}` is not allowed in a PR: Please revert it.", path))
    }
}

/// Discovers every token the changed files touch.
pub fn discover_tokens(files: &[ChangedFile]) -> Vec<DiscoveredToken> {
    let mut tokens = Vec::new();
    for file in files {
        if let Some(token) = token_from_logo_path(&file.filename) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }
    tokens
}

/// Base file checks: count limit, forbidden paths, deletions.
/// Returns problem lines, or an empty string when everything passes.
fn check_files(files: &[ChangedFile], limit: usize, author_is_collaborator: bool) -> String {
    if files.is_empty() {
        return "No changed files found.".to_string();
    }

    if files.len() > limit && !author_is_collaborator {
        return format!("Too many changed files: {} (max {}).", files.len(), limit);
    }

    let mut msg = String::new();

    for file in files {
        if let Some(problem) = check_file_allowed(&file.filename) {
            msg.push_str(&problem);
            msg.push('\n');
        }

        if file.status == FileStatus::Removed {
            msg.push_str(&format!(
                "File `{}` is being deleted. Files should not be deleted in a PR. \
                 (Deprecated tokens should be deactivated only.)\n",
                file.filename
            ));
        }
    }

    msg
}

const NO_TOKENS_TEXT: &str = "No token files found. If you try to add/modify a token, \
check the name and location of your files! Logo file must be named exactly 'logo.png'. \
If you are not adding a token, ignore this message.";

/// Builds the full summary comment posted on opened/synchronized PRs.
pub async fn file_check_summary(
    files: &[ChangedFile],
    head: Option<&HeadRef>,
    author_is_collaborator: bool,
    limit: usize,
    validator: &dyn TokenValidator,
) -> String {
    let mut text = "### PR Summary\n".to_string();

    let file_problems = check_files(files, limit, author_is_collaborator);
    if file_problems.is_empty() {
        text.push_str(&format!("Files OK: {}\n", files.len()));
    } else {
        text.push_str(&file_problems);
    }

    let tokens = discover_tokens(files);
    if tokens.is_empty() {
        text.push('\n');
        text.push_str(NO_TOKENS_TEXT);
        return text;
    }

    if tokens.len() == 1 {
        text.push_str(&format!("Token in PR: {} {}\n", tokens[0].chain, tokens[0].id));
    } else {
        text.push_str(&format!("Tokens in PR: ({})\n", tokens.len()));
        for token in &tokens {
            text.push_str(&format!("- {} {}\n", token.chain, token.id));
        }
    }

    let Some(head) = head else {
        text.push_str("\nToken checks skipped: head branch unavailable.\n");
        return text;
    };

    for token in &tokens {
        debug!(chain = %token.chain, id = %token.id, "validating token");

        if tokens.len() > 1 {
            text.push_str(&format!("\n-----\n**Token {} - {}**:\n", token.chain, token.id));
        }

        let findings = validator.validate(head, token).await;
        if findings.is_empty() {
            text.push_str("Token checks passed.\n");
        } else {
            for finding in findings {
                text.push_str(&format!("❌ {}\n", finding));
            }
        }
    }

    text
}

/// Token metadata as kept in the repository's `info.json` files.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    name: Option<String>,
    symbol: Option<String>,
    #[serde(rename = "type")]
    token_type: Option<String>,
    decimals: Option<u32>,
    description: Option<String>,
    status: Option<String>,
}

/// Validator that fetches `info.json` from the PR's head branch and checks
/// the required fields.
pub struct HttpTokenValidator {
    http: reqwest::Client,
}

impl HttpTokenValidator {
    pub fn new() -> HttpTokenValidator {
        HttpTokenValidator {
            http: reqwest::Client::new(),
        }
    }

    fn info_url(head: &HeadRef, token: &DiscoveredToken) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/{}/blockchains/{}/assets/{}/info.json",
            head.owner, head.repo, head.branch, token.chain, token.id
        )
    }
}

impl Default for HttpTokenValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn validate(&self, head: &HeadRef, token: &DiscoveredToken) -> Vec<String> {
        let url = Self::info_url(head, token);

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return vec![format!("Failed to get info.json content: {} ({})", e, url)],
        };

        if !response.status().is_success() {
            return vec![format!(
                "Failed to get info.json content: HTTP {} ({})",
                response.status(),
                url
            )];
        }

        let info: TokenInfo = match response.json().await {
            Ok(info) => info,
            Err(e) => return vec![format!("info.json is not valid JSON: {}", e)],
        };

        let mut findings = Vec::new();

        if info.name.as_deref().unwrap_or("").is_empty() {
            findings.push("info.json is missing the 'name' field".to_string());
        }
        if info.symbol.as_deref().unwrap_or("").is_empty() {
            findings.push("info.json is missing the 'symbol' field".to_string());
        }
        if info.token_type.as_deref().unwrap_or("").is_empty() {
            findings.push("info.json is missing the 'type' field".to_string());
        }
        if info.decimals.is_none() {
            findings.push("info.json is missing the 'decimals' field".to_string());
        }
        if info.description.as_deref().unwrap_or("").is_empty() {
            findings.push("info.json is missing the 'description' field".to_string());
        }
        match info.status.as_deref() {
            Some("active") | Some("abandoned") => {}
            Some(other) => findings.push(format!("info.json has unknown status '{}'", other)),
            None => findings.push("info.json is missing the 'status' field".to_string()),
        }

        findings
    }
}
