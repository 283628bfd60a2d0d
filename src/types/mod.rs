//! Core domain types shared across modules.

mod ids;
mod pr;

pub use ids::{CommentId, PrNumber, RepoId, TxHash};
pub use pr::{ChangedFile, FileStatus, HeadRef, PrReview, PrSnapshot, PrState, ReviewVerdict};
