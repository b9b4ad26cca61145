//! The Git service contract (spec §6).
//!
//! Grounded in the existing `git::create_pr`/`git::is_pr_merged` shelling
//! functions: the CORE never shells out itself, it calls through this trait
//! so the autonomous pipeline and merge flow can be unit tested against a
//! mock.

use async_trait::async_trait;
use std::path::Path;

use crate::core::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    None,
    Approved,
    ChangesRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiStatus {
    Passing,
    Failing,
    Pending,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

#[derive(Debug, Clone)]
pub struct PrBatchState {
    pub branch: String,
    pub state: PrState,
    pub comment_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct WorktreeStatus {
    pub has_changes: bool,
}

#[derive(Debug, Clone)]
pub struct ReviewComment {
    pub author: String,
    pub body: String,
    pub path: Option<String>,
}

/// Streamed progress line from a long-running git/gh operation.
#[derive(Debug, Clone)]
pub struct ProgressLine(pub String);

/// The external git/GitHub collaborator. All mutating operations stream
/// progress and resolve to a final `Result`; query operations are plain
/// async calls.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait GitService: Send + Sync {
    async fn create_pr(
        &self,
        repo: &Path,
        worktree: &Path,
        branch: &str,
        base: &str,
        title: &str,
        issue_ref: Option<&str>,
    ) -> Result<(), CoreError>;

    async fn merge_pr(&self, repo: &Path, branch: &str, delete_branch: bool) -> Result<(), CoreError>;

    async fn push_updates(
        &self,
        repo: &Path,
        worktree: &Path,
        branch: &str,
        message: &str,
    ) -> Result<(), CoreError>;

    async fn merge_to_parent(
        &self,
        child_worktree: &Path,
        child_branch: &str,
        parent_worktree: &Path,
        parent_branch: &str,
        message: &str,
    ) -> Result<(), CoreError>;

    async fn rename_branch(&self, worktree: &Path, old: &str, new: &str) -> Result<(), CoreError>;

    async fn worktree_status(&self, worktree: &Path) -> Result<WorktreeStatus, CoreError>;

    /// Returns the worktree's full diff against its base branch, used to
    /// bucket the session into a [`crate::domain::session::SessionSize`].
    async fn diff_stats(&self, worktree: &Path, base_branch: &str) -> Result<String, CoreError>;

    async fn check_pr_review_decision(&self, repo: &Path, branch: &str) -> Result<ReviewDecision, CoreError>;

    async fn batch_pr_states_with_comments(
        &self,
        repo: &Path,
        branches: &[String],
    ) -> Result<Vec<PrBatchState>, CoreError>;

    async fn check_pr_checks(&self, repo: &Path, branch: &str) -> Result<CiStatus, CoreError>;

    async fn fetch_pr_review_comments(&self, repo: &Path, branch: &str) -> Result<Vec<ReviewComment>, CoreError>;

    async fn conflicted_files(&self, repo: &Path) -> Result<Vec<String>, CoreError>;

    /// Removes a session's isolated worktree (spec §4.8 "Bulk delete").
    async fn remove_worktree(&self, worktree: &Path) -> Result<(), CoreError>;

    async fn generate_branch_names_from_options(
        &self,
        options: &[String],
    ) -> Result<Vec<String>, CoreError>;

    async fn generate_commit_message(&self, worktree: &Path) -> Result<String, CoreError>;
}
