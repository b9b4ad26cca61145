//! Concrete [`GitService`] backed by the `git`/`gh` CLIs.
//!
//! Thin translation layer: every method defers to a free function in
//! [`super::git`] and maps its `Result<_, String>` into [`CoreError`].

use std::path::Path;

use async_trait::async_trait;

use crate::collab::git::{
    CiStatus, GitService, PrBatchState, PrState, ReviewComment, ReviewDecision, WorktreeStatus,
};
use crate::core::error::CoreError;

use super::git as git_cli;

/// [`GitService`] implementation shelling out to the locally installed `git`
/// and `gh` binaries.
#[derive(Clone, Copy, Default)]
pub struct RealGitService;

fn transient(session_id: &str, message: String) -> CoreError {
    CoreError::transient(session_id.to_string(), std::io::Error::other(message))
}

#[async_trait]
impl GitService for RealGitService {
    async fn create_pr(
        &self,
        repo: &Path,
        worktree: &Path,
        branch: &str,
        base: &str,
        title: &str,
        issue_ref: Option<&str>,
    ) -> Result<(), CoreError> {
        let _ = worktree;
        let body = issue_ref.map_or_else(String::new, |reference| format!("Closes {reference}"));
        git_cli::create_pr(repo.to_path_buf(), branch.to_string(), base.to_string(), title.to_string(), body)
            .await
            .map_err(|err| transient(branch, err))
    }

    async fn merge_pr(&self, repo: &Path, branch: &str, delete_branch: bool) -> Result<(), CoreError> {
        git_cli::merge_pr(repo.to_path_buf(), branch.to_string(), delete_branch)
            .await
            .map_err(|err| transient(branch, err))
    }

    async fn push_updates(
        &self,
        repo: &Path,
        worktree: &Path,
        branch: &str,
        message: &str,
    ) -> Result<(), CoreError> {
        let _ = repo;
        git_cli::commit_all(worktree.to_path_buf(), message.to_string(), true)
            .await
            .map_err(|err| transient(branch, err))
    }

    async fn merge_to_parent(
        &self,
        child_worktree: &Path,
        child_branch: &str,
        parent_worktree: &Path,
        parent_branch: &str,
        message: &str,
    ) -> Result<(), CoreError> {
        let _ = child_worktree;
        git_cli::squash_merge(
            parent_worktree.to_path_buf(),
            child_branch.to_string(),
            parent_branch.to_string(),
            message.to_string(),
        )
        .await
        .map(|_outcome| ())
        .map_err(|err| transient(child_branch, err))
    }

    async fn rename_branch(&self, worktree: &Path, old: &str, new: &str) -> Result<(), CoreError> {
        git_cli::rename_branch(worktree.to_path_buf(), old.to_string(), new.to_string())
            .await
            .map_err(|err| transient(old, err))
    }

    async fn worktree_status(&self, worktree: &Path) -> Result<WorktreeStatus, CoreError> {
        let diff = git_cli::diff(worktree.to_path_buf(), "HEAD".to_string())
            .await
            .map_err(|err| transient("worktree_status", err))?;
        Ok(WorktreeStatus { has_changes: !diff.trim().is_empty() })
    }

    async fn diff_stats(&self, worktree: &Path, base_branch: &str) -> Result<String, CoreError> {
        git_cli::diff(worktree.to_path_buf(), base_branch.to_string())
            .await
            .map_err(|err| transient("diff_stats", err))
    }

    async fn check_pr_review_decision(&self, repo: &Path, branch: &str) -> Result<ReviewDecision, CoreError> {
        let decision = git_cli::pr_review_decision(repo.to_path_buf(), branch.to_string())
            .await
            .map_err(|err| transient(branch, err))?;
        Ok(match decision.as_str() {
            "APPROVED" => ReviewDecision::Approved,
            "CHANGES_REQUESTED" => ReviewDecision::ChangesRequested,
            _ => ReviewDecision::None,
        })
    }

    async fn batch_pr_states_with_comments(
        &self,
        repo: &Path,
        branches: &[String],
    ) -> Result<Vec<PrBatchState>, CoreError> {
        let mut states = Vec::with_capacity(branches.len());
        for branch in branches {
            let merged = git_cli::is_pr_merged(repo.to_path_buf(), branch.clone())
                .await
                .map_err(|err| transient(branch, err))?;
            let comments = git_cli::pr_review_comments(repo.to_path_buf(), branch.clone())
                .await
                .map_err(|err| transient(branch, err))?;
            states.push(PrBatchState {
                branch: branch.clone(),
                state: if merged { PrState::Merged } else { PrState::Open },
                #[allow(clippy::cast_possible_truncation)]
                comment_count: comments.len() as u32,
            });
        }
        Ok(states)
    }

    async fn check_pr_checks(&self, repo: &Path, branch: &str) -> Result<CiStatus, CoreError> {
        let status = git_cli::pr_checks_status(repo.to_path_buf(), branch.to_string())
            .await
            .map_err(|err| transient(branch, err))?;
        Ok(match status.as_str() {
            "success" => CiStatus::Passing,
            "failure" => CiStatus::Failing,
            "pending" => CiStatus::Pending,
            _ => CiStatus::None,
        })
    }

    async fn fetch_pr_review_comments(&self, repo: &Path, branch: &str) -> Result<Vec<ReviewComment>, CoreError> {
        let comments = git_cli::pr_review_comments(repo.to_path_buf(), branch.to_string())
            .await
            .map_err(|err| transient(branch, err))?;
        Ok(comments
            .into_iter()
            .map(|(author, body)| ReviewComment { author, body, path: None })
            .collect())
    }

    async fn conflicted_files(&self, repo: &Path) -> Result<Vec<String>, CoreError> {
        git_cli::list_conflicted_files(repo.to_path_buf()).await.map_err(|err| transient("conflicted_files", err))
    }

    async fn remove_worktree(&self, worktree: &Path) -> Result<(), CoreError> {
        git_cli::remove_worktree(worktree.to_path_buf()).await.map_err(|err| transient("remove_worktree", err))
    }

    async fn generate_branch_names_from_options(&self, options: &[String]) -> Result<Vec<String>, CoreError> {
        Ok(options
            .iter()
            .enumerate()
            .map(|(index, _)| format!("conduit/option-{}", index + 1))
            .collect())
    }

    async fn generate_commit_message(&self, worktree: &Path) -> Result<String, CoreError> {
        let diff = git_cli::diff(worktree.to_path_buf(), "HEAD".to_string())
            .await
            .map_err(|err| transient("generate_commit_message", err))?;
        if diff.trim().is_empty() {
            return Ok("Update".to_string());
        }
        let changed_files = diff.lines().filter(|line| line.starts_with("diff --git")).count();
        Ok(format!("Update {changed_files} file(s)"))
    }
}
