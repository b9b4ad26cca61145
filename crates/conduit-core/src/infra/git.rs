use std::path::PathBuf;
use std::process::Command;

use tokio::task::spawn_blocking;

/// Outcome of attempting a squash merge operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SquashMergeOutcome {
    /// Squash merge staged changes and created a commit.
    Committed,
    /// Squash merge staged nothing because changes already exist in target.
    AlreadyPresentInTarget,
}

/// Removes a git worktree at the specified path.
///
/// Uses --force to remove even with uncommitted changes.
/// Finds the main repository by reading the worktree's .git file.
///
/// # Arguments
/// * `worktree_path` - Path to the worktree to remove
///
/// # Returns
/// Ok(()) on success, Err(msg) with detailed error message on failure
///
/// # Errors
/// Returns an error if invoking `git` fails or the worktree remove command
/// exits with a non-zero status.
pub async fn remove_worktree(worktree_path: PathBuf) -> Result<(), String> {
    spawn_blocking(move || {
        // Read the .git file in the worktree to find the main repo
        let git_file = worktree_path.join(".git");
        let repo_root = if git_file.is_file() {
            let git_dir = resolve_git_dir(&worktree_path)
                .ok_or_else(|| "Invalid .git file format in worktree".to_string())?;

            // Extract main repo path: /path/to/main/.git/worktrees/name -> /path/to/main
            git_dir
                .parent() // Remove worktree name
                .and_then(|path| path.parent()) // Remove "worktrees"
                .and_then(|path| path.parent()) // Remove ".git"
                .ok_or_else(|| "Invalid gitdir path in .git file".to_string())?
                .to_path_buf()
        } else {
            // Not a worktree or doesn't exist - try parent directory
            worktree_path
                .parent()
                .ok_or_else(|| "Worktree path has no parent".to_string())?
                .to_path_buf()
        };

        let output = Command::new("git")
            .args(["worktree", "remove", "--force"])
            .arg(&worktree_path)
            .current_dir(repo_root)
            .output()
            .map_err(|e| format!("Failed to execute git: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("Git worktree command failed: {}", stderr.trim()));
        }

        Ok(())
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Performs a squash merge from a source branch to a target branch.
///
/// This function:
/// 1. Verifies the repository is already on the target branch
/// 2. Performs `git merge --squash` from the source branch
/// 3. Commits the squashed changes (skipping pre-commit hooks)
///
/// The caller is responsible for ensuring `repo_path` is already checked out
/// on `target_branch`. Switching branches here would disrupt the user's
/// working directory.
///
/// # Arguments
/// * `repo_path` - Path to the git repository root, already on `target_branch`
/// * `source_branch` - Name of the branch to merge from (e.g.,
///   `conduit/abc123`)
/// * `target_branch` - Name of the branch to merge into (e.g., `main`)
/// * `commit_message` - Message for the squash commit
///
/// # Returns
/// A [`SquashMergeOutcome`] describing whether a squash commit was created.
///
/// # Errors
/// Returns an error if the repository is on the wrong branch, the merge
/// fails, or the commit fails.
pub async fn squash_merge(
    repo_path: PathBuf,
    source_branch: String,
    target_branch: String,
    commit_message: String,
) -> Result<SquashMergeOutcome, String> {
    spawn_blocking(move || {
        // Verify that repo_path is already on the target branch. Switching
        // branches here would disrupt the user's working directory.
        let current_branch = detect_current_branch(&repo_path)
            .ok_or_else(|| format!("Failed to detect current branch in {}", repo_path.display()))?;
        if current_branch != target_branch {
            return Err(format!(
                "Cannot merge: repository is on '{current_branch}' but expected
                 '{target_branch}'. Switch to '{target_branch}' first."
            ));
        }

        // Perform squash merge
        let output = Command::new("git")
            .args(["merge", "--squash", &source_branch])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute git: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "Failed to squash merge {source_branch}: {}",
                stderr.trim()
            ));
        }

        // Check whether the squash merge staged any changes before committing.
        // `git diff --cached --quiet` exits 0 when the index matches HEAD (nothing
        // staged) and 1 when there are staged changes.
        let cached_diff = Command::new("git")
            .args(["diff", "--cached", "--quiet"])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute git: {e}"))?;

        if cached_diff.status.success() {
            return Ok(SquashMergeOutcome::AlreadyPresentInTarget);
        }

        if cached_diff.status.code() != Some(1) {
            let detail = command_output_detail(&cached_diff.stdout, &cached_diff.stderr);

            return Err(format!(
                "Failed to inspect staged squash merge diff: {detail}"
            ));
        }

        // Commit the squashed changes. Skip pre-commit hooks (`--no-verify`)
        // because the session code was already validated by those same hooks
        // during auto-commit in the session worktree. Re-running them here is
        // redundant and causes failures when hooks modify files in the main repo.
        let output = Command::new("git")
            .args(["commit", "--no-verify", "-m", &commit_message])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute git: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("Failed to commit squash merge: {}", stderr.trim()));
        }

        Ok(SquashMergeOutcome::Committed)
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Renames a branch in the given worktree.
///
/// # Arguments
/// * `worktree_path` - Path to the git repository or worktree
/// * `old_name` - Current branch name
/// * `new_name` - New branch name
///
/// # Returns
/// Ok(()) on success, Err(msg) with detailed error message on failure.
///
/// # Errors
/// Returns an error if `git branch -m` fails (e.g. `new_name` already
/// exists).
pub async fn rename_branch(
    worktree_path: PathBuf,
    old_name: String,
    new_name: String,
) -> Result<(), String> {
    spawn_blocking(move || {
        let output = Command::new("git")
            .args(["branch", "-m", &old_name, &new_name])
            .current_dir(&worktree_path)
            .output()
            .map_err(|e| format!("Failed to execute git: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("Git branch rename failed: {}", stderr.trim()));
        }

        Ok(())
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Stages all changes and commits them with the given message.
///
/// # Arguments
/// * `repo_path` - Path to the git repository or worktree
/// * `commit_message` - Message for the commit
/// * `no_verify` - When `true`, skips pre-commit and commit-msg hooks
///   (`--no-verify`)
///
/// # Returns
/// Ok(()) on success, Err(msg) with detailed error message on failure
///
/// # Errors
/// Returns an error if staging or committing changes fails.
pub async fn commit_all(
    repo_path: PathBuf,
    commit_message: String,
    no_verify: bool,
) -> Result<(), String> {
    const HOOK_RETRY_ATTEMPTS: usize = 5;

    spawn_blocking(move || {
        stage_all_sync(&repo_path)?;

        for _ in 0..HOOK_RETRY_ATTEMPTS {
            let output = run_commit_command(&repo_path, &commit_message, no_verify)?;

            if output.status.success() {
                return Ok(());
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // Check if there's nothing to commit
            if stdout.contains("nothing to commit") || stderr.contains("nothing to commit") {
                return Err("Nothing to commit: no changes detected".to_string());
            }

            if is_hook_modified_error(&stdout, &stderr) {
                stage_all_sync(&repo_path)?;

                continue;
            }

            return Err(format!("Failed to commit: {}", stderr.trim()));
        }

        Err(format!(
            "Failed to commit: commit hooks kept modifying files after
             {HOOK_RETRY_ATTEMPTS} attempts"
        ))
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Returns conflicted file paths for the current index.
///
/// # Arguments
/// * `repo_path` - Path to the git repository or worktree
///
/// # Returns
/// A list of relative file paths with unresolved conflicts.
///
/// # Errors
/// Returns an error if invoking `git diff --name-only --diff-filter=U` fails.
pub async fn list_conflicted_files(repo_path: PathBuf) -> Result<Vec<String>, String> {
    spawn_blocking(move || {
        let output = Command::new("git")
            .args(["diff", "--name-only", "--diff-filter=U"])
            .current_dir(&repo_path)
            .output()
            .map_err(|error| format!("Failed to execute git: {error}"))?;

        if !output.status.success() {
            let detail = command_output_detail(&output.stdout, &output.stderr);

            return Err(format!("Failed to read conflicted files: {detail}."));
        }

        let files = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect();

        Ok(files)
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Returns the output of `git diff` for the given repository path, showing
/// all changes (committed and uncommitted) relative to the base branch.
///
/// Uses `git add --intent-to-add` to mark untracked files in the index, then
/// finds the merge-base between `HEAD` and `base_branch` to diff against the
/// fork point. This ensures only the session's changes are shown, excluding
/// any new commits pushed to the base branch after the session was created.
/// Finally resets the index to restore the original state.
///
/// # Arguments
/// * `repo_path` - Path to the git repository or worktree
/// * `base_branch` - Branch to diff against (e.g., `main`)
///
/// # Returns
/// The diff output as a string, or an error message on failure
///
/// # Errors
/// Returns an error if preparing the index, generating the diff, or restoring
/// index state fails.
pub async fn diff(repo_path: PathBuf, base_branch: String) -> Result<String, String> {
    spawn_blocking(move || {
        let intent_to_add = Command::new("git")
            .args(["add", "-A", "--intent-to-add"])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute git: {e}"))?;

        if !intent_to_add.status.success() {
            let stderr = String::from_utf8_lossy(&intent_to_add.stderr);

            return Err(format!("Git add --intent-to-add failed: {}", stderr.trim()));
        }

        let merge_base_output = Command::new("git")
            .args(["merge-base", "HEAD", &base_branch])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute git: {e}"))?;

        let diff_target = if merge_base_output.status.success() {
            String::from_utf8_lossy(&merge_base_output.stdout)
                .trim()
                .to_string()
        } else {
            base_branch
        };

        let diff_output = Command::new("git")
            .args(["diff", &diff_target])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute git: {e}"))?;

        let reset = Command::new("git")
            .arg("reset")
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute git: {e}"))?;

        if !reset.status.success() {
            let stderr = String::from_utf8_lossy(&reset.stderr);

            return Err(format!("Git reset failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&diff_output.stdout).into_owned())
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Opens a draft pull request via the `gh` CLI.
///
/// # Errors
/// Returns an error if `gh` is not installed, not authenticated, or the `gh
/// pr create` invocation exits with a non-zero status.
pub async fn create_pr(
    repo_path: PathBuf,
    branch: String,
    base: String,
    title: String,
    body: String,
) -> Result<(), String> {
    spawn_blocking(move || {
        let output = Command::new("gh")
            .args(["pr", "create", "--draft", "--base", &base, "--head", &branch, "--title", &title, "--body", &body])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute gh pr create: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("gh pr create failed: {}", stderr.trim()));
        }

        Ok(())
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Merges a pull request for `branch` via the `gh` CLI, squashing commits.
///
/// # Errors
/// Returns an error if the `gh pr merge` invocation exits with a non-zero
/// status.
pub async fn merge_pr(repo_path: PathBuf, branch: String, delete_branch: bool) -> Result<(), String> {
    spawn_blocking(move || {
        let mut args = vec!["pr", "merge", branch.as_str(), "--squash"];
        if delete_branch {
            args.push("--delete-branch");
        } else {
            args.push("--delete-branch=false");
        }

        let output = Command::new("gh")
            .args(&args)
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute gh pr merge: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("gh pr merge failed: {}", stderr.trim()));
        }

        Ok(())
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Returns whether the pull request for `branch` has already been merged.
///
/// # Errors
/// Returns an error if the `gh pr view` invocation exits with a non-zero
/// status (for example, no PR exists for this branch).
pub async fn is_pr_merged(repo_path: PathBuf, branch: String) -> Result<bool, String> {
    spawn_blocking(move || {
        let output = Command::new("gh")
            .args(["pr", "view", &branch, "--json", "mergedAt", "--jq", ".mergedAt != null"])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute gh pr view: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("gh pr view failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim() == "true")
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Returns the review decision `gh` has recorded for the pull request on
/// `branch`: `"APPROVED"`, `"CHANGES_REQUESTED"`, or empty when no review has
/// been submitted.
///
/// # Errors
/// Returns an error if the `gh pr view` invocation exits with a non-zero
/// status.
pub async fn pr_review_decision(repo_path: PathBuf, branch: String) -> Result<String, String> {
    spawn_blocking(move || {
        let output = Command::new("gh")
            .args(["pr", "view", &branch, "--json", "reviewDecision", "--jq", ".reviewDecision"])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute gh pr view: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("gh pr view failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Returns the aggregate CI check status (`"success"`, `"failure"`,
/// `"pending"`, or empty) for the pull request on `branch`.
///
/// # Errors
/// Returns an error if the `gh pr checks` invocation fails for a reason other
/// than "no checks reported yet".
pub async fn pr_checks_status(repo_path: PathBuf, branch: String) -> Result<String, String> {
    spawn_blocking(move || {
        let output = Command::new("gh")
            .args(["pr", "checks", &branch, "--json", "state", "--jq", "if any(.[]; .state == \"FAILURE\") then \"failure\" elif any(.[]; .state == \"PENDING\") then \"pending\" elif length == 0 then \"\" else \"success\" end"])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute gh pr checks: {e}"))?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

/// Fetches review comments left on the pull request for `branch`.
///
/// Returns `(author, body)` pairs in submission order.
///
/// # Errors
/// Returns an error if the `gh api` invocation exits with a non-zero status.
pub async fn pr_review_comments(repo_path: PathBuf, branch: String) -> Result<Vec<(String, String)>, String> {
    spawn_blocking(move || {
        let number_output = Command::new("gh")
            .args(["pr", "view", &branch, "--json", "number", "--jq", ".number"])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute gh pr view: {e}"))?;

        if !number_output.status.success() {
            let stderr = String::from_utf8_lossy(&number_output.stderr);
            return Err(format!("gh pr view failed: {}", stderr.trim()));
        }
        let number = String::from_utf8_lossy(&number_output.stdout).trim().to_string();

        let comments_output = Command::new("gh")
            .args(["api", &format!("repos/{{owner}}/{{repo}}/pulls/{number}/comments"), "--jq", ".[] | .user.login + \"\\u0000\" + .body"])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| format!("Failed to execute gh api: {e}"))?;

        if !comments_output.status.success() {
            let stderr = String::from_utf8_lossy(&comments_output.stderr);
            return Err(format!("gh api pulls comments failed: {}", stderr.trim()));
        }

        let comments = String::from_utf8_lossy(&comments_output.stdout)
            .lines()
            .filter_map(|line| line.split_once('\u{0}'))
            .map(|(author, body)| (author.to_string(), body.to_string()))
            .collect();

        Ok(comments)
    })
    .await
    .map_err(|e| format!("Join error: {e}"))?
}

fn detect_current_branch(repo_path: &std::path::Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(repo_path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if branch.is_empty() {
        None
    } else {
        Some(branch)
    }
}

fn resolve_git_dir(repo_dir: &std::path::Path) -> Option<PathBuf> {
    let dot_git = repo_dir.join(".git");
    if dot_git.is_dir() {
        return Some(dot_git);
    }

    if dot_git.is_file() {
        let content = std::fs::read_to_string(&dot_git).ok()?;
        let git_dir_line = content.lines().find(|line| line.starts_with("gitdir:"))?;
        let git_dir_path = git_dir_line.trim_start_matches("gitdir:").trim();
        let git_dir = PathBuf::from(git_dir_path);

        if git_dir.is_absolute() {
            return Some(git_dir);
        }

        return Some(repo_dir.join(git_dir));
    }

    None
}

fn stage_all_sync(repo_path: &std::path::Path) -> Result<(), String> {
    let output = Command::new("git")
        .args(["add", "-A"])
        .current_dir(repo_path)
        .output()
        .map_err(|error| format!("Failed to execute git: {error}"))?;

    if !output.status.success() {
        let detail = command_output_detail(&output.stdout, &output.stderr);

        return Err(format!("Failed to stage changes: {detail}"));
    }

    Ok(())
}

fn run_commit_command(
    repo_path: &std::path::Path,
    commit_message: &str,
    no_verify: bool,
) -> Result<std::process::Output, String> {
    let mut args = vec!["commit", "-m", commit_message];
    if no_verify {
        args.push("--no-verify");
    }

    Command::new("git")
        .args(&args)
        .current_dir(repo_path)
        .output()
        .map_err(|error| format!("Failed to execute git: {error}"))
}

fn is_hook_modified_error(stdout: &str, stderr: &str) -> bool {
    let combined = format!(
        "{stdout}
{stderr}"
    )
    .to_ascii_lowercase();

    combined.contains("files were modified by this hook")
}

/// Extracts the best human-readable error detail from command output.
fn command_output_detail(stdout: &[u8], stderr: &[u8]) -> String {
    let stderr_text = String::from_utf8_lossy(stderr).trim().to_string();
    if !stderr_text.is_empty() {
        return stderr_text;
    }

    let stdout_text = String::from_utf8_lossy(stdout).trim().to_string();
    if !stdout_text.is_empty() {
        return stdout_text;
    }

    "Unknown git error".to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::process::Command;

    use tempfile::tempdir;

    use super::*;

    fn run_git_command(repo_path: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_path)
            .output()
            .expect("failed to run git command");

        assert!(
            output.status.success(),
            "git command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn setup_test_git_repo(repo_path: &Path) {
        run_git_command(repo_path, &["init", "-b", "main"]);
        run_git_command(repo_path, &["config", "user.name", "Test User"]);
        run_git_command(repo_path, &["config", "user.email", "test@example.com"]);

        fs::write(repo_path.join("README.md"), "test repo").expect("failed to write file");
        run_git_command(repo_path, &["add", "README.md"]);
        run_git_command(repo_path, &["commit", "-m", "Initial commit"]);
    }

    #[tokio::test]
    async fn test_squash_merge_returns_committed_when_changes_exist() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");
        setup_test_git_repo(dir.path());
        run_git_command(dir.path(), &["checkout", "-b", "feature-branch"]);
        fs::write(dir.path().join("feature.txt"), "feature content").expect("failed to write file");
        run_git_command(dir.path(), &["add", "feature.txt"]);
        run_git_command(dir.path(), &["commit", "-m", "Add feature"]);
        run_git_command(dir.path(), &["checkout", "main"]);

        // Act
        let result = squash_merge(
            dir.path().to_path_buf(),
            "feature-branch".to_string(),
            "main".to_string(),
            "Squash merge feature".to_string(),
        )
        .await;

        // Assert
        assert_eq!(result, Ok(SquashMergeOutcome::Committed));
    }

    #[tokio::test]
    async fn test_squash_merge_returns_already_present_when_changes_exist_in_target() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");
        setup_test_git_repo(dir.path());
        run_git_command(dir.path(), &["checkout", "-b", "session-branch"]);
        fs::write(dir.path().join("session.txt"), "session change").expect("failed to write file");
        run_git_command(dir.path(), &["add", "session.txt"]);
        run_git_command(dir.path(), &["commit", "-m", "Session change"]);
        run_git_command(dir.path(), &["checkout", "main"]);
        fs::write(dir.path().join("session.txt"), "session change").expect("failed to write file");
        run_git_command(dir.path(), &["add", "session.txt"]);
        run_git_command(dir.path(), &["commit", "-m", "Apply same change on main"]);

        // Act
        let result = squash_merge(
            dir.path().to_path_buf(),
            "session-branch".to_string(),
            "main".to_string(),
            "Merge session".to_string(),
        )
        .await;

        // Assert
        assert_eq!(result, Ok(SquashMergeOutcome::AlreadyPresentInTarget));
    }

    #[tokio::test]
    async fn test_rename_branch_renames_current_branch() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");
        setup_test_git_repo(dir.path());
        run_git_command(dir.path(), &["checkout", "-b", "old-name"]);

        // Act
        let result = rename_branch(dir.path().to_path_buf(), "old-name".to_string(), "new-name".to_string()).await;

        // Assert
        assert_eq!(result, Ok(()));
        let output = Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(dir.path())
            .output()
            .expect("failed to run git rev-parse");
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "new-name");
    }

    #[tokio::test]
    async fn test_rename_branch_fails_when_target_already_exists() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");
        setup_test_git_repo(dir.path());
        run_git_command(dir.path(), &["branch", "taken"]);
        run_git_command(dir.path(), &["checkout", "-b", "old-name"]);

        // Act
        let result = rename_branch(dir.path().to_path_buf(), "old-name".to_string(), "taken".to_string()).await;

        // Assert
        assert!(result.is_err());
    }
}
