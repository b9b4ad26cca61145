//! Broadcast & Bulk Operations (spec §4.8).
//!
//! Parallelism is confined to the pure read/create step — concurrency-capped
//! session creation, worktree-status probing, worktree removal — behind
//! [`super::BULK_OP_CONCURRENCY`]; every mutation to the registry or
//! [`super::StateStore`] still happens one event at a time inside the loop.
//! Selecting which of the new sessions becomes the UI's active session is
//! left to the caller (spec §1 "OUT OF SCOPE: ... modal dialog state");
//! this module only guarantees every new session has its first turn sent.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use crate::collab::runner::ContentBlock;
use crate::domain::agent::AgentModel;
use crate::domain::session::{now_unix, Session, SessionSize, SessionStats, Status, SESSION_DATA_DIR};

use super::event::{AppEvent, Command};
use super::state::MergeType;
use super::App;

impl App {
    /// `CreateBroadcastSessions` (spec §4.8 "createBroadcastSessions"): mints
    /// one `broadcast_group_id` shared by every session in this batch and
    /// creates a session per repo under a bounded concurrency limit, each
    /// success appended under a mutex. The registry insert and per-session
    /// `Send` happen once every creation completes, in
    /// `handle_broadcast_sessions_created`.
    pub(crate) fn handle_create_broadcast_sessions(
        &self,
        repos: Vec<PathBuf>,
        prompt: String,
        name: Option<String>,
    ) -> Vec<Command> {
        if repos.is_empty() {
            return Vec::new();
        }

        let group_id = uuid::Uuid::new_v4().to_string();
        let config = self.config.clone();

        vec![Box::pin(async move {
            let semaphore = Arc::new(Semaphore::new(super::BULK_OP_CONCURRENCY));
            let sessions = Arc::new(Mutex::new(Vec::with_capacity(repos.len())));
            let mut handles = Vec::with_capacity(repos.len());

            for repo_path in repos {
                let semaphore = semaphore.clone();
                let sessions = sessions.clone();
                let config = config.clone();
                let group_id = group_id.clone();
                let prompt = prompt.clone();
                let name = name.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.expect("broadcast semaphore closed early");

                    let containerized = config
                        .repo_settings(&repo_path)
                        .await
                        .map(|settings| settings.use_containers)
                        .unwrap_or(false);

                    let id = uuid::Uuid::new_v4().to_string();
                    let session = Session {
                        id: id.clone(),
                        repo_path: repo_path.clone(),
                        work_tree: repo_path.join(SESSION_DATA_DIR).join(&id),
                        branch: format!("conduit/{id}"),
                        base_branch: "main".to_string(),
                        name,
                        created_at: now_unix(),
                        updated_at: now_unix(),
                        started: false,
                        autonomous: false,
                        is_supervisor: false,
                        supervisor_id: None,
                        parent_id: None,
                        workspace_id: None,
                        broadcast_group_id: Some(group_id),
                        containerized,
                        issue_ref: None,
                        merged: false,
                        merged_to_parent: false,
                        pr_created: false,
                        pr_merged: false,
                        pr_closed: false,
                        pr_comment_count: 0,
                        pr_comments_addressed_count: 0,
                        model: AgentModel::default(),
                        size: SessionSize::default(),
                        stats: SessionStats::default(),
                        status: Status::New,
                        summary: None,
                        prompt,
                    };

                    sessions.lock().expect("broadcast session mutex poisoned").push(session);
                }));
            }

            for handle in handles {
                if let Err(err) = handle.await {
                    tracing::warn!(%err, "broadcast session creation task panicked");
                }
            }

            let sessions = Arc::try_unwrap(sessions)
                .map(|mutex| mutex.into_inner().expect("broadcast session mutex poisoned"))
                .unwrap_or_default();

            AppEvent::BroadcastSessionsCreated { group_id, sessions }
        })]
    }

    /// `BroadcastSessionsCreated`: the single-writer half of
    /// `createBroadcastSessions` — registers every new session, persists
    /// them, and dispatches the shared prompt to each (spec §4.8).
    pub(crate) async fn handle_broadcast_sessions_created(&self, group_id: String, sessions: Vec<Session>) -> Vec<Command> {
        if sessions.is_empty() {
            return Vec::new();
        }

        for session in &sessions {
            self.registry.insert_session_snapshot(session.clone());
        }

        self.notifications.warn(&format!("Broadcasting to {} repo(s)", sessions.len()));
        tracing::info!(group_id, count = sessions.len(), "created broadcast session batch");

        let config = self.config.clone();
        let sessions_for_save = sessions.clone();
        let mut commands: Vec<Command> = vec![Box::pin(async move {
            for session in &sessions_for_save {
                if let Err(err) = config.save_session(session).await {
                    tracing::warn!(session_id = %session.id, %err, "failed to persist broadcast session");
                }
            }
            AppEvent::Noop
        })];

        for session in &sessions {
            let prompt = session.prompt.clone();
            commands.extend(self.send_turn(session, vec![ContentBlock::Text(prompt)]).await);
        }

        commands
    }

    /// `CreatePRsForSessions` (spec §4.8 "createPRsForSessions"): filters
    /// in-memory (skip already-created, merged, or already merging), probes
    /// worktree status in parallel under the bulk-op concurrency cap, then
    /// starts the PR-creation merge flow for each session with changes to
    /// land, one at a time.
    pub(crate) fn handle_create_prs_for_sessions(&self, session_ids: Vec<String>) -> Vec<Command> {
        let candidates: Vec<Session> = session_ids
            .iter()
            .filter_map(|id| self.registry.session(id))
            .filter(|session| !session.pr_created && !session.merged)
            .filter(|session| self.state.with(&session.id, |s| s.merge_type == MergeType::None).unwrap_or(true))
            .collect();

        if candidates.is_empty() {
            return Vec::new();
        }

        let git = self.git.clone();
        let inbox = self.inbox_tx_clone();

        vec![Box::pin(async move {
            let semaphore = Arc::new(Semaphore::new(super::BULK_OP_CONCURRENCY));
            let mut handles = Vec::with_capacity(candidates.len());

            for session in candidates {
                let semaphore = semaphore.clone();
                let git = git.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.expect("bulk-op semaphore closed early");
                    let has_changes =
                        git.worktree_status(&session.work_tree).await.map(|status| status.has_changes).unwrap_or(true);
                    (session, has_changes)
                }));
            }

            let mut eligible = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.await {
                    Ok((session, true)) => eligible.push(session),
                    Ok((_, false)) => {}
                    Err(err) => tracing::warn!(%err, "worktree status check task panicked"),
                }
            }

            for session in eligible {
                if inbox.send(AppEvent::StartMerge { session_id: session.id, merge_type: MergeType::Pr }).is_err() {
                    tracing::warn!("event loop closed mid bulk PR creation");
                    break;
                }
            }

            AppEvent::Noop
        })]
    }

    /// `BulkDeleteSessions` (spec §4.8 "Bulk delete"): removes every
    /// session's worktree in parallel under the bulk-op concurrency cap,
    /// then re-enters the loop once per session so the existing
    /// single-writer `DeleteSession` flow performs state/registry/config
    /// cleanup sequentially.
    pub(crate) fn handle_bulk_delete_sessions(&self, session_ids: Vec<String>) -> Vec<Command> {
        let sessions: Vec<Session> = session_ids.iter().filter_map(|id| self.registry.session(id)).collect();
        if sessions.is_empty() {
            return Vec::new();
        }

        let git = self.git.clone();
        let inbox = self.inbox_tx_clone();

        vec![Box::pin(async move {
            let semaphore = Arc::new(Semaphore::new(super::BULK_OP_CONCURRENCY));
            let mut handles = Vec::with_capacity(sessions.len());

            for session in &sessions {
                let semaphore = semaphore.clone();
                let git = git.clone();
                let work_tree = session.work_tree.clone();
                let session_id = session.id.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.expect("bulk-op semaphore closed early");
                    if let Err(err) = git.remove_worktree(&work_tree).await {
                        tracing::warn!(session_id, %err, "failed to remove worktree during bulk delete");
                    }
                }));
            }

            for handle in handles {
                if let Err(err) = handle.await {
                    tracing::warn!(%err, "worktree removal task panicked");
                }
            }

            for session in &sessions {
                if inbox.send(AppEvent::DeleteSession { session_id: session.id.clone() }).is_err() {
                    tracing::warn!("event loop closed mid bulk delete");
                    break;
                }
            }

            AppEvent::Noop
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_group_id_is_distinct_per_batch() {
        let first = uuid::Uuid::new_v4().to_string();
        let second = uuid::Uuid::new_v4().to_string();
        assert_ne!(first, second);
    }
}
