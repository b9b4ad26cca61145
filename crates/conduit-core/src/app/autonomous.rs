//! Autonomous Pipeline (spec §4.7, §4.11): per-turn limits, the four-part
//! pipeline-completion handler, supervisor/child host tools, and the
//! priority-ordered auto-merge poll FSM.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::collab::git::{CiStatus, PrState, ReviewComment, ReviewDecision};
use crate::collab::runner::{
    ContentBlock, CreateChildRequest, CreatePrRequest, GetReviewCommentsRequest, HostToolResponse,
    ListChildrenRequest, MergeChildRequest, PushBranchRequest,
};
use crate::domain::session::{now_unix, Session, SessionSize, SessionStats, Status, SESSION_DATA_DIR};

use super::event::{ready, AppEvent, Command};
use super::registry;
use super::state::MergeType;
use super::App;

fn review_comments_digest(comments: &[ReviewComment]) -> String {
    comments
        .iter()
        .map(|comment| format!("- {} ({}): {}", comment.author, comment.path.clone().unwrap_or_default(), comment.body))
        .collect::<Vec<_>>()
        .join("\n")
}

impl App {
    /// Per-turn bookkeeping for autonomous sessions (spec §4.7 "per-turn
    /// limits"). Called once per `Done` chunk when `session.autonomous`.
    pub(crate) async fn autonomous_turn_completed(&self, session_id: &str) -> Vec<Command> {
        let settings = self.global_settings.read().await.clone();

        let limit_reached = self
            .state
            .with(session_id, |s| {
                s.autonomous_turns += 1;
                if s.autonomous_start_time.is_none() {
                    s.autonomous_start_time = Some(std::time::Instant::now());
                }
                let elapsed = s.autonomous_start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);
                s.autonomous_turns >= settings.max_autonomous_turns || elapsed >= settings.max_autonomous_duration_secs
            })
            .unwrap_or(false);

        if limit_reached {
            return vec![ready(AppEvent::AutonomousLimitReached { session_id: session_id.to_string() })];
        }

        let Some(session) = self.registry.session(session_id) else {
            return Vec::new();
        };

        if session.is_supervisor {
            let any_child_busy = self.registry.children_of(session_id).iter().any(|child| {
                self.registry.runner(&child.id).map(|runner| runner.is_streaming()).unwrap_or(false)
                    || self.state.with(&child.id, |s| s.is_waiting || s.merge_type != MergeType::None).unwrap_or(false)
            });
            if any_child_busy {
                tracing::debug!(session_id, "supervisor deferring completion, a child is still busy");
                return Vec::new();
            }
        }

        vec![ready(AppEvent::SessionCompleted { session_id: session_id.to_string() })]
    }

    pub(crate) fn handle_autonomous_limit_reached(&self, session_id: String) -> Vec<Command> {
        let Some(mut session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("AutonomousLimitReached", &session_id);
            return Vec::new();
        };

        self.registry.with_session(&session_id, |s| s.autonomous = false);
        session.autonomous = false;
        self.notifications.warn(&format!("{} reached its autonomous turn/duration limit and was paused", session.display_title()));

        let config = self.config.clone();
        vec![Box::pin(async move {
            if let Err(err) = config.save_session(&session).await {
                tracing::warn!(session_id = %session.id, %err, "failed to persist autonomous limit");
            }
            AppEvent::Noop
        })]
    }

    /// `SessionCompleted` (spec §4.7): the one place a hook for a test-retry
    /// loop would sit. No test-runner collaborator exists in this CORE (test
    /// execution is the agent's own responsibility during its turn), so
    /// `tests_passed` is always reported true; `RepoSettings::test_command`
    /// and `test_retries` are read by the runner/agent layer, not here.
    pub(crate) async fn handle_session_completed(&self, session_id: String) -> Vec<Command> {
        tracing::info!(session_id, "autonomous session completed its pipeline");
        vec![ready(AppEvent::SessionPipelineComplete { session_id, tests_passed: true })]
    }

    /// `SessionPipelineComplete` (spec §4.7): up to four independent
    /// follow-ups, none of which depend on the others.
    pub(crate) async fn handle_session_pipeline_complete(&self, session_id: String, tests_passed: bool) -> Vec<Command> {
        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("SessionPipelineComplete", &session_id);
            return Vec::new();
        };

        let mut commands = Vec::new();

        // 1. Broadcast-group auto-PR once every sibling is quiescent.
        if let Some(group_id) = session.broadcast_group_id.clone() {
            let auto_broadcast_pr = self.global_settings.read().await.auto_broadcast_pr;
            if auto_broadcast_pr {
                let siblings = self.registry.sessions_in_broadcast_group(&group_id);
                let quiescent = siblings.iter().all(|sibling| {
                    !self.registry.runner(&sibling.id).map(|runner| runner.is_streaming()).unwrap_or(false)
                        && !self.state.with(&sibling.id, |s| s.is_waiting || s.merge_type != MergeType::None).unwrap_or(false)
                });
                if quiescent {
                    let eligible: Vec<String> =
                        siblings.into_iter().filter(|s| !s.pr_created && !s.merged).map(|s| s.id).collect();
                    if !eligible.is_empty() {
                        commands.push(ready(AppEvent::CreatePRsForSessions { session_ids: eligible }));
                    }
                }
            }
        }

        // 2. Auto-PR for a standalone autonomous session with passing tests.
        if !session.is_supervisor && session.supervisor_id.is_none() && !session.pr_created && !session.merged && tests_passed {
            commands.push(ready(AppEvent::StartMerge { session_id: session_id.clone(), merge_type: MergeType::Pr }));
        }

        // 3. Resume polling if this session already has an open PR.
        if session.pr_created && !session.pr_merged && !session.pr_closed {
            let repo_settings = self.config.repo_settings(&session.repo_path).await.ok();
            if repo_settings.map(|settings| settings.auto_merge).unwrap_or(false) {
                commands.extend(self.poll_for_auto_merge(&session_id));
            }
        }

        // 4. Notify a supervisor that one of its children finished.
        if let Some(supervisor_id) = session.supervisor_id.clone() {
            let all_siblings_done = self
                .registry
                .children_of(&supervisor_id)
                .iter()
                .all(|child| child.id == session.id || child.status == Status::Done || child.merged_to_parent);
            let notice = format!(
                "Child session '{}' finished (all children done: {all_siblings_done}).",
                session.display_title()
            );
            self.state.with(&supervisor_id, |s| s.pending_msg = Some(notice));
            commands.push(ready(AppEvent::SendPendingMessage { session_id: supervisor_id }));
        }

        commands
    }

    pub(crate) fn handle_send_pending_message(&self, session_id: String) -> Vec<Command> {
        if self.registry.session(&session_id).is_none() {
            registry::drop_unknown_session("SendPendingMessage", &session_id);
            return Vec::new();
        }

        let busy = self.state.with(&session_id, |s| s.is_waiting || s.merge_type != MergeType::None).unwrap_or(false);
        if busy {
            tracing::debug!(session_id, "session busy, leaving pending message queued");
            return Vec::new();
        }

        let Some(text) = self.state.with(&session_id, |s| s.pending_msg.take()).flatten() else {
            return Vec::new();
        };

        vec![ready(AppEvent::Send { session_id, blocks: vec![ContentBlock::Text(text)] })]
    }

    // --- Auto-merge state machine (spec §4.7, §4.11) ---

    /// Starts the poll loop for `session_id` unless one is already running
    /// (the `auto_merge_polling` guard is the sole de-duplication mechanism;
    /// SPEC_FULL §9).
    pub(crate) fn poll_for_auto_merge(&self, session_id: &str) -> Vec<Command> {
        let already_polling = self
            .state
            .with(session_id, |s| {
                if s.auto_merge_polling {
                    true
                } else {
                    s.auto_merge_polling = true;
                    false
                }
            })
            .unwrap_or(true);

        if already_polling {
            tracing::debug!(session_id, "auto-merge poll already in flight, ignoring duplicate start");
            return Vec::new();
        }

        vec![ready(AppEvent::StartAutoMergePoll { session_id: session_id.to_string(), attempt: 1 })]
    }

    pub(crate) fn handle_start_auto_merge_poll(&self, session_id: String, attempt: u32) -> Vec<Command> {
        let Some(session) = self.registry.session(&session_id) else {
            self.state.with(&session_id, |s| s.auto_merge_polling = false);
            registry::drop_unknown_session("StartAutoMergePoll", &session_id);
            return Vec::new();
        };

        let git = self.git.clone();
        let repo = session.repo_path.clone();
        let branch = session.branch.clone();

        vec![Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_secs(super::AUTO_MERGE_POLL_INTERVAL_SECS)).await;

            let review = git.check_pr_review_decision(&repo, &branch).await.unwrap_or(ReviewDecision::None);
            let review_comments = git.fetch_pr_review_comments(&repo, &branch).await.unwrap_or_default();
            let comments = u32::try_from(review_comments.len()).unwrap_or(u32::MAX);
            let ci = git.check_pr_checks(&repo, &branch).await.unwrap_or(CiStatus::None);

            AppEvent::AutoMergePollResult { session_id, review, comments, review_comments, ci, attempt }
        })]
    }

    /// Priority order (spec §4.7): unaddressed review comments beat
    /// changes-requested, which beats a still-pending review, which beats
    /// examining CI once the PR is approved.
    pub(crate) async fn handle_auto_merge_poll_result(
        &self,
        session_id: String,
        review: ReviewDecision,
        comments: u32,
        review_comments: Vec<ReviewComment>,
        ci: CiStatus,
        attempt: u32,
    ) -> Vec<Command> {
        let Some(session) = self.registry.session(&session_id) else {
            self.state.with(&session_id, |s| s.auto_merge_polling = false);
            registry::drop_unknown_session("AutoMergePollResult", &session_id);
            return Vec::new();
        };

        if comments > session.pr_comments_addressed_count {
            self.state.with(&session_id, |s| s.auto_merge_polling = false);
            self.registry.with_session(&session_id, |s| s.pr_comments_addressed_count = comments);
            let prompt = format!("There are {comments} review comment(s) on this pull request to address:\n{}", review_comments_digest(&review_comments));
            self.state.with(&session_id, |s| s.pending_msg = Some(prompt));

            let mut updated = session.clone();
            updated.pr_comments_addressed_count = comments;
            let config = self.config.clone();
            return vec![Box::pin(async move {
                if let Err(err) = config.save_session(&updated).await {
                    tracing::warn!(session_id = %updated.id, %err, "failed to persist comment count");
                }
                AppEvent::SendPendingMessage { session_id: updated.id }
            })];
        }

        if review == ReviewDecision::ChangesRequested {
            return vec![retry_auto_merge_poll(&session_id, attempt)];
        }

        if review == ReviewDecision::None {
            if attempt >= super::AUTO_MERGE_MAX_ATTEMPTS {
                self.state.with(&session_id, |s| s.auto_merge_polling = false);
                self.notifications.warn(&format!("auto-merge gave up waiting for a review on {}", session.display_title()));
                return Vec::new();
            }
            return vec![retry_auto_merge_poll(&session_id, attempt)];
        }

        match ci {
            CiStatus::Passing | CiStatus::None => {
                let git = self.git.clone();
                let repo = session.repo_path.clone();
                let branch = session.branch.clone();
                vec![Box::pin(async move {
                    let result = git.merge_pr(&repo, &branch, false).await.map_err(|err| err.to_string());
                    AppEvent::AutoMergeResult { session_id, result }
                })]
            }
            CiStatus::Failing => {
                self.state.with(&session_id, |s| s.auto_merge_polling = false);
                self.notifications.warn(&format!("CI failing for {}, auto-merge stopped", session.display_title()));
                Vec::new()
            }
            CiStatus::Pending => {
                if attempt >= super::AUTO_MERGE_MAX_ATTEMPTS {
                    self.state.with(&session_id, |s| s.auto_merge_polling = false);
                    self.notifications.warn(&format!("auto-merge gave up waiting for CI on {}", session.display_title()));
                    return Vec::new();
                }
                vec![retry_auto_merge_poll(&session_id, attempt)]
            }
        }
    }

    pub(crate) async fn handle_auto_merge_result(&self, session_id: String, result: Result<(), String>) -> Vec<Command> {
        self.state.with(&session_id, |s| s.auto_merge_polling = false);

        let err = match result {
            Ok(()) => None,
            Err(err) => Some(err),
        };

        let Some(err) = err else {
            self.registry.with_session(&session_id, |s| s.pr_merged = true);
            let Some(session) = self.registry.session(&session_id) else {
                return Vec::new();
            };
            self.notifications.warn(&format!("auto-merged {}", session.display_title()));

            let config = self.config.clone();
            let session_for_save = session.clone();
            let mut commands: Vec<Command> = vec![Box::pin(async move {
                if let Err(err) = config.save_session(&session_for_save).await {
                    tracing::warn!(session_id = %session_for_save.id, %err, "failed to persist pr_merged flag");
                }
                AppEvent::Noop
            })];

            if self.global_settings.read().await.auto_cleanup_merged {
                commands.push(self.cleanup_merged_session(session));
            }

            return commands;
        };

        tracing::error!(session_id, %err, "auto-merge failed");
        self.notifications.warn(&format!("auto-merge failed: {err}"));
        Vec::new()
    }

    /// Stops the runner, removes the session from the registry, and deletes
    /// its persisted rows and worktree (spec §4.11 "auto_cleanup_merged").
    pub(crate) fn cleanup_merged_session(&self, session: Session) -> Command {
        let registry = self.registry.clone();
        let config = self.config.clone();
        Box::pin(async move {
            registry.delete_session(&session.id).await;
            if let Err(err) = config.delete_session(&session.id).await {
                tracing::warn!(session_id = %session.id, %err, "failed to delete persisted session row during cleanup");
            }
            if let Err(err) = config.delete_messages(&session.id).await {
                tracing::warn!(session_id = %session.id, %err, "failed to delete persisted messages during cleanup");
            }
            if let Err(err) = tokio::fs::remove_dir_all(&session.work_tree).await {
                tracing::warn!(session_id = %session.id, %err, "failed to remove worktree during cleanup");
            }
            AppEvent::Noop
        })
    }

    // --- PR poller (spec §4.11) ---

    pub(crate) fn handle_pr_poll_tick(&self) -> Vec<Command> {
        let candidates: Vec<Session> = self
            .registry
            .all_sessions()
            .into_iter()
            .filter(|s| s.pr_created && !s.pr_merged && !s.pr_closed && !s.merged)
            .collect();

        let mut by_repo: HashMap<PathBuf, Vec<Session>> = HashMap::new();
        for session in candidates {
            by_repo.entry(session.repo_path.clone()).or_default().push(session);
        }

        let git = self.git.clone();
        let inbox = self.inbox_tx_clone();

        by_repo
            .into_iter()
            .map(|(repo, sessions)| {
                let git = git.clone();
                let inbox = inbox.clone();
                Box::pin(async move {
                    let branches: Vec<String> = sessions.iter().map(|s| s.branch.clone()).collect();
                    let states = git.batch_pr_states_with_comments(&repo, &branches).await.unwrap_or_default();
                    let by_branch: HashMap<String, _> = states.into_iter().map(|state| (state.branch.clone(), state)).collect();

                    for session in &sessions {
                        if let Some(state) = by_branch.get(&session.branch) {
                            let _ = inbox.send(AppEvent::PrPollResult {
                                session_id: session.id.clone(),
                                state: state.state,
                                comment_count: state.comment_count,
                            });
                        }
                    }

                    AppEvent::Noop
                }) as Command
            })
            .collect()
    }

    pub(crate) async fn handle_pr_poll_result(&self, session_id: String, state: PrState, comment_count: u32) -> Vec<Command> {
        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("PrPollResult", &session_id);
            return Vec::new();
        };

        let mut commands = Vec::new();
        let mut became_terminal = false;

        match state {
            PrState::Merged if !session.pr_merged => {
                self.registry.with_session(&session_id, |s| s.pr_merged = true);
                became_terminal = true;
            }
            PrState::Closed if !session.pr_closed => {
                self.registry.with_session(&session_id, |s| s.pr_closed = true);
                became_terminal = true;
            }
            PrState::Merged | PrState::Closed | PrState::Open => {}
        }

        if became_terminal {
            let mut updated = session.clone();
            updated.pr_merged = updated.pr_merged || matches!(state, PrState::Merged);
            updated.pr_closed = updated.pr_closed || matches!(state, PrState::Closed);
            let config = self.config.clone();
            commands.push(Box::pin(async move {
                if let Err(err) = config.save_session(&updated).await {
                    tracing::warn!(session_id = %updated.id, %err, "failed to persist PR poll outcome");
                }
                AppEvent::Noop
            }));

            if self.global_settings.read().await.auto_cleanup_merged {
                commands.push(self.cleanup_merged_session(session));
            }
            return commands;
        }

        if state == PrState::Open && comment_count > session.pr_comment_count {
            self.registry.with_session(&session_id, |s| s.pr_comment_count = comment_count);

            let mut updated = session.clone();
            updated.pr_comment_count = comment_count;
            let config = self.config.clone();
            commands.push(Box::pin(async move {
                if let Err(err) = config.save_session(&updated).await {
                    tracing::warn!(session_id = %updated.id, %err, "failed to persist pr_comment_count");
                }
                AppEvent::Noop
            }));

            if session.autonomous && self.global_settings.read().await.auto_address_pr_comments {
                let git = self.git.clone();
                let repo = session.repo_path.clone();
                let branch = session.branch.clone();
                let state_store = self.state.clone();
                let session_id_for_fetch = session_id.clone();
                commands.push(Box::pin(async move {
                    let comments = git.fetch_pr_review_comments(&repo, &branch).await.unwrap_or_default();
                    let prompt = format!("There are new review comments on this pull request:\n{}", review_comments_digest(&comments));
                    state_store.with(&session_id_for_fetch, |s| s.pending_msg = Some(prompt));
                    AppEvent::SendPendingMessage { session_id: session_id_for_fetch }
                }));
            }
        }

        commands
    }

    // --- Supervisor / host-tool channels (spec §4.7, §6) ---

    pub(crate) fn handle_create_child_requested(
        &self,
        session_id: String,
        request: CreateChildRequest,
        rx: mpsc::UnboundedReceiver<CreateChildRequest>,
    ) -> Vec<Command> {
        let mut commands = vec![super::listener::listen_create_child(session_id.clone(), rx)];

        let Some(supervisor) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("CreateChildRequested", &session_id);
            return commands;
        };

        let registry = self.registry.clone();
        let config = self.config.clone();
        let request_id = request.id;
        let prompt = request.prompt;
        let name = request.name;

        commands.push(Box::pin(async move {
            let child_id = uuid::Uuid::new_v4().to_string();
            let work_tree = supervisor.repo_path.join(SESSION_DATA_DIR).join(&child_id);

            let child = Session {
                id: child_id.clone(),
                repo_path: supervisor.repo_path.clone(),
                work_tree,
                branch: format!("conduit/{child_id}"),
                base_branch: supervisor.branch.clone(),
                name,
                created_at: now_unix(),
                updated_at: now_unix(),
                started: false,
                autonomous: supervisor.autonomous,
                is_supervisor: false,
                supervisor_id: Some(supervisor.id.clone()),
                parent_id: Some(supervisor.id.clone()),
                workspace_id: supervisor.workspace_id.clone(),
                broadcast_group_id: None,
                containerized: supervisor.containerized,
                issue_ref: None,
                merged: false,
                merged_to_parent: false,
                pr_created: false,
                pr_merged: false,
                pr_closed: false,
                pr_comment_count: 0,
                pr_comments_addressed_count: 0,
                model: supervisor.model,
                size: SessionSize::default(),
                stats: SessionStats::default(),
                status: Status::New,
                summary: None,
                prompt,
            };

            registry.insert_session_snapshot(child.clone());
            if let Err(err) = config.save_session(&child).await {
                tracing::warn!(session_id = %child.id, %err, "failed to persist child session");
            }

            AppEvent::ChildSessionCreated { supervisor_id: session_id, request_id, child }
        }));

        commands
    }

    pub(crate) async fn handle_child_session_created(&self, supervisor_id: String, request_id: String, child: Session) -> Vec<Command> {
        let mut commands = match self.registry.get_or_create_runner(&child).await {
            Ok((_, commands)) => commands,
            Err(err) => {
                tracing::warn!(session_id = %child.id, %err, "failed to instantiate child runner");
                if let Some(runner) = self.registry.runner(&supervisor_id) {
                    runner.send_host_tool_response(HostToolResponse {
                        id: request_id,
                        payload: serde_json::json!({"error": err.to_string()}),
                    });
                }
                return Vec::new();
            }
        };

        if let Some(runner) = self.registry.runner(&supervisor_id) {
            runner.send_host_tool_response(HostToolResponse {
                id: request_id,
                payload: serde_json::json!({"child_session_id": child.id}),
            });
        }

        let prompt = child.prompt.clone();
        commands.extend(self.send_turn(&child, vec![ContentBlock::Text(prompt)]).await);
        commands
    }

    pub(crate) fn handle_list_children_requested(
        &self,
        session_id: String,
        request: ListChildrenRequest,
        rx: mpsc::UnboundedReceiver<ListChildrenRequest>,
    ) -> Vec<Command> {
        let commands = vec![super::listener::listen_list_children(session_id.clone(), rx)];

        let summaries: Vec<_> = self
            .registry
            .children_of(&session_id)
            .iter()
            .map(|child| {
                serde_json::json!({
                    "id": child.id,
                    "name": child.display_title(),
                    "status": child.status.to_string(),
                    "merged_to_parent": child.merged_to_parent,
                })
            })
            .collect();

        if let Some(runner) = self.registry.runner(&session_id) {
            runner.send_host_tool_response(HostToolResponse { id: request.id, payload: serde_json::json!({"children": summaries}) });
        }

        commands
    }

    pub(crate) fn handle_merge_child_requested(
        &self,
        session_id: String,
        request: MergeChildRequest,
        rx: mpsc::UnboundedReceiver<MergeChildRequest>,
    ) -> Vec<Command> {
        let mut commands = vec![super::listener::listen_merge_child(session_id.clone(), rx)];

        let Some(supervisor) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("MergeChildRequested", &session_id);
            return commands;
        };
        let Some(child) = self.registry.session(&request.child_session_id) else {
            reply_host_tool_error(self.registry.runner(&session_id), request.id, "unknown child session");
            return commands;
        };
        if child.supervisor_id.as_deref() != Some(session_id.as_str()) {
            reply_host_tool_error(self.registry.runner(&session_id), request.id, "session is not a child of this supervisor");
            return commands;
        }
        if child.merged_to_parent {
            reply_host_tool_error(self.registry.runner(&session_id), request.id, "child already merged");
            return commands;
        }

        self.state.with(&session_id, |s| s.pending_merge_child_request_id = Some(request.id.clone()));

        let git = self.git.clone();
        let request_id = request.id;
        let child_id = child.id.clone();

        commands.push(Box::pin(async move {
            let message = format!("Merge {} into {}", child.branch, supervisor.branch);
            let result = git
                .merge_to_parent(&child.work_tree, &child.branch, &supervisor.work_tree, &supervisor.branch, &message)
                .await
                .map_err(|err| err.to_string());

            AppEvent::MergeChildComplete { session_id, child_session_id: child_id, request_id, result }
        }));

        commands
    }

    pub(crate) fn handle_merge_child_complete(
        &self,
        session_id: String,
        child_session_id: String,
        request_id: String,
        result: Result<(), String>,
    ) -> Vec<Command> {
        self.state.with(&session_id, |s| s.pending_merge_child_request_id = None);

        let payload = match &result {
            Ok(()) => serde_json::json!({"ok": true}),
            Err(err) => serde_json::json!({"error": err}),
        };
        if let Some(runner) = self.registry.runner(&session_id) {
            runner.send_host_tool_response(HostToolResponse { id: request_id, payload });
        }

        if result.is_err() {
            return Vec::new();
        }

        self.registry.with_session(&child_session_id, |s| s.merged_to_parent = true);
        let Some(child) = self.registry.session(&child_session_id) else {
            return Vec::new();
        };

        let config = self.config.clone();
        let parent_id = session_id;
        vec![Box::pin(async move {
            if let Err(err) = config.save_session(&child).await {
                tracing::warn!(session_id = %child.id, %err, "failed to persist merged_to_parent flag");
            }
            if let Err(err) = super::merge::append_child_history_to_parent(config.as_ref(), &parent_id, &child.id).await {
                tracing::warn!(session_id = %parent_id, %err, "failed to append child history to parent");
            }
            AppEvent::Noop
        })]
    }

    pub(crate) fn handle_host_create_pr_requested(
        &self,
        session_id: String,
        request: CreatePrRequest,
        rx: mpsc::UnboundedReceiver<CreatePrRequest>,
    ) -> Vec<Command> {
        let mut commands = vec![super::listener::listen_create_pr(session_id.clone(), rx)];

        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("CreatePrRequested", &session_id);
            return commands;
        };
        if session.pr_created || session.merged {
            reply_host_tool_error(self.registry.runner(&session_id), request.id, "pull request already created or session already merged");
            return commands;
        }

        let git = self.git.clone();
        let config = self.config.clone();
        let registry = self.registry.clone();
        let runner = self.registry.runner(&session_id);
        let request_id = request.id;
        let session_for_call = session.clone();

        commands.push(Box::pin(async move {
            let title = session_for_call.display_title().to_string();
            let result = git
                .create_pr(
                    &session_for_call.repo_path,
                    &session_for_call.work_tree,
                    &session_for_call.branch,
                    &session_for_call.base_branch,
                    &title,
                    session_for_call.issue_ref.as_deref(),
                )
                .await;

            let payload = match &result {
                Ok(()) => {
                    registry.with_session(&session_for_call.id, |s| s.pr_created = true);
                    serde_json::json!({"ok": true})
                }
                Err(err) => serde_json::json!({"error": err.to_string()}),
            };
            if let Some(runner) = runner {
                runner.send_host_tool_response(HostToolResponse { id: request_id, payload });
            }

            if result.is_ok() {
                if let Some(updated) = registry.session(&session_for_call.id) {
                    if let Err(err) = config.save_session(&updated).await {
                        tracing::warn!(session_id = %session_for_call.id, %err, "failed to persist pr_created flag");
                    }
                }
            }

            AppEvent::Noop
        }));

        commands
    }

    pub(crate) fn handle_host_push_branch_requested(
        &self,
        session_id: String,
        request: PushBranchRequest,
        rx: mpsc::UnboundedReceiver<PushBranchRequest>,
    ) -> Vec<Command> {
        let mut commands = vec![super::listener::listen_push_branch(session_id.clone(), rx)];

        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("PushBranchRequested", &session_id);
            return commands;
        };

        let git = self.git.clone();
        let runner = self.registry.runner(&session_id);
        let request_id = request.id;
        let message = request.message;

        commands.push(Box::pin(async move {
            let result = git.push_updates(&session.repo_path, &session.work_tree, &session.branch, &message).await;
            let payload = match &result {
                Ok(()) => serde_json::json!({"ok": true}),
                Err(err) => serde_json::json!({"error": err.to_string()}),
            };
            if let Some(runner) = runner {
                runner.send_host_tool_response(HostToolResponse { id: request_id, payload });
            }
            AppEvent::Noop
        }));

        commands
    }

    pub(crate) fn handle_host_get_review_comments_requested(
        &self,
        session_id: String,
        request: GetReviewCommentsRequest,
        rx: mpsc::UnboundedReceiver<GetReviewCommentsRequest>,
    ) -> Vec<Command> {
        let mut commands = vec![super::listener::listen_get_review_comments(session_id.clone(), rx)];

        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("GetReviewCommentsRequested", &session_id);
            return commands;
        };

        let git = self.git.clone();
        let runner = self.registry.runner(&session_id);
        let request_id = request.id;

        commands.push(Box::pin(async move {
            let result = git.fetch_pr_review_comments(&session.repo_path, &session.branch).await;
            let payload = match result {
                Ok(comments) => {
                    let items: Vec<_> = comments
                        .iter()
                        .map(|comment| serde_json::json!({"author": comment.author, "body": comment.body, "path": comment.path}))
                        .collect();
                    serde_json::json!({"comments": items})
                }
                Err(err) => serde_json::json!({"error": err.to_string()}),
            };
            if let Some(runner) = runner {
                runner.send_host_tool_response(HostToolResponse { id: request_id, payload });
            }
            AppEvent::Noop
        }));

        commands
    }
}

fn retry_auto_merge_poll(session_id: &str, attempt: u32) -> Command {
    ready(AppEvent::StartAutoMergePoll { session_id: session_id.to_string(), attempt: attempt + 1 })
}

fn reply_host_tool_error(runner: Option<Arc<dyn crate::collab::runner::Runner>>, request_id: String, message: &str) {
    if let Some(runner) = runner {
        runner.send_host_tool_response(HostToolResponse { id: request_id, payload: serde_json::json!({"error": message}) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_comments_digest_formats_each_comment() {
        let comments = vec![
            ReviewComment { author: "alice".to_string(), body: "please rename this".to_string(), path: Some("src/lib.rs".to_string()) },
            ReviewComment { author: "bob".to_string(), body: "looks good".to_string(), path: None },
        ];
        let digest = review_comments_digest(&comments);
        assert!(digest.contains("alice"));
        assert!(digest.contains("src/lib.rs"));
        assert!(digest.contains("bob"));
    }
}
