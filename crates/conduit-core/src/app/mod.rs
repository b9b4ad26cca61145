//! The composition root and single-writer event loop (spec §4.3, §5).
//!
//! `App` owns the `SessionRegistry`, the `StateStore`, and every collaborator
//! trait object. `run` is the only task that ever mutates either store;
//! every other task in this crate is a `Command` — a side-effecting future
//! that produces a new `AppEvent` and re-enters the loop through the same
//! inbox. One writer, many producers (SPEC_FULL §9).

pub mod autonomous;
pub mod broadcast;
pub mod event;
pub mod explore;
pub mod listener;
pub mod merge;
pub mod prompt;
pub mod registry;
pub mod send;
pub mod state;

pub use event::{AppEvent, Command};
pub use registry::SessionRegistry;
pub use state::StateStore;

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::collab::config::{ConfigService, GlobalSettings};
use crate::collab::git::GitService;
use crate::collab::notify::{ClipboardService, NotificationService};

/// Bounded concurrency for parallel session creation, worktree-status
/// checks, runner retrieval, and bulk worktree deletion (spec §5).
pub const BULK_OP_CONCURRENCY: usize = 10;

/// Auto-merge poll interval (spec §4.7).
pub const AUTO_MERGE_POLL_INTERVAL_SECS: u64 = 30;

/// Auto-merge poll give-up threshold, roughly 30 minutes of wall time at the
/// 30s poll interval (spec §4.7, §5).
pub const AUTO_MERGE_MAX_ATTEMPTS: u32 = 60;

pub struct App {
    pub registry: Arc<SessionRegistry>,
    pub state: Arc<StateStore>,
    pub config: Arc<dyn ConfigService>,
    pub git: Arc<dyn GitService>,
    pub notifications: Arc<dyn NotificationService>,
    pub clipboard: Arc<dyn ClipboardService>,
    pub global_settings: RwLock<GlobalSettings>,
    inbox_tx: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<SessionRegistry>,
        state: Arc<StateStore>,
        config: Arc<dyn ConfigService>,
        git: Arc<dyn GitService>,
        notifications: Arc<dyn NotificationService>,
        clipboard: Arc<dyn ClipboardService>,
        global_settings: GlobalSettings,
        inbox_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            registry,
            state,
            config,
            git,
            notifications,
            clipboard,
            global_settings: RwLock::new(global_settings),
            inbox_tx,
        }
    }

    /// Re-enters the loop with an event produced outside a `Command`
    /// (e.g. a UI-thread user action).
    pub fn dispatch(&self, event: AppEvent) {
        if self.inbox_tx.send(event).is_err() {
            tracing::warn!("dispatched event after event loop shut down");
        }
    }

    /// Clones the inbox sender for a `Command` that needs to feed back more
    /// than one event (spec §4.11 PR poller fan-out by repo, §4.8 bulk ops).
    pub(crate) fn inbox_tx_clone(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.inbox_tx.clone()
    }

    fn schedule(&self, commands: Vec<Command>) {
        for command in commands {
            let tx = self.inbox_tx.clone();
            tokio::spawn(async move {
                let event = command.await;
                let _ = tx.send(event);
            });
        }
    }

    /// Runs the single-writer event loop until the inbox closes. Intended
    /// to be spawned once at process startup.
    pub async fn run(self: Arc<Self>, mut inbox_rx: mpsc::UnboundedReceiver<AppEvent>) {
        while let Some(event) = inbox_rx.recv().await {
            let commands = self.handle_event(event).await;
            self.schedule(commands);
        }
    }

    /// The single mutation point for all shared state (spec §4.3).
    async fn handle_event(&self, event: AppEvent) -> Vec<Command> {
        match event {
            AppEvent::ResponseChunk { session_id, chunk, rx } => self.handle_response_chunk(session_id, chunk, rx).await,
            AppEvent::ResponseChannelClosed { session_id } => self.handle_response_channel_closed(session_id),

            AppEvent::PermissionRequested { session_id, request, rx } => {
                self.handle_permission_requested(session_id, request, rx)
            }
            AppEvent::QuestionRequested { session_id, request, rx } => {
                self.handle_question_requested(session_id, request, rx)
            }
            AppEvent::PlanApprovalRequested { session_id, request, rx } => {
                self.handle_plan_approval_requested(session_id, request, rx)
            }
            AppEvent::DurableChannelClosed { session_id, channel } => {
                tracing::debug!(session_id, channel, "durable channel closed, not re-arming");
                Vec::new()
            }

            AppEvent::CreateChildRequested { session_id, request, rx } => {
                self.handle_create_child_requested(session_id, request, rx)
            }
            AppEvent::ListChildrenRequested { session_id, request, rx } => {
                self.handle_list_children_requested(session_id, request, rx)
            }
            AppEvent::MergeChildRequested { session_id, request, rx } => {
                self.handle_merge_child_requested(session_id, request, rx)
            }
            AppEvent::CreatePrRequested { session_id, request, rx } => {
                self.handle_host_create_pr_requested(session_id, request, rx)
            }
            AppEvent::PushBranchRequested { session_id, request, rx } => {
                self.handle_host_push_branch_requested(session_id, request, rx)
            }
            AppEvent::GetReviewCommentsRequested { session_id, request, rx } => {
                self.handle_host_get_review_comments_requested(session_id, request, rx)
            }
            AppEvent::MergeChildComplete { session_id, child_session_id, request_id, result } => {
                self.handle_merge_child_complete(session_id, child_session_id, request_id, result)
            }
            AppEvent::ChildSessionCreated { supervisor_id, request_id, child } => {
                self.handle_child_session_created(supervisor_id, request_id, child).await
            }

            AppEvent::Send { session_id, blocks } => self.handle_send(session_id, blocks).await,
            AppEvent::Interrupt { session_id } => self.handle_interrupt(session_id).await,
            AppEvent::RespondPermission { session_id, response } => {
                self.handle_respond_permission(session_id, response)
            }
            AppEvent::RespondQuestion { session_id, response } => self.handle_respond_question(session_id, response),
            AppEvent::RespondPlanApproval { session_id, response } => {
                self.handle_respond_plan_approval(session_id, response)
            }
            AppEvent::AddAllowedTool { session_id, tool } => self.handle_add_allowed_tool(session_id, tool).await,
            AppEvent::DeleteSession { session_id } => self.handle_delete_session(session_id).await,
            AppEvent::ExploreOptions { session_id } => self.handle_explore_options(session_id).await,

            AppEvent::StartMerge { session_id, merge_type } => self.handle_start_merge(session_id, merge_type).await,
            AppEvent::MergeProgress { session_id, line, rx } => self.handle_merge_progress(session_id, line, rx),
            AppEvent::MergeDone { session_id } => self.handle_merge_done(session_id).await,
            AppEvent::MergeError { session_id, conflicted_files, message } => {
                self.handle_merge_error(session_id, conflicted_files, message)
            }

            AppEvent::SessionCompleted { session_id } => self.handle_session_completed(session_id).await,
            AppEvent::SessionPipelineComplete { session_id, tests_passed } => {
                self.handle_session_pipeline_complete(session_id, tests_passed).await
            }
            AppEvent::AutonomousLimitReached { session_id } => self.handle_autonomous_limit_reached(session_id),
            AppEvent::SendPendingMessage { session_id } => self.handle_send_pending_message(session_id),

            AppEvent::StartAutoMergePoll { session_id, attempt } => self.handle_start_auto_merge_poll(session_id, attempt),
            AppEvent::AutoMergePollResult { session_id, review, comments, review_comments, ci, attempt } => {
                self.handle_auto_merge_poll_result(session_id, review, comments, review_comments, ci, attempt).await
            }
            AppEvent::AutoMergeResult { session_id, result } => self.handle_auto_merge_result(session_id, result).await,

            AppEvent::CreateBroadcastSessions { repos, prompt, name } => {
                self.handle_create_broadcast_sessions(repos, prompt, name)
            }
            AppEvent::BroadcastSessionsCreated { group_id, sessions } => {
                self.handle_broadcast_sessions_created(group_id, sessions).await
            }
            AppEvent::CreatePRsForSessions { session_ids } => self.handle_create_prs_for_sessions(session_ids),
            AppEvent::BulkDeleteSessions { session_ids } => self.handle_bulk_delete_sessions(session_ids),

            AppEvent::PrPollTick => self.handle_pr_poll_tick(),
            AppEvent::PrPollResult { session_id, state, comment_count } => {
                self.handle_pr_poll_result(session_id, state, comment_count).await
            }

            AppEvent::CommitMessageGenerated { session_id, message } => {
                tracing::debug!(session_id, message, "commit message generated");
                Vec::new()
            }
            AppEvent::TerminalError { session_id, message } => {
                tracing::error!(?session_id, message, "terminal error surfaced to loop");
                self.notifications.warn(&message);
                Vec::new()
            }
            AppEvent::Noop => Vec::new(),
        }
    }

    async fn handle_add_allowed_tool(&self, session_id: String, tool: String) -> Vec<Command> {
        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("AddAllowedTool", &session_id);
            return Vec::new();
        };

        if let Err(err) = self.registry.add_allowed_tool(&session, tool).await {
            tracing::warn!(session_id, %err, "failed to persist allowed tool");
        }

        Vec::new()
    }

    async fn handle_delete_session(&self, session_id: String) -> Vec<Command> {
        tracing::info!(session_id, "deleting session");
        let handle = self.registry.delete_session(&session_id).await;
        if let Err(err) = self.config.delete_session(&session_id).await {
            tracing::warn!(session_id, %err, "failed to delete persisted session row");
        }
        if let Err(err) = self.config.delete_messages(&session_id).await {
            tracing::warn!(session_id, %err, "failed to delete persisted messages");
        }
        debug_assert!(!self.state.exists(&handle.session_id));
        Vec::new()
    }
}
