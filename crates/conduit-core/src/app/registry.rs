//! Session Registry (spec §4.1): owns per-session `Runner` instances and
//! drives their creation/teardown. Persisted `Session` snapshots and the
//! `StateStore` are kept alongside so `Select`/`DeleteSession` can assemble
//! the full picture a caller needs in one call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::collab::config::ConfigService;
use crate::collab::runner::{
    Message, PermissionRequest, PlanApprovalRequest, QuestionRequest, Runner, RunnerFactory,
};
use crate::core::error::CoreError;
use crate::domain::session::Session;

use super::listener::{
    listen_create_child, listen_create_pr, listen_get_review_comments, listen_list_children,
    listen_merge_child, listen_permission, listen_plan_approval, listen_push_branch, listen_question,
};
use super::state::StateStore;
use super::Command;

/// Bundle returned by `select`, letting the caller assemble a UI update
/// without the registry itself touching any UI-visible state.
pub struct SelectResult {
    pub runner: Arc<dyn Runner>,
    pub messages: Vec<Message>,
    pub pending_permission: Option<PermissionRequest>,
    pub pending_question: Option<QuestionRequest>,
    pub pending_plan_approval: Option<PlanApprovalRequest>,
    pub streaming_content: String,
    pub is_waiting: bool,
}

/// Returned by `delete_session` so the caller can detect whether the
/// deleted session was the active one.
pub struct DeleteHandle {
    pub session_id: String,
    pub was_known: bool,
}

pub struct SessionRegistry {
    runners: Mutex<HashMap<String, Arc<dyn Runner>>>,
    sessions: Mutex<HashMap<String, Session>>,
    state: Arc<StateStore>,
    config: Arc<dyn ConfigService>,
    factory: Arc<dyn RunnerFactory>,
}

impl SessionRegistry {
    pub fn new(state: Arc<StateStore>, config: Arc<dyn ConfigService>, factory: Arc<dyn RunnerFactory>) -> Self {
        Self { runners: Mutex::new(HashMap::new()), sessions: Mutex::new(HashMap::new()), state, config, factory }
    }

    pub fn insert_session_snapshot(&self, session: Session) {
        let mut sessions = self.sessions.lock().expect("registry mutex poisoned");
        sessions.insert(session.id.clone(), session);
    }

    pub fn session(&self, id: &str) -> Option<Session> {
        self.sessions.lock().expect("registry mutex poisoned").get(id).cloned()
    }

    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().expect("registry mutex poisoned");
        sessions.get_mut(id).map(f)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().expect("registry mutex poisoned").keys().cloned().collect()
    }

    pub fn sessions_in_broadcast_group(&self, group_id: &str) -> Vec<Session> {
        self.sessions
            .lock()
            .expect("registry mutex poisoned")
            .values()
            .filter(|s| s.broadcast_group_id.as_deref() == Some(group_id))
            .cloned()
            .collect()
    }

    /// Every known session, in no particular order (spec §4.11 "PR poller"
    /// candidate scan, §4.8 broadcast-group bookkeeping).
    pub fn all_sessions(&self) -> Vec<Session> {
        self.sessions.lock().expect("registry mutex poisoned").values().cloned().collect()
    }

    /// Sessions whose `supervisor_id` points at `supervisor_id` (spec §4.7
    /// supervisor deferral, §6 `list_children` host tool).
    pub fn children_of(&self, supervisor_id: &str) -> Vec<Session> {
        self.sessions
            .lock()
            .expect("registry mutex poisoned")
            .values()
            .filter(|s| s.supervisor_id.as_deref() == Some(supervisor_id))
            .cloned()
            .collect()
    }

    pub fn runner(&self, id: &str) -> Option<Arc<dyn Runner>> {
        self.runners.lock().expect("registry mutex poisoned").get(id).cloned()
    }

    /// Returns the existing runner for `id`, or instantiates and installs a
    /// new one (spec §4.1 "GetOrCreateRunner"). Idempotent per session id.
    /// Any durable optional channels the new runner exposes are returned as
    /// listener `Command`s the caller must schedule.
    pub async fn get_or_create_runner(&self, session: &Session) -> Result<(Arc<dyn Runner>, Vec<Command>), CoreError> {
        if let Some(existing) = self.runner(&session.id) {
            return Ok((existing, Vec::new()));
        }

        tracing::info!(session_id = %session.id, "instantiating runner");

        let messages = self.config.load_messages(&session.id).await?;
        let repo_settings = self.config.repo_settings(&session.repo_path).await?;

        let runner = self.factory.create(session).await?;
        runner.set_allowed_tools(repo_settings.allowed_tools);
        runner.set_mcp_servers(repo_settings.mcp_servers);
        for message in &messages {
            if matches!(message.role, crate::collab::runner::MessageRole::Assistant) {
                runner.add_assistant_message(&message.content);
            }
        }

        let mut commands = Vec::new();
        let session_id = session.id.clone();

        if let Some(rx) = runner.permission_request_chan() {
            commands.push(listen_permission(session_id.clone(), rx));
        }
        if let Some(rx) = runner.question_request_chan() {
            commands.push(listen_question(session_id.clone(), rx));
        }
        if let Some(rx) = runner.plan_approval_request_chan() {
            commands.push(listen_plan_approval(session_id.clone(), rx));
        }
        if let Some(rx) = runner.create_child_request_chan() {
            commands.push(listen_create_child(session_id.clone(), rx));
        }
        if let Some(rx) = runner.list_children_request_chan() {
            commands.push(listen_list_children(session_id.clone(), rx));
        }
        if let Some(rx) = runner.merge_child_request_chan() {
            commands.push(listen_merge_child(session_id.clone(), rx));
        }
        if let Some(rx) = runner.create_pr_request_chan() {
            commands.push(listen_create_pr(session_id.clone(), rx));
        }
        if let Some(rx) = runner.push_branch_request_chan() {
            commands.push(listen_push_branch(session_id.clone(), rx));
        }
        if let Some(rx) = runner.get_review_comments_request_chan() {
            commands.push(listen_get_review_comments(session_id.clone(), rx));
        }

        self.runners.lock().expect("registry mutex poisoned").insert(session_id.clone(), runner.clone());
        self.state.get_or_create(&session_id);

        Ok((runner, commands))
    }

    /// Saves the outgoing session's transient input/streaming buffer, then
    /// restores everything the caller needs to render the newly selected
    /// session (spec §4.1 "Select").
    pub async fn select(&self, session: &Session) -> Result<SelectResult, CoreError> {
        let (runner, _commands) = self.get_or_create_runner(session).await?;
        let messages = runner.messages();

        let (pending_permission, pending_question, pending_plan_approval, streaming_content, is_waiting) = self
            .state
            .with(&session.id, |state| {
                (
                    state.pending_permission.clone(),
                    state.pending_question.clone(),
                    state.pending_plan_approval.clone(),
                    state.streaming_content.clone(),
                    state.is_waiting,
                )
            })
            .unwrap_or((None, None, None, String::new(), false));

        Ok(SelectResult { runner, messages, pending_permission, pending_question, pending_plan_approval, streaming_content, is_waiting })
    }

    /// Stops the runner, removes it and its state atomically, and returns a
    /// handle the caller uses to detect whether the active session was
    /// deleted (spec §4.1 "DeleteSession").
    pub async fn delete_session(&self, id: &str) -> DeleteHandle {
        let runner = self.runners.lock().expect("registry mutex poisoned").remove(id);
        let was_known = runner.is_some();

        if let Some(runner) = runner {
            runner.stop().await;
        }

        self.state.delete(id);
        self.sessions.lock().expect("registry mutex poisoned").remove(id);

        DeleteHandle { session_id: id.to_string(), was_known }
    }

    /// Appends to the repo-scoped allow list, persists it, and instructs the
    /// runner to treat the tool as pre-authorized going forward (spec §4.1
    /// "AddAllowedTool").
    pub async fn add_allowed_tool(&self, session: &Session, tool: String) -> Result<(), CoreError> {
        let mut settings = self.config.repo_settings(&session.repo_path).await?;
        if !settings.allowed_tools.contains(&tool) {
            settings.allowed_tools.push(tool.clone());
        }
        self.config.set_allowed_tools(&session.repo_path, settings.allowed_tools).await?;

        if let Some(runner) = self.runner(&session.id) {
            runner.add_allowed_tool(tool);
        }

        Ok(())
    }

    /// Stops every runner. Called on process exit.
    pub async fn shutdown(&self) {
        let runners: Vec<Arc<dyn Runner>> = {
            let mut map = self.runners.lock().expect("registry mutex poisoned");
            map.drain().map(|(_, runner)| runner).collect()
        };

        for runner in runners {
            runner.stop().await;
        }
    }
}

/// Drops an event that named a session the registry no longer knows about
/// (spec §7 "internal invariant violations").
pub fn drop_unknown_session(event_name: &str, session_id: &str) {
    tracing::warn!(session_id, event_name, "dropping event for unknown or deleted session");
}
