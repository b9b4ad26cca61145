//! Per-session ephemeral state (spec §3 "SessionState", §4.2).
//!
//! The event loop is the sole writer; utility accessors take a
//! `std::sync::Mutex` so background `Command` tasks can read the handful of
//! fields they need (e.g. whether a session is still waiting) without
//! routing through the single-writer loop.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::collab::git::ProgressLine;
use crate::collab::runner::{PermissionRequest, PlanApprovalRequest, QuestionRequest};

/// Which merge-family flow is in flight for a session, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeType {
    #[default]
    None,
    Merge,
    Pr,
    Parent,
    Push,
}

/// One entry in a session's tool-use rollup: an in-flight or completed tool
/// invocation, held so trailing text can be flushed after it in order.
#[derive(Debug, Clone)]
pub struct ToolUseEntry {
    pub id: String,
    pub tool: String,
    pub input_preview: String,
    pub result: Option<String>,
}

/// Ephemeral per-session state (spec §3 "SessionState").
#[derive(Default)]
pub struct SessionState {
    pub is_waiting: bool,
    pub wait_start_time: Option<Instant>,
    pub stream_cancel: Option<CancellationToken>,

    pub merge_progress: Option<tokio::sync::mpsc::UnboundedReceiver<ProgressLine>>,
    pub merge_cancel: Option<CancellationToken>,
    pub merge_type: MergeType,

    pub pending_permission: Option<PermissionRequest>,
    pub pending_question: Option<QuestionRequest>,
    pub pending_plan_approval: Option<PlanApprovalRequest>,
    pub pending_msg: Option<String>,

    pub streaming_content: String,
    pub tool_use_rollup: Vec<ToolUseEntry>,
    pub detected_options: Vec<String>,
    pub current_todo_list: Vec<String>,
    pub subagent_model: Option<String>,

    pub autonomous_start_time: Option<Instant>,
    pub autonomous_turns: u32,
    pub auto_merge_polling: bool,
    pub pending_merge_child_request_id: Option<String>,
}

impl SessionState {
    /// Invariant check used by tests and debug assertions: `is_waiting`
    /// holds iff a cancellation handle is stored.
    pub fn waiting_invariant_holds(&self) -> bool {
        self.is_waiting == self.stream_cancel.is_some()
    }

    /// Invariant check: a merge progress channel implies a merge type.
    pub fn merge_invariant_holds(&self) -> bool {
        self.merge_progress.is_none() || self.merge_type != MergeType::None
    }
}

/// Keyed store of per-session ephemeral state.
#[derive(Default)]
pub struct StateStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session's state, creating a default entry if absent.
    pub fn get_or_create(&self, id: &str) {
        let mut sessions = self.sessions.lock().expect("state store mutex poisoned");
        sessions.entry(id.to_string()).or_default();
    }

    pub fn with<R>(&self, id: &str, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().expect("state store mutex poisoned");
        sessions.get_mut(id).map(f)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.sessions.lock().expect("state store mutex poisoned").contains_key(id)
    }

    /// Atomically removes a session's state, canceling any in-flight
    /// request/merge first (spec §3 "Deleting a session atomically").
    pub fn delete(&self, id: &str) {
        let mut sessions = self.sessions.lock().expect("state store mutex poisoned");
        if let Some(mut state) = sessions.remove(id) {
            if let Some(cancel) = state.stream_cancel.take() {
                cancel.cancel();
            }
            if let Some(cancel) = state.merge_cancel.take() {
                cancel.cancel();
            }
            state.merge_progress = None;
            state.pending_permission = None;
            state.pending_question = None;
            state.pending_plan_approval = None;
        }
    }

    /// Starts waiting for `id`. If a wait is already in progress, the
    /// previous cancellation handle is invoked before being replaced
    /// (cancel-and-replace; see SPEC_FULL §9 open question).
    pub fn start_waiting(&self, id: &str, cancel: CancellationToken) {
        let mut sessions = self.sessions.lock().expect("state store mutex poisoned");
        let state = sessions.entry(id.to_string()).or_default();
        if let Some(previous) = state.stream_cancel.take() {
            tracing::warn!(session_id = id, "start_waiting called while already waiting; canceling previous request");
            previous.cancel();
        }
        state.wait_start_time = Some(Instant::now());
        state.stream_cancel = Some(cancel);
        state.is_waiting = true;
    }

    /// Clears waiting state without invoking the cancel handle (the request
    /// already finished on its own).
    pub fn stop_waiting(&self, id: &str) {
        let mut sessions = self.sessions.lock().expect("state store mutex poisoned");
        if let Some(state) = sessions.get_mut(id) {
            state.stream_cancel = None;
            state.wait_start_time = None;
            state.is_waiting = false;
        }
    }

    pub fn start_merge(
        &self,
        id: &str,
        progress: tokio::sync::mpsc::UnboundedReceiver<ProgressLine>,
        cancel: CancellationToken,
        merge_type: MergeType,
    ) {
        let mut sessions = self.sessions.lock().expect("state store mutex poisoned");
        let state = sessions.entry(id.to_string()).or_default();
        state.merge_progress = Some(progress);
        state.merge_cancel = Some(cancel);
        state.merge_type = merge_type;
    }

    pub fn stop_merge(&self, id: &str) {
        let mut sessions = self.sessions.lock().expect("state store mutex poisoned");
        if let Some(state) = sessions.get_mut(id) {
            state.merge_progress = None;
            state.merge_cancel = None;
            state.merge_type = MergeType::None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_waiting_then_stop_waiting_restores_invariant() {
        let store = StateStore::new();
        store.start_waiting("s1", CancellationToken::new());
        assert!(store.with("s1", SessionState::waiting_invariant_holds).unwrap());

        store.stop_waiting("s1");
        assert!(store.with("s1", SessionState::waiting_invariant_holds).unwrap());
        assert!(!store.with("s1", |s| s.is_waiting).unwrap());
    }

    #[test]
    fn test_start_waiting_twice_cancels_previous() {
        let store = StateStore::new();
        let first = CancellationToken::new();
        store.start_waiting("s1", first.clone());
        store.start_waiting("s1", CancellationToken::new());

        assert!(first.is_cancelled());
        assert!(store.with("s1", SessionState::waiting_invariant_holds).unwrap());
    }

    #[test]
    fn test_delete_cancels_stream_and_merge_and_removes_entry() {
        let store = StateStore::new();
        let stream_cancel = CancellationToken::new();
        let merge_cancel = CancellationToken::new();
        store.start_waiting("s1", stream_cancel.clone());
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        store.start_merge("s1", rx, merge_cancel.clone(), MergeType::Pr);

        store.delete("s1");

        assert!(stream_cancel.is_cancelled());
        assert!(merge_cancel.is_cancelled());
        assert!(!store.exists("s1"));
    }

    #[test]
    fn test_merge_invariant_requires_merge_type_when_channel_present() {
        let store = StateStore::new();
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        store.start_merge("s1", rx, CancellationToken::new(), MergeType::Merge);

        assert!(store.with("s1", SessionState::merge_invariant_holds).unwrap());
    }
}
