//! Streaming & Send (spec §4.5): starting a turn, rolling up tool-use chunks
//! in order, persisting the runner's message history on `Done`, and
//! interrupting an in-flight turn.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collab::runner::{ContentBlock, ResponseChunk};
use crate::domain::session::{Session, SessionSize};

use super::event::{ready, AppEvent, Command};
use super::registry;
use super::state::{MergeType, SessionState, ToolUseEntry};
use super::App;

/// Detects a numbered list with at least two items in free-form assistant
/// text (spec §4.9 "detected from the last assistant message"). Returns the
/// item bodies, in order, with the leading `N.`/`N)` marker stripped.
fn detect_numbered_options(text: &str) -> Vec<String> {
    let mut options = Vec::new();
    let mut expected = 1u32;

    for line in text.lines() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix(&format!("{expected}.")).or_else(|| trimmed.strip_prefix(&format!("{expected})"))) else {
            continue;
        };
        let body = rest.trim();
        if body.is_empty() {
            continue;
        }
        options.push(body.to_string());
        expected += 1;
    }

    if options.len() >= 2 {
        options
    } else {
        Vec::new()
    }
}

/// Moves any accumulated tool-use entries into `streaming_content` in the
/// order they were opened, so trailing text is never rendered ahead of a
/// tool call it logically follows (spec §4.5 "flush rollup before text").
fn flush_rollup(state: &mut SessionState) {
    if state.tool_use_rollup.is_empty() {
        return;
    }
    for entry in state.tool_use_rollup.drain(..) {
        state.streaming_content.push_str(&format!("[{}] {}", entry.tool, entry.input_preview));
        if let Some(result) = entry.result {
            state.streaming_content.push_str(&format!(" -> {result}"));
        }
        state.streaming_content.push('\n');
    }
}

impl App {
    /// Starts a turn on `session`, sending `blocks` to its runner and
    /// installing a fresh `StartWaiting` guard. Shared by the user-initiated
    /// `Send` event, the autonomous pending-message replay, and every flow
    /// that forks a new session and sends it an initial prompt (broadcast,
    /// explore, supervisor `create_child`).
    pub(crate) async fn send_turn(&self, session: &Session, blocks: Vec<ContentBlock>) -> Vec<Command> {
        let (runner, mut commands) = match self.registry.get_or_create_runner(session).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(session_id = %session.id, %err, "failed to get or create runner for send");
                return Vec::new();
            }
        };

        if !session.started {
            self.registry.with_session(&session.id, |s| s.started = true);
            if let Some(updated) = self.registry.session(&session.id) {
                let config = self.config.clone();
                commands.push(Box::pin(async move {
                    if let Err(err) = config.save_session(&updated).await {
                        tracing::warn!(session_id = %updated.id, %err, "failed to persist session start");
                    }
                    AppEvent::Noop
                }));
            }
        }

        self.state.start_waiting(&session.id, CancellationToken::new());

        let rx = runner.send_content(blocks).await;
        commands.push(super::listener::listen_response(session.id.clone(), rx));
        commands
    }

    /// `Send` (spec §4.5): queues into `pending_msg` instead of starting a
    /// new turn while the session is waiting or merging.
    pub(crate) async fn handle_send(&self, session_id: String, blocks: Vec<ContentBlock>) -> Vec<Command> {
        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("Send", &session_id);
            return Vec::new();
        };

        let busy = self.state.with(&session_id, |s| s.is_waiting || s.merge_type != MergeType::None).unwrap_or(false);
        if busy {
            if let Some(text) = first_text(&blocks) {
                self.state.with(&session_id, |s| s.pending_msg = Some(text));
                tracing::debug!(session_id, "queued pending message while session busy");
            }
            return Vec::new();
        }

        self.send_turn(&session, blocks).await
    }

    pub(crate) async fn handle_response_chunk(
        &self,
        session_id: String,
        chunk: ResponseChunk,
        rx: mpsc::UnboundedReceiver<ResponseChunk>,
    ) -> Vec<Command> {
        if !self.state.exists(&session_id) {
            registry::drop_unknown_session("ResponseChunk", &session_id);
            return Vec::new();
        }

        match chunk {
            ResponseChunk::Text { content } => {
                self.state.with(&session_id, |s| {
                    flush_rollup(s);
                    s.streaming_content.push_str(&content);
                });
                vec![super::listener::listen_response(session_id, rx)]
            }
            ResponseChunk::ToolUse { tool, input, id } => {
                self.state.with(&session_id, |s| {
                    s.tool_use_rollup.push(ToolUseEntry { id, tool, input_preview: input.to_string(), result: None });
                });
                vec![super::listener::listen_response(session_id, rx)]
            }
            ResponseChunk::ToolResult { id, result_info } => {
                self.state.with(&session_id, |s| {
                    if let Some(entry) = s.tool_use_rollup.iter_mut().find(|entry| entry.id == id) {
                        entry.result = Some(result_info);
                    }
                });
                vec![super::listener::listen_response(session_id, rx)]
            }
            ResponseChunk::TodoUpdate { list } => {
                self.state.with(&session_id, |s| s.current_todo_list = list);
                vec![super::listener::listen_response(session_id, rx)]
            }
            ResponseChunk::StreamStats { turns, tokens } => {
                tracing::debug!(session_id, turns, tokens, "stream stats");
                vec![super::listener::listen_response(session_id, rx)]
            }
            ResponseChunk::SubagentStatus { model } => {
                self.state.with(&session_id, |s| s.subagent_model = Some(model));
                vec![super::listener::listen_response(session_id, rx)]
            }
            ResponseChunk::PermissionDenials { denials } => {
                tracing::warn!(session_id, ?denials, "permission denials reported by runner");
                vec![super::listener::listen_response(session_id, rx)]
            }
            ResponseChunk::Error { message } => {
                tracing::error!(session_id, message, "runner reported an error mid-turn");
                self.notifications.warn(&message);
                vec![super::listener::listen_response(session_id, rx)]
            }
            ResponseChunk::Done => self.handle_done(session_id).await,
        }
    }

    /// The durable response channel closed without ever delivering
    /// `ResponseChunk::Done` (runner crash or unexpected disconnect). Not
    /// re-armed: there is nothing left to listen on.
    pub(crate) fn handle_response_channel_closed(&self, session_id: String) -> Vec<Command> {
        tracing::warn!(session_id, "response channel closed without an explicit done chunk");
        self.state.with(&session_id, |s| {
            flush_rollup(s);
        });
        self.state.stop_waiting(&session_id);
        Vec::new()
    }

    async fn handle_done(&self, session_id: String) -> Vec<Command> {
        self.state.with(&session_id, |s| flush_rollup(s));
        self.state.stop_waiting(&session_id);

        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("Done", &session_id);
            return Vec::new();
        };

        let mut commands = Vec::new();

        if let Some(runner) = self.registry.runner(&session_id) {
            let messages = runner.messages();
            let config = self.config.clone();
            let session_id_for_save = session_id.clone();
            commands.push(Box::pin(async move {
                if let Err(err) = config.save_messages(&session_id_for_save, &messages).await {
                    tracing::warn!(session_id = %session_id_for_save, %err, "failed to persist runner messages");
                }
                AppEvent::Noop
            }));
        }

        let detected = self
            .state
            .with(&session_id, |s| {
                let options = detect_numbered_options(&s.streaming_content);
                s.detected_options = options.clone();
                options
            })
            .unwrap_or_default();
        if !detected.is_empty() {
            tracing::debug!(session_id, count = detected.len(), "detected numbered options for exploration");
        }

        self.notifications.session_completed(session.display_title());

        {
            let git = self.git.clone();
            let registry = self.registry.clone();
            let config = self.config.clone();
            let work_tree = session.work_tree.clone();
            let base_branch = session.base_branch.clone();
            let session_id_for_diff = session_id.clone();
            commands.push(Box::pin(async move {
                match git.diff_stats(&work_tree, &base_branch).await {
                    Ok(diff) => {
                        let size = SessionSize::from_diff(&diff);
                        let changed = registry
                            .with_session(&session_id_for_diff, |s| {
                                if s.size == size {
                                    false
                                } else {
                                    s.size = size;
                                    true
                                }
                            })
                            .unwrap_or(false);
                        if changed {
                            if let Some(updated) = registry.session(&session_id_for_diff) {
                                if let Err(err) = config.save_session(&updated).await {
                                    tracing::warn!(session_id = %updated.id, %err, "failed to persist session size");
                                }
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(session_id = %session_id_for_diff, %err, "failed to compute diff stats for session size");
                    }
                }
                AppEvent::Noop
            }));
        }

        if session.autonomous {
            commands.extend(self.autonomous_turn_completed(&session_id).await);
        }

        let has_pending = self.state.with(&session_id, |s| s.pending_msg.is_some()).unwrap_or(false);
        if has_pending {
            commands.push(ready(AppEvent::SendPendingMessage { session_id }));
        }

        commands
    }

    /// `Interrupt` (spec §4.5): cancels the `StartWaiting` guard, asks the
    /// runner to stop, and persists whatever history accumulated so far.
    pub(crate) async fn handle_interrupt(&self, session_id: String) -> Vec<Command> {
        let was_waiting = self.state.with(&session_id, |s| {
            if let Some(cancel) = s.stream_cancel.take() {
                cancel.cancel();
            }
            flush_rollup(s);
            if !s.streaming_content.ends_with("[Interrupted]") {
                s.streaming_content.push_str("\n[Interrupted]");
            }
            s.is_waiting
        });

        self.state.stop_waiting(&session_id);

        if was_waiting != Some(true) {
            return Vec::new();
        }

        let Some(runner) = self.registry.runner(&session_id) else {
            return Vec::new();
        };
        runner.interrupt().await;

        let messages = runner.messages();
        let config = self.config.clone();
        vec![Box::pin(async move {
            if let Err(err) = config.save_messages(&session_id, &messages).await {
                tracing::warn!(session_id, %err, "failed to persist interrupted session messages");
            }
            AppEvent::Noop
        })]
    }
}

fn first_text(blocks: &[ContentBlock]) -> Option<String> {
    blocks.iter().find_map(|block| match block {
        ContentBlock::Text(text) => Some(text.clone()),
        ContentBlock::Image { .. } => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_numbered_options_requires_at_least_two() {
        assert!(detect_numbered_options("1. only one item").is_empty());
        assert!(detect_numbered_options("no list here at all").is_empty());
    }

    #[test]
    fn test_detect_numbered_options_parses_consecutive_items() {
        let text = "Here are the choices:\n1. Use SQLite\n2. Use Postgres\n3. Use a flat file\n";
        let options = detect_numbered_options(text);
        assert_eq!(options, vec!["Use SQLite", "Use Postgres", "Use a flat file"]);
    }

    #[test]
    fn test_detect_numbered_options_ignores_non_consecutive_numbering() {
        let text = "1. First\n3. Skipped two\n";
        assert!(detect_numbered_options(text).is_empty());
    }

    #[test]
    fn test_flush_rollup_appends_tool_entries_before_text() {
        let mut state = SessionState::default();
        state.tool_use_rollup.push(ToolUseEntry {
            id: "t1".to_string(),
            tool: "bash".to_string(),
            input_preview: "ls".to_string(),
            result: Some("file.txt".to_string()),
        });
        flush_rollup(&mut state);

        assert!(state.tool_use_rollup.is_empty());
        assert!(state.streaming_content.contains("[bash] ls -> file.txt"));
    }

    #[test]
    fn test_first_text_skips_images() {
        let blocks = vec![
            ContentBlock::Image { data: "abc".to_string(), media_type: "image/png".to_string() },
            ContentBlock::Text("hello".to_string()),
        ];
        assert_eq!(first_text(&blocks), Some("hello".to_string()));
    }
}
