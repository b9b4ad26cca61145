//! The `Runner` contract (spec §6): one per session, driving the external
//! AI coding assistant process and exposing its durable request channels.
//!
//! Generalizes the teacher's provider-agnostic turn-execution interface
//! (see `DESIGN.md`) with the permission/question/plan-approval and
//! optional supervisor/host-tool channels the CORE's listener mesh needs.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// One chunk of a runner's streamed turn response.
#[derive(Debug, Clone)]
pub enum ResponseChunk {
    Text { content: String },
    ToolUse { tool: String, input: serde_json::Value, id: String },
    ToolResult { id: String, result_info: String },
    TodoUpdate { list: Vec<String> },
    StreamStats { turns: u32, tokens: u64 },
    SubagentStatus { model: String },
    PermissionDenials { denials: Vec<String> },
    Error { message: String },
    Done,
}

/// A persisted conversation turn, either from the user or the assistant.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single content block sent to the runner: text or a base64 image.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    Image { data: String, media_type: String },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct McpServer {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
}

/// A tool-permission request surfaced by a runner mid-turn.
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    pub id: String,
    pub tool: String,
    pub input_preview: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionResponse {
    pub allowed: bool,
    pub always: bool,
}

/// A clarification question the runner needs answered before continuing.
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QuestionResponse {
    pub id: String,
    pub chosen_label: String,
}

/// A proposed plan awaiting user approval before the runner executes it.
#[derive(Debug, Clone)]
pub struct PlanApprovalRequest {
    pub id: String,
    pub plan_text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PlanApprovalResponse {
    pub id: String,
    pub approved: bool,
}

/// Supervisor-only tool call: ask the host to spin up a child session.
#[derive(Debug, Clone)]
pub struct CreateChildRequest {
    pub id: String,
    pub prompt: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListChildrenRequest {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct MergeChildRequest {
    pub id: String,
    pub child_session_id: String,
}

#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct PushBranchRequest {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct GetReviewCommentsRequest {
    pub id: String,
}

/// Correlated reply sent back to a runner for any of its request channels,
/// identified by the original request `id`.
#[derive(Debug, Clone)]
pub struct HostToolResponse {
    pub id: String,
    pub payload: serde_json::Value,
}

/// The per-session driver of an external AI CLI. Implementations own
/// stdin/stdout (or an app-server RPC transport) and translate it into the
/// durable channels below.
///
/// Optional capability channels return `None` when the runner does not
/// support that feature; the listener mesh only installs a listener for a
/// channel whose accessor returns `Some`.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Runner: Send + Sync {
    /// Streams the response of one turn; the channel closes on completion or
    /// cancellation.
    async fn send_content(&self, blocks: Vec<ContentBlock>) -> mpsc::UnboundedReceiver<ResponseChunk>;

    /// Cancels the in-flight turn, if any.
    async fn interrupt(&self);

    /// Tears the runner down. Durable channel accessors return `None` after
    /// this resolves.
    async fn stop(&self);

    fn is_streaming(&self) -> bool;

    fn messages(&self) -> Vec<Message>;

    fn add_assistant_message(&self, text: &str);

    fn session_started(&self) -> bool;

    fn set_allowed_tools(&self, tools: Vec<String>);

    fn add_allowed_tool(&self, tool: String);

    fn set_mcp_servers(&self, servers: Vec<McpServer>);

    fn fork_from_session_id(&self) -> Option<String>;

    fn permission_request_chan(&self) -> Option<mpsc::UnboundedReceiver<PermissionRequest>>;

    fn question_request_chan(&self) -> Option<mpsc::UnboundedReceiver<QuestionRequest>>;

    fn plan_approval_request_chan(&self) -> Option<mpsc::UnboundedReceiver<PlanApprovalRequest>>;

    /// `None` unless this runner drives a supervisor-class session.
    fn create_child_request_chan(&self) -> Option<mpsc::UnboundedReceiver<CreateChildRequest>>;

    fn list_children_request_chan(&self) -> Option<mpsc::UnboundedReceiver<ListChildrenRequest>>;

    fn merge_child_request_chan(&self) -> Option<mpsc::UnboundedReceiver<MergeChildRequest>>;

    fn create_pr_request_chan(&self) -> Option<mpsc::UnboundedReceiver<CreatePrRequest>>;

    fn push_branch_request_chan(&self) -> Option<mpsc::UnboundedReceiver<PushBranchRequest>>;

    fn get_review_comments_request_chan(&self) -> Option<mpsc::UnboundedReceiver<GetReviewCommentsRequest>>;

    fn send_permission_response(&self, response: PermissionResponse, request_id: &str);

    fn send_question_response(&self, response: QuestionResponse);

    fn send_plan_approval_response(&self, response: PlanApprovalResponse);

    fn send_host_tool_response(&self, response: HostToolResponse);
}

/// Constructs a [`Runner`] bound to one session's worktree. The session
/// registry calls this exactly once per session id, the first time a caller
/// needs that session's runner (spec §4.1 "GetOrCreateRunner").
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait RunnerFactory: Send + Sync {
    async fn create(
        &self,
        session: &crate::domain::session::Session,
    ) -> Result<std::sync::Arc<dyn Runner>, crate::core::error::CoreError>;
}
