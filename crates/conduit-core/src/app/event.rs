//! The event taxonomy the single-writer loop consumes (spec §4.3).
//!
//! Listener-sourced variants carry the channel receiver they were produced
//! from back to the handler, so re-arming a listener is just handing the
//! receiver to a fresh listener `Command` — see `app::listener`.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::collab::git::{CiStatus, ReviewComment, ReviewDecision};
use crate::collab::runner::{
    ContentBlock, CreateChildRequest, CreatePrRequest, GetReviewCommentsRequest, ListChildrenRequest,
    MergeChildRequest, PermissionRequest, PermissionResponse, PlanApprovalRequest, PlanApprovalResponse,
    PushBranchRequest, QuestionRequest, QuestionResponse, ResponseChunk,
};
use crate::domain::session::Session;

use super::state::MergeType;

/// A scheduled side-effecting thunk. Handlers return zero or more of these;
/// the run loop spawns each one and feeds its resulting event back into the
/// same inbox. Commands do I/O only — they never touch shared state.
pub type Command = std::pin::Pin<Box<dyn std::future::Future<Output = AppEvent> + Send>>;

pub enum AppEvent {
    // --- Listener mesh: per-turn response stream ---
    ResponseChunk { session_id: String, chunk: ResponseChunk, rx: mpsc::UnboundedReceiver<ResponseChunk> },
    ResponseChannelClosed { session_id: String },

    // --- Listener mesh: durable interactive-prompt channels ---
    PermissionRequested { session_id: String, request: PermissionRequest, rx: mpsc::UnboundedReceiver<PermissionRequest> },
    QuestionRequested { session_id: String, request: QuestionRequest, rx: mpsc::UnboundedReceiver<QuestionRequest> },
    PlanApprovalRequested { session_id: String, request: PlanApprovalRequest, rx: mpsc::UnboundedReceiver<PlanApprovalRequest> },
    DurableChannelClosed { session_id: String, channel: &'static str },

    // --- Listener mesh: supervisor / host-tool channels ---
    CreateChildRequested { session_id: String, request: CreateChildRequest, rx: mpsc::UnboundedReceiver<CreateChildRequest> },
    ListChildrenRequested { session_id: String, request: ListChildrenRequest, rx: mpsc::UnboundedReceiver<ListChildrenRequest> },
    MergeChildRequested { session_id: String, request: MergeChildRequest, rx: mpsc::UnboundedReceiver<MergeChildRequest> },
    CreatePrRequested { session_id: String, request: CreatePrRequest, rx: mpsc::UnboundedReceiver<CreatePrRequest> },
    PushBranchRequested { session_id: String, request: PushBranchRequest, rx: mpsc::UnboundedReceiver<PushBranchRequest> },
    GetReviewCommentsRequested { session_id: String, request: GetReviewCommentsRequest, rx: mpsc::UnboundedReceiver<GetReviewCommentsRequest> },
    MergeChildComplete { session_id: String, child_session_id: String, request_id: String, result: Result<(), String> },

    /// A supervisor's `create_child` host tool finished provisioning the new
    /// session's worktree/registry entry and needs its runner instantiated
    /// and initial prompt sent.
    ChildSessionCreated { supervisor_id: String, request_id: String, child: Session },

    // --- User-initiated actions ---
    Send { session_id: String, blocks: Vec<ContentBlock> },
    Interrupt { session_id: String },
    RespondPermission { session_id: String, response: PermissionResponse },
    RespondQuestion { session_id: String, response: QuestionResponse },
    RespondPlanApproval { session_id: String, response: PlanApprovalResponse },
    AddAllowedTool { session_id: String, tool: String },
    DeleteSession { session_id: String },
    ExploreOptions { session_id: String },

    // --- Merge / push / conflict flow ---
    StartMerge { session_id: String, merge_type: MergeType },
    MergeProgress { session_id: String, line: crate::collab::git::ProgressLine, rx: mpsc::UnboundedReceiver<crate::collab::git::ProgressLine> },
    MergeDone { session_id: String },
    MergeError { session_id: String, conflicted_files: Vec<String>, message: String },

    // --- Autonomous pipeline ---
    SessionCompleted { session_id: String },
    SessionPipelineComplete { session_id: String, tests_passed: bool },
    AutonomousLimitReached { session_id: String },
    SendPendingMessage { session_id: String },

    // --- Auto-merge state machine ---
    StartAutoMergePoll { session_id: String, attempt: u32 },
    AutoMergePollResult {
        session_id: String,
        review: ReviewDecision,
        comments: u32,
        review_comments: Vec<ReviewComment>,
        ci: CiStatus,
        attempt: u32,
    },
    AutoMergeResult { session_id: String, result: Result<(), String> },

    // --- Broadcast & bulk ops ---
    CreateBroadcastSessions { repos: Vec<PathBuf>, prompt: String, name: Option<String> },
    BroadcastSessionsCreated { group_id: String, sessions: Vec<Session> },
    CreatePRsForSessions { session_ids: Vec<String> },
    BulkDeleteSessions { session_ids: Vec<String> },

    // --- PR poller ---
    PrPollTick,
    PrPollResult { session_id: String, state: crate::collab::git::PrState, comment_count: u32 },

    // --- Misc ---
    CommitMessageGenerated { session_id: String, message: String },
    TerminalError { session_id: Option<String>, message: String },
    /// A `Command` whose only purpose was a side effect (persistence, a
    /// reply sent directly to a runner) and that has no further event to
    /// report back into the loop.
    Noop,
}

/// Wraps an already-known event in an immediately-ready `Command`, for
/// handlers that want to re-enter the loop without spawning real I/O.
pub fn ready(event: AppEvent) -> Command {
    Box::pin(async move { event })
}
