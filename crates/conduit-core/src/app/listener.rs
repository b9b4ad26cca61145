//! Listener Mesh (spec §4.4): one `Command` per `(session, channel)` pair,
//! blocking on a single channel receive and carrying the receiver back so
//! the handler can re-arm it. Every `listen_*` constructor here is the only
//! place a channel of its kind is ever listened on — centralizing this is
//! what keeps the re-arm invariant enforceable in one place (SPEC_FULL §9).

use tokio::sync::mpsc;

use crate::collab::git::ProgressLine;
use crate::collab::runner::{
    CreateChildRequest, CreatePrRequest, GetReviewCommentsRequest, ListChildrenRequest, MergeChildRequest,
    PermissionRequest, PlanApprovalRequest, PushBranchRequest, QuestionRequest, ResponseChunk,
};

use super::event::AppEvent;
use super::Command;

pub fn listen_response(session_id: String, mut rx: mpsc::UnboundedReceiver<ResponseChunk>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(chunk) => AppEvent::ResponseChunk { session_id, chunk, rx },
            None => AppEvent::ResponseChannelClosed { session_id },
        }
    })
}

pub fn listen_permission(session_id: String, mut rx: mpsc::UnboundedReceiver<PermissionRequest>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(request) => AppEvent::PermissionRequested { session_id, request, rx },
            None => AppEvent::DurableChannelClosed { session_id, channel: "permission" },
        }
    })
}

pub fn listen_question(session_id: String, mut rx: mpsc::UnboundedReceiver<QuestionRequest>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(request) => AppEvent::QuestionRequested { session_id, request, rx },
            None => AppEvent::DurableChannelClosed { session_id, channel: "question" },
        }
    })
}

pub fn listen_plan_approval(session_id: String, mut rx: mpsc::UnboundedReceiver<PlanApprovalRequest>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(request) => AppEvent::PlanApprovalRequested { session_id, request, rx },
            None => AppEvent::DurableChannelClosed { session_id, channel: "plan_approval" },
        }
    })
}

pub fn listen_create_child(session_id: String, mut rx: mpsc::UnboundedReceiver<CreateChildRequest>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(request) => AppEvent::CreateChildRequested { session_id, request, rx },
            None => AppEvent::DurableChannelClosed { session_id, channel: "create_child" },
        }
    })
}

pub fn listen_list_children(session_id: String, mut rx: mpsc::UnboundedReceiver<ListChildrenRequest>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(request) => AppEvent::ListChildrenRequested { session_id, request, rx },
            None => AppEvent::DurableChannelClosed { session_id, channel: "list_children" },
        }
    })
}

pub fn listen_merge_child(session_id: String, mut rx: mpsc::UnboundedReceiver<MergeChildRequest>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(request) => AppEvent::MergeChildRequested { session_id, request, rx },
            None => AppEvent::DurableChannelClosed { session_id, channel: "merge_child" },
        }
    })
}

pub fn listen_create_pr(session_id: String, mut rx: mpsc::UnboundedReceiver<CreatePrRequest>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(request) => AppEvent::CreatePrRequested { session_id, request, rx },
            None => AppEvent::DurableChannelClosed { session_id, channel: "create_pr" },
        }
    })
}

pub fn listen_push_branch(session_id: String, mut rx: mpsc::UnboundedReceiver<PushBranchRequest>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(request) => AppEvent::PushBranchRequested { session_id, request, rx },
            None => AppEvent::DurableChannelClosed { session_id, channel: "push_branch" },
        }
    })
}

pub fn listen_get_review_comments(
    session_id: String,
    mut rx: mpsc::UnboundedReceiver<GetReviewCommentsRequest>,
) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(request) => AppEvent::GetReviewCommentsRequested { session_id, request, rx },
            None => AppEvent::DurableChannelClosed { session_id, channel: "get_review_comments" },
        }
    })
}

pub fn listen_merge_progress(session_id: String, mut rx: mpsc::UnboundedReceiver<ProgressLine>) -> Command {
    Box::pin(async move {
        match rx.recv().await {
            Some(line) => AppEvent::MergeProgress { session_id, line, rx },
            None => AppEvent::MergeDone { session_id },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listen_response_returns_closed_event_when_channel_drops() {
        let (tx, rx) = mpsc::unbounded_channel::<ResponseChunk>();
        drop(tx);

        let event = listen_response("s1".to_string(), rx).await;

        assert!(matches!(event, AppEvent::ResponseChannelClosed { session_id } if session_id == "s1"));
    }

    #[tokio::test]
    async fn test_listen_response_returns_chunk_and_reusable_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<ResponseChunk>();
        tx.send(ResponseChunk::Text { content: "hi".to_string() }).unwrap();

        let event = listen_response("s1".to_string(), rx).await;

        match event {
            AppEvent::ResponseChunk { rx, .. } => {
                // The returned receiver is the same durable channel: a
                // second send is still observable on it.
                tx.send(ResponseChunk::Done).unwrap();
                drop(tx);
                let next = listen_response("s1".to_string(), rx).await;
                assert!(matches!(next, AppEvent::ResponseChunk { chunk: ResponseChunk::Done, .. }));
            }
            _ => panic!("expected ResponseChunk"),
        }
    }
}
