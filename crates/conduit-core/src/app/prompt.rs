//! Interactive Prompt FSM (spec §4.6): permission/question/plan-approval
//! requests surfaced mid-turn. Autonomous sessions auto-answer questions
//! (first option) and auto-approve plans, but never auto-answer a
//! permission request — those always wait for an explicit user response.

use tokio::sync::mpsc;

use crate::collab::runner::{
    PermissionRequest, PermissionResponse, PlanApprovalRequest, PlanApprovalResponse, QuestionRequest,
    QuestionResponse,
};

use super::event::{ready, AppEvent, Command};
use super::registry;
use super::App;

impl App {
    pub(crate) fn handle_permission_requested(
        &self,
        session_id: String,
        request: PermissionRequest,
        rx: mpsc::UnboundedReceiver<PermissionRequest>,
    ) -> Vec<Command> {
        if self.state.with(&session_id, |s| s.pending_permission = Some(request.clone())).is_none() {
            registry::drop_unknown_session("PermissionRequested", &session_id);
            return Vec::new();
        }

        tracing::debug!(session_id, tool = %request.tool, "permission requested");
        vec![super::listener::listen_permission(session_id, rx)]
    }

    pub(crate) fn handle_question_requested(
        &self,
        session_id: String,
        request: QuestionRequest,
        rx: mpsc::UnboundedReceiver<QuestionRequest>,
    ) -> Vec<Command> {
        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("QuestionRequested", &session_id);
            return Vec::new();
        };

        if self.state.with(&session_id, |s| s.pending_question = Some(request.clone())).is_none() {
            registry::drop_unknown_session("QuestionRequested", &session_id);
            return Vec::new();
        }

        let commands = vec![super::listener::listen_question(session_id.clone(), rx)];

        if session.autonomous {
            if let Some(first) = request.options.first().cloned() {
                if let Some(runner) = self.registry.runner(&session_id) {
                    runner.send_question_response(QuestionResponse { id: request.id, chosen_label: first });
                }
                self.state.with(&session_id, |s| s.pending_question = None);
                tracing::info!(session_id, "auto-answered question for autonomous session");
            }
        }

        commands
    }

    pub(crate) fn handle_plan_approval_requested(
        &self,
        session_id: String,
        request: PlanApprovalRequest,
        rx: mpsc::UnboundedReceiver<PlanApprovalRequest>,
    ) -> Vec<Command> {
        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("PlanApprovalRequested", &session_id);
            return Vec::new();
        };

        if self.state.with(&session_id, |s| s.pending_plan_approval = Some(request.clone())).is_none() {
            registry::drop_unknown_session("PlanApprovalRequested", &session_id);
            return Vec::new();
        }

        let commands = vec![super::listener::listen_plan_approval(session_id.clone(), rx)];

        if session.autonomous {
            if let Some(runner) = self.registry.runner(&session_id) {
                runner.send_plan_approval_response(PlanApprovalResponse { id: request.id, approved: true });
            }
            self.state.with(&session_id, |s| s.pending_plan_approval = None);
            tracing::info!(session_id, "auto-approved plan for autonomous session");
        }

        commands
    }

    pub(crate) fn handle_respond_permission(&self, session_id: String, response: PermissionResponse) -> Vec<Command> {
        let Some(request) = self.state.with(&session_id, |s| s.pending_permission.take()).flatten() else {
            registry::drop_unknown_session("RespondPermission", &session_id);
            return Vec::new();
        };

        if let Some(runner) = self.registry.runner(&session_id) {
            runner.send_permission_response(response, &request.id);
        }

        if response.allowed && response.always {
            return vec![ready(AppEvent::AddAllowedTool { session_id, tool: request.tool })];
        }

        Vec::new()
    }

    pub(crate) fn handle_respond_question(&self, session_id: String, response: QuestionResponse) -> Vec<Command> {
        if self.state.with(&session_id, |s| s.pending_question.take()).flatten().is_none() {
            registry::drop_unknown_session("RespondQuestion", &session_id);
            return Vec::new();
        }

        if let Some(runner) = self.registry.runner(&session_id) {
            runner.send_question_response(response);
        }

        Vec::new()
    }

    pub(crate) fn handle_respond_plan_approval(&self, session_id: String, response: PlanApprovalResponse) -> Vec<Command> {
        if self.state.with(&session_id, |s| s.pending_plan_approval.take()).flatten().is_none() {
            registry::drop_unknown_session("RespondPlanApproval", &session_id);
            return Vec::new();
        }

        if let Some(runner) = self.registry.runner(&session_id) {
            runner.send_plan_approval_response(response);
        }

        Vec::new()
    }
}
