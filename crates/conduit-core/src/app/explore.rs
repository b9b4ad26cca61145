//! Parallel Option Exploration (spec §4.9).
//!
//! Triggered by `ExploreOptions` after a `done` chunk populated
//! `detected_options` (see `app::send::detect_numbered_options`). Generates
//! one branch-safe name per option in a single collaborator call, forks the
//! current session once per option from the parent's branch, copies the
//! parent's message history into each fork verbatim, and sends each child
//! "Let's go with option K: …". Selecting the first new child as active is
//! left to the caller, same as broadcast session creation.

use crate::collab::runner::ContentBlock;
use crate::domain::session::{now_unix, Session, SessionSize, SessionStats, Status, SESSION_DATA_DIR};

use super::event::Command;
use super::registry;
use super::App;

fn fallback_branch_names(count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("conduit/option-{n}")).collect()
}

impl App {
    pub(crate) async fn handle_explore_options(&self, session_id: String) -> Vec<Command> {
        let Some(session) = self.registry.session(&session_id) else {
            registry::drop_unknown_session("ExploreOptions", &session_id);
            return Vec::new();
        };

        let options = self.state.with(&session_id, |s| s.detected_options.clone()).unwrap_or_default();
        if options.len() < 2 {
            tracing::debug!(session_id, "explore requested with fewer than two detected options, ignoring");
            return Vec::new();
        }

        let branch_names = match self.git.generate_branch_names_from_options(&options).await {
            Ok(names) if names.len() == options.len() => names,
            Ok(_) => {
                tracing::warn!(session_id, "branch name generator returned a mismatched count, falling back to option index");
                fallback_branch_names(options.len())
            }
            Err(err) => {
                tracing::warn!(session_id, %err, "failed to generate branch names for exploration, falling back to option index");
                fallback_branch_names(options.len())
            }
        };

        let parent_messages = match self.config.load_messages(&session_id).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(session_id, %err, "failed to load parent history for exploration, children start empty");
                Vec::new()
            }
        };

        let mut children = Vec::with_capacity(options.len());
        for (index, (option_text, branch)) in options.iter().zip(branch_names.iter()).enumerate() {
            let child_id = uuid::Uuid::new_v4().to_string();
            children.push(Session {
                id: child_id.clone(),
                repo_path: session.repo_path.clone(),
                work_tree: session.repo_path.join(SESSION_DATA_DIR).join(&child_id),
                branch: branch.clone(),
                base_branch: session.branch.clone(),
                name: Some(format!("Option {}: {option_text}", index + 1)),
                created_at: now_unix(),
                updated_at: now_unix(),
                started: false,
                autonomous: session.autonomous,
                is_supervisor: false,
                supervisor_id: None,
                parent_id: Some(session.id.clone()),
                workspace_id: session.workspace_id.clone(),
                broadcast_group_id: None,
                containerized: session.containerized,
                issue_ref: session.issue_ref.clone(),
                merged: false,
                merged_to_parent: false,
                pr_created: false,
                pr_merged: false,
                pr_closed: false,
                pr_comment_count: 0,
                pr_comments_addressed_count: 0,
                model: session.model,
                size: SessionSize::default(),
                stats: SessionStats::default(),
                status: Status::New,
                summary: None,
                prompt: format!("Let's go with option {}: {option_text}", index + 1),
            });
        }

        for child in &children {
            self.registry.insert_session_snapshot(child.clone());
            if let Err(err) = self.config.save_session(child).await {
                tracing::warn!(session_id = %child.id, %err, "failed to persist forked session");
            }
            if let Err(err) = self.config.save_messages(&child.id, &parent_messages).await {
                tracing::warn!(session_id = %child.id, %err, "failed to copy parent history to forked session");
            }
        }

        tracing::info!(session_id, children = children.len(), "forked session for parallel option exploration");

        let mut commands = Vec::new();
        for child in &children {
            let prompt = child.prompt.clone();
            commands.extend(self.send_turn(child, vec![ContentBlock::Text(prompt)]).await);
        }

        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_branch_names_produces_one_per_option() {
        let names = fallback_branch_names(3);
        assert_eq!(names, vec!["conduit/option-1", "conduit/option-2", "conduit/option-3"]);
        assert_eq!(names.len(), names.iter().collect::<std::collections::HashSet<_>>().len());
    }
}
