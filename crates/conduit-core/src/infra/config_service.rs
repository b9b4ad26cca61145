//! `SQLite`-backed [`ConfigService`] (spec §6, §10.3), layered on top of the
//! same [`Database`] connection pool `infra::db` already opens, via its own
//! `conduit_*` tables (see `migrations/0001_init.sql`).

use std::path::{Path, PathBuf};

use sqlx::Row;

use crate::collab::config::{ConfigService, GlobalSettings, RepoSettings};
use crate::collab::runner::{Message, MessageRole, McpServer};
use crate::core::error::CoreError;
use crate::domain::agent::AgentModel;
use crate::domain::session::{Session, SessionSize, SessionStats, Status};
use crate::infra::db::Database;

pub struct SqliteConfigService {
    db: Database,
}

impl SqliteConfigService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn map_err(session_id: &str, err: sqlx::Error) -> CoreError {
        CoreError::transient(session_id.to_string(), err)
    }
}

fn repo_row_to_settings(
    repo_path: String,
    allowed_tools: String,
    mcp_servers: String,
    use_containers: bool,
    auto_merge: bool,
    test_command: Option<String>,
    test_retries: i64,
    asana_project_id: Option<String>,
    linear_team_id: Option<String>,
) -> Result<RepoSettings, CoreError> {
    let allowed_tools: Vec<String> = serde_json::from_str(&allowed_tools)
        .map_err(|err| CoreError::Invariant(format!("corrupt allowed_tools column: {err}")))?;
    let mcp_servers: Vec<McpServer> = serde_json::from_str(&mcp_servers)
        .map_err(|err| CoreError::Invariant(format!("corrupt mcp_servers column: {err}")))?;

    Ok(RepoSettings {
        repo_path: PathBuf::from(repo_path),
        allowed_tools,
        mcp_servers,
        use_containers,
        auto_merge,
        test_command,
        test_retries: u32::try_from(test_retries).unwrap_or(0),
        asana_project_id,
        linear_team_id,
    })
}

#[async_trait::async_trait]
impl ConfigService for SqliteConfigService {
    async fn repos(&self) -> Result<Vec<RepoSettings>, CoreError> {
        let rows = sqlx::query(
            "SELECT repo_path, allowed_tools, mcp_servers, use_containers, auto_merge, \
             test_command, test_retries, asana_project_id, linear_team_id \
             FROM conduit_repo_setting ORDER BY repo_path",
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(|err| Self::map_err("<repos>", err))?;

        rows.into_iter()
            .map(|row| {
                repo_row_to_settings(
                    row.get("repo_path"),
                    row.get("allowed_tools"),
                    row.get("mcp_servers"),
                    row.get("use_containers"),
                    row.get("auto_merge"),
                    row.get("test_command"),
                    row.get("test_retries"),
                    row.get("asana_project_id"),
                    row.get("linear_team_id"),
                )
            })
            .collect()
    }

    async fn repo_settings(&self, repo_path: &Path) -> Result<RepoSettings, CoreError> {
        let path_str = repo_path.to_string_lossy().to_string();

        let row = sqlx::query(
            "SELECT repo_path, allowed_tools, mcp_servers, use_containers, auto_merge, \
             test_command, test_retries, asana_project_id, linear_team_id \
             FROM conduit_repo_setting WHERE repo_path = ?1",
        )
        .bind(&path_str)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|err| Self::map_err(&path_str, err))?;

        match row {
            Some(row) => repo_row_to_settings(
                row.get("repo_path"),
                row.get("allowed_tools"),
                row.get("mcp_servers"),
                row.get("use_containers"),
                row.get("auto_merge"),
                row.get("test_command"),
                row.get("test_retries"),
                row.get("asana_project_id"),
                row.get("linear_team_id"),
            ),
            None => Ok(RepoSettings {
                repo_path: PathBuf::from(path_str),
                allowed_tools: Vec::new(),
                mcp_servers: Vec::new(),
                use_containers: false,
                auto_merge: false,
                test_command: None,
                test_retries: 0,
                asana_project_id: None,
                linear_team_id: None,
            }),
        }
    }

    async fn set_allowed_tools(&self, repo_path: &Path, tools: Vec<String>) -> Result<(), CoreError> {
        let path_str = repo_path.to_string_lossy().to_string();
        let tools_json = serde_json::to_string(&tools)
            .map_err(|err| CoreError::Invariant(format!("failed to serialize allowed tools: {err}")))?;

        sqlx::query(
            "INSERT INTO conduit_repo_setting (repo_path, allowed_tools) VALUES (?1, ?2) \
             ON CONFLICT(repo_path) DO UPDATE SET allowed_tools = excluded.allowed_tools",
        )
        .bind(&path_str)
        .bind(tools_json)
        .execute(self.db.pool())
        .await
        .map_err(|err| Self::map_err(&path_str, err))?;

        Ok(())
    }

    async fn global_settings(&self) -> Result<GlobalSettings, CoreError> {
        let row = sqlx::query(
            "SELECT notifications_enabled, auto_broadcast_pr, auto_cleanup_merged, \
             auto_address_pr_comments, default_branch_prefix, max_autonomous_turns, \
             max_autonomous_duration_secs, active_workspace_id \
             FROM conduit_global_setting WHERE id = 1",
        )
        .fetch_optional(self.db.pool())
        .await
        .map_err(|err| Self::map_err("<global_settings>", err))?;

        let Some(row) = row else {
            return Ok(GlobalSettings::default());
        };

        let max_autonomous_turns: i64 = row.get("max_autonomous_turns");
        let max_autonomous_duration_secs: i64 = row.get("max_autonomous_duration_secs");

        Ok(GlobalSettings {
            notifications_enabled: row.get("notifications_enabled"),
            auto_broadcast_pr: row.get("auto_broadcast_pr"),
            auto_cleanup_merged: row.get("auto_cleanup_merged"),
            auto_address_pr_comments: row.get("auto_address_pr_comments"),
            default_branch_prefix: row.get("default_branch_prefix"),
            max_autonomous_turns: u32::try_from(max_autonomous_turns).unwrap_or(u32::MAX),
            max_autonomous_duration_secs: u64::try_from(max_autonomous_duration_secs).unwrap_or(u64::MAX),
            active_workspace_id: row.get("active_workspace_id"),
        })
    }

    async fn save_global_settings(&self, settings: GlobalSettings) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO conduit_global_setting \
             (id, notifications_enabled, auto_broadcast_pr, auto_cleanup_merged, \
              auto_address_pr_comments, default_branch_prefix, max_autonomous_turns, \
              max_autonomous_duration_secs, active_workspace_id) \
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(id) DO UPDATE SET \
               notifications_enabled = excluded.notifications_enabled, \
               auto_broadcast_pr = excluded.auto_broadcast_pr, \
               auto_cleanup_merged = excluded.auto_cleanup_merged, \
               auto_address_pr_comments = excluded.auto_address_pr_comments, \
               default_branch_prefix = excluded.default_branch_prefix, \
               max_autonomous_turns = excluded.max_autonomous_turns, \
               max_autonomous_duration_secs = excluded.max_autonomous_duration_secs, \
               active_workspace_id = excluded.active_workspace_id",
        )
        .bind(settings.notifications_enabled)
        .bind(settings.auto_broadcast_pr)
        .bind(settings.auto_cleanup_merged)
        .bind(settings.auto_address_pr_comments)
        .bind(settings.default_branch_prefix)
        .bind(i64::from(settings.max_autonomous_turns))
        .bind(i64::try_from(settings.max_autonomous_duration_secs).unwrap_or(i64::MAX))
        .bind(settings.active_workspace_id)
        .execute(self.db.pool())
        .await
        .map_err(|err| Self::map_err("<global_settings>", err))?;

        Ok(())
    }

    async fn save_session(&self, session: &Session) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO conduit_session \
             (id, repo_path, work_tree, branch, base_branch, name, created_at, updated_at, \
              started, autonomous, is_supervisor, supervisor_id, parent_id, workspace_id, \
              broadcast_group_id, containerized, issue_ref, merged, merged_to_parent, \
              pr_created, pr_merged, pr_closed, pr_comment_count, pr_comments_addressed_count, \
              model, size, input_tokens, output_tokens, status, summary, prompt) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,\
                     ?22,?23,?24,?25,?26,?27,?28,?29,?30,?31) \
             ON CONFLICT(id) DO UPDATE SET \
               repo_path=excluded.repo_path, work_tree=excluded.work_tree, branch=excluded.branch, \
               base_branch=excluded.base_branch, name=excluded.name, updated_at=excluded.updated_at, \
               started=excluded.started, autonomous=excluded.autonomous, \
               is_supervisor=excluded.is_supervisor, supervisor_id=excluded.supervisor_id, \
               parent_id=excluded.parent_id, workspace_id=excluded.workspace_id, \
               broadcast_group_id=excluded.broadcast_group_id, containerized=excluded.containerized, \
               issue_ref=excluded.issue_ref, merged=excluded.merged, \
               merged_to_parent=excluded.merged_to_parent, pr_created=excluded.pr_created, \
               pr_merged=excluded.pr_merged, pr_closed=excluded.pr_closed, \
               pr_comment_count=excluded.pr_comment_count, \
               pr_comments_addressed_count=excluded.pr_comments_addressed_count, \
               model=excluded.model, size=excluded.size, input_tokens=excluded.input_tokens, \
               output_tokens=excluded.output_tokens, status=excluded.status, \
               summary=excluded.summary, prompt=excluded.prompt",
        )
        .bind(&session.id)
        .bind(session.repo_path.to_string_lossy().to_string())
        .bind(session.work_tree.to_string_lossy().to_string())
        .bind(&session.branch)
        .bind(&session.base_branch)
        .bind(&session.name)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.started)
        .bind(session.autonomous)
        .bind(session.is_supervisor)
        .bind(&session.supervisor_id)
        .bind(&session.parent_id)
        .bind(&session.workspace_id)
        .bind(&session.broadcast_group_id)
        .bind(session.containerized)
        .bind(&session.issue_ref)
        .bind(session.merged)
        .bind(session.merged_to_parent)
        .bind(session.pr_created)
        .bind(session.pr_merged)
        .bind(session.pr_closed)
        .bind(i64::from(session.pr_comment_count))
        .bind(i64::from(session.pr_comments_addressed_count))
        .bind(session.model.as_str())
        .bind(session.size.label())
        .bind(i64::try_from(session.stats.input_tokens).unwrap_or(i64::MAX))
        .bind(i64::try_from(session.stats.output_tokens).unwrap_or(i64::MAX))
        .bind(session.status.to_string())
        .bind(&session.summary)
        .bind(&session.prompt)
        .execute(self.db.pool())
        .await
        .map_err(|err| Self::map_err(&session.id, err))?;

        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM conduit_session WHERE id = ?1")
            .bind(session_id)
            .execute(self.db.pool())
            .await
            .map_err(|err| Self::map_err(session_id, err))?;

        Ok(())
    }

    async fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, CoreError> {
        let rows = sqlx::query("SELECT role, content FROM conduit_message WHERE session_id = ?1 ORDER BY position")
            .bind(session_id)
            .fetch_all(self.db.pool())
            .await
            .map_err(|err| Self::map_err(session_id, err))?;

        rows.into_iter()
            .map(|row| {
                let role: String = row.get("role");
                let role = match role.as_str() {
                    "user" => MessageRole::User,
                    "assistant" => MessageRole::Assistant,
                    other => {
                        return Err(CoreError::Invariant(format!("unknown message role: {other}")));
                    }
                };
                Ok(Message { role, content: row.get("content") })
            })
            .collect()
    }

    async fn save_messages(&self, session_id: &str, messages: &[Message]) -> Result<(), CoreError> {
        let mut tx = sqlx::Acquire::acquire(self.db.pool())
            .await
            .map_err(|err| Self::map_err(session_id, err))?;

        sqlx::query("DELETE FROM conduit_message WHERE session_id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|err| Self::map_err(session_id, err))?;

        for (position, message) in messages.iter().enumerate() {
            let role = match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };

            sqlx::query(
                "INSERT INTO conduit_message (session_id, position, role, content) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(session_id)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(role)
            .bind(&message.content)
            .execute(&mut *tx)
            .await
            .map_err(|err| Self::map_err(session_id, err))?;
        }

        Ok(())
    }

    async fn delete_messages(&self, session_id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM conduit_message WHERE session_id = ?1")
            .bind(session_id)
            .execute(self.db.pool())
            .await
            .map_err(|err| Self::map_err(session_id, err))?;

        Ok(())
    }
}

/// Reconstructs a [`Session`] from a `conduit_session` row. Exposed for
/// callers (e.g. the session registry on startup) that need to rehydrate
/// every persisted session rather than load one at a time.
pub async fn load_all_sessions(db: &Database) -> Result<Vec<Session>, CoreError> {
    let rows = sqlx::query(
        "SELECT id, repo_path, work_tree, branch, base_branch, name, created_at, updated_at, \
         started, autonomous, is_supervisor, supervisor_id, parent_id, workspace_id, \
         broadcast_group_id, containerized, issue_ref, merged, merged_to_parent, pr_created, \
         pr_merged, pr_closed, pr_comment_count, pr_comments_addressed_count, model, size, \
         input_tokens, output_tokens, status, summary, prompt \
         FROM conduit_session",
    )
    .fetch_all(db.pool())
    .await
    .map_err(|err| CoreError::transient("<load_all_sessions>", err))?;

    rows.into_iter()
        .map(|row| {
            let model: String = row.get("model");
            let model = model
                .parse::<AgentModel>()
                .map_err(CoreError::Invariant)?;
            let size: String = row.get("size");
            let size = size.parse::<SessionSize>().map_err(CoreError::Invariant)?;
            let status: String = row.get("status");
            let status = status.parse::<Status>().map_err(CoreError::Invariant)?;
            let input_tokens: i64 = row.get("input_tokens");
            let output_tokens: i64 = row.get("output_tokens");
            let pr_comment_count: i64 = row.get("pr_comment_count");
            let pr_comments_addressed_count: i64 = row.get("pr_comments_addressed_count");

            Ok(Session {
                id: row.get("id"),
                repo_path: PathBuf::from(row.get::<String, _>("repo_path")),
                work_tree: PathBuf::from(row.get::<String, _>("work_tree")),
                branch: row.get("branch"),
                base_branch: row.get("base_branch"),
                name: row.get("name"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                started: row.get("started"),
                autonomous: row.get("autonomous"),
                is_supervisor: row.get("is_supervisor"),
                supervisor_id: row.get("supervisor_id"),
                parent_id: row.get("parent_id"),
                workspace_id: row.get("workspace_id"),
                broadcast_group_id: row.get("broadcast_group_id"),
                containerized: row.get("containerized"),
                issue_ref: row.get("issue_ref"),
                merged: row.get("merged"),
                merged_to_parent: row.get("merged_to_parent"),
                pr_created: row.get("pr_created"),
                pr_merged: row.get("pr_merged"),
                pr_closed: row.get("pr_closed"),
                pr_comment_count: u32::try_from(pr_comment_count).unwrap_or(0),
                pr_comments_addressed_count: u32::try_from(pr_comments_addressed_count).unwrap_or(0),
                model,
                size,
                stats: SessionStats {
                    input_tokens: u64::try_from(input_tokens).unwrap_or(0),
                    output_tokens: u64::try_from(output_tokens).unwrap_or(0),
                },
                status,
                summary: row.get("summary"),
                prompt: row.get("prompt"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            repo_path: PathBuf::from("/repo"),
            work_tree: PathBuf::from("/repo/.conduit/s1"),
            branch: "conduit/s1".to_string(),
            base_branch: "main".to_string(),
            name: Some("demo".to_string()),
            created_at: 1,
            updated_at: 1,
            started: true,
            autonomous: false,
            is_supervisor: false,
            supervisor_id: None,
            parent_id: None,
            workspace_id: None,
            broadcast_group_id: None,
            containerized: false,
            issue_ref: None,
            merged: false,
            merged_to_parent: false,
            pr_created: false,
            pr_merged: false,
            pr_closed: false,
            pr_comment_count: 0,
            pr_comments_addressed_count: 0,
            model: AgentModel::default(),
            size: SessionSize::default(),
            stats: SessionStats::default(),
            status: Status::New,
            summary: None,
            prompt: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_session_round_trips() {
        let db = Database::open_in_memory().await.expect("open in-memory db");
        let config = SqliteConfigService::new(db.clone());

        config.save_session(&test_session("s1")).await.expect("save session");

        let loaded = load_all_sessions(&db).await.expect("load sessions");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "s1");
        assert_eq!(loaded[0].branch, "conduit/s1");
    }

    #[tokio::test]
    async fn test_delete_session_removes_row() {
        let db = Database::open_in_memory().await.expect("open in-memory db");
        let config = SqliteConfigService::new(db.clone());

        config.save_session(&test_session("s1")).await.expect("save session");
        config.delete_session("s1").await.expect("delete session");

        let loaded = load_all_sessions(&db).await.expect("load sessions");
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_save_messages_replaces_prior_history() {
        let db = Database::open_in_memory().await.expect("open in-memory db");
        let config = SqliteConfigService::new(db);

        let first = vec![Message { role: MessageRole::User, content: "hi".to_string() }];
        config.save_messages("s1", &first).await.expect("save messages");

        let second = vec![
            Message { role: MessageRole::User, content: "hi".to_string() },
            Message { role: MessageRole::Assistant, content: "hello".to_string() },
        ];
        config.save_messages("s1", &second).await.expect("save messages again");

        let loaded = config.load_messages("s1").await.expect("load messages");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].content, "hello");
    }

    #[tokio::test]
    async fn test_set_allowed_tools_persists_repo_settings() {
        let db = Database::open_in_memory().await.expect("open in-memory db");
        let config = SqliteConfigService::new(db);
        let repo_path = Path::new("/repo");

        config
            .set_allowed_tools(repo_path, vec!["Bash".to_string(), "Edit".to_string()])
            .await
            .expect("set allowed tools");

        let settings = config.repo_settings(repo_path).await.expect("load repo settings");
        assert_eq!(settings.allowed_tools, vec!["Bash".to_string(), "Edit".to_string()]);
    }

    #[tokio::test]
    async fn test_global_settings_defaults_when_unset() {
        let db = Database::open_in_memory().await.expect("open in-memory db");
        let config = SqliteConfigService::new(db);

        let settings = config.global_settings().await.expect("load global settings");
        assert_eq!(settings.default_branch_prefix, "conduit");
        assert!(settings.notifications_enabled);
    }

    #[tokio::test]
    async fn test_save_global_settings_round_trips() {
        let db = Database::open_in_memory().await.expect("open in-memory db");
        let config = SqliteConfigService::new(db);

        let mut settings = GlobalSettings::default();
        settings.auto_broadcast_pr = true;
        settings.max_autonomous_turns = 50;
        config.save_global_settings(settings).await.expect("save global settings");

        let loaded = config.global_settings().await.expect("load global settings");
        assert!(loaded.auto_broadcast_pr);
        assert_eq!(loaded.max_autonomous_turns, 50);
    }
}
