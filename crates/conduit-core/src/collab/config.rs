//! The Config service contract (spec §6): repo list, per-repo and global
//! toggles, session CRUD, message CRUD. The CORE reads policy through this
//! trait rather than assuming any on-disk format.

use async_trait::async_trait;

use crate::core::error::CoreError;
use crate::domain::session::Session;

#[derive(Debug, Clone)]
pub struct RepoSettings {
    pub repo_path: std::path::PathBuf,
    pub allowed_tools: Vec<String>,
    pub mcp_servers: Vec<super::runner::McpServer>,
    pub use_containers: bool,
    pub auto_merge: bool,
    pub test_command: Option<String>,
    pub test_retries: u32,
    pub asana_project_id: Option<String>,
    pub linear_team_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GlobalSettings {
    pub notifications_enabled: bool,
    pub auto_broadcast_pr: bool,
    pub auto_cleanup_merged: bool,
    pub auto_address_pr_comments: bool,
    pub default_branch_prefix: String,
    pub max_autonomous_turns: u32,
    pub max_autonomous_duration_secs: u64,
    pub active_workspace_id: Option<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            auto_broadcast_pr: false,
            auto_cleanup_merged: true,
            auto_address_pr_comments: false,
            default_branch_prefix: "conduit".to_string(),
            max_autonomous_turns: 200,
            max_autonomous_duration_secs: 4 * 60 * 60,
            active_workspace_id: None,
        }
    }
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ConfigService: Send + Sync {
    async fn repos(&self) -> Result<Vec<RepoSettings>, CoreError>;

    async fn repo_settings(&self, repo_path: &std::path::Path) -> Result<RepoSettings, CoreError>;

    async fn set_allowed_tools(
        &self,
        repo_path: &std::path::Path,
        tools: Vec<String>,
    ) -> Result<(), CoreError>;

    async fn global_settings(&self) -> Result<GlobalSettings, CoreError>;

    async fn save_global_settings(&self, settings: GlobalSettings) -> Result<(), CoreError>;

    async fn save_session(&self, session: &Session) -> Result<(), CoreError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), CoreError>;

    async fn load_messages(&self, session_id: &str) -> Result<Vec<super::runner::Message>, CoreError>;

    async fn save_messages(
        &self,
        session_id: &str,
        messages: &[super::runner::Message],
    ) -> Result<(), CoreError>;

    async fn delete_messages(&self, session_id: &str) -> Result<(), CoreError>;
}
