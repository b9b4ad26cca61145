//! Issue/integration service contract (spec §6): GitHub issues, Asana
//! tasks, Linear issues, unified behind one shape.

use async_trait::async_trait;

use crate::core::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSource {
    GitHub,
    Asana,
    Linear,
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub source: IssueSource,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait IssueService: Send + Sync {
    async fn fetch_github_issues(&self, repo: &str) -> Result<Vec<Issue>, CoreError>;

    async fn fetch_asana_tasks(&self, project_id: &str) -> Result<Vec<Issue>, CoreError>;

    async fn fetch_linear_issues(&self, team_id: &str) -> Result<Vec<Issue>, CoreError>;
}
