use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::agent::AgentModel;

/// Folder name under a project root that stores conduit session metadata.
pub const SESSION_DATA_DIR: &str = ".conduit";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// High-level lifecycle state for one session.
pub enum Status {
    New,
    InProgress,
    Review,
    Rebasing,
    Merging,
    CreatingPullRequest,
    PullRequest,
    Done,
    Canceled,
}

impl Status {
    /// Returns whether a transition to `next` is valid.
    pub fn can_transition_to(self, next: Status) -> bool {
        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (Status::New, Status::InProgress)
                | (Status::New | Status::InProgress, Status::Rebasing)
                | (
                    Status::Review,
                    Status::InProgress
                        | Status::Rebasing
                        | Status::Merging
                        | Status::CreatingPullRequest
                        | Status::Canceled
                )
                | (Status::InProgress | Status::Rebasing, Status::Review)
                | (Status::Merging, Status::Done | Status::Review)
                | (Status::CreatingPullRequest, Status::PullRequest | Status::Review)
                | (Status::PullRequest, Status::Done | Status::Canceled | Status::Review)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::New => write!(f, "New"),
            Status::InProgress => write!(f, "InProgress"),
            Status::Review => write!(f, "Review"),
            Status::Rebasing => write!(f, "Rebasing"),
            Status::Merging => write!(f, "Merging"),
            Status::CreatingPullRequest => write!(f, "CreatingPullRequest"),
            Status::PullRequest => write!(f, "PullRequest"),
            Status::Done => write!(f, "Done"),
            Status::Canceled => write!(f, "Canceled"),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Status::New),
            "InProgress" | "Committing" => Ok(Status::InProgress),
            "Review" => Ok(Status::Review),
            "Rebasing" => Ok(Status::Rebasing),
            "Merging" => Ok(Status::Merging),
            "CreatingPullRequest" => Ok(Status::CreatingPullRequest),
            "PullRequest" => Ok(Status::PullRequest),
            "Done" => Ok(Status::Done),
            "Canceled" => Ok(Status::Canceled),
            _ => Err(format!("Unknown status: {s}")),
        }
    }
}

/// Size bucket derived from a session's git diff.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SessionSize {
    #[default]
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl SessionSize {
    /// Ordered list of all session size buckets from smallest to largest.
    pub const ALL: [SessionSize; 6] =
        [SessionSize::Xs, SessionSize::S, SessionSize::M, SessionSize::L, SessionSize::Xl, SessionSize::Xxl];

    /// Classifies one git diff into a session size bucket.
    pub fn from_diff(diff: &str) -> Self {
        let changed_line_count = diff
            .lines()
            .filter(|line| {
                (line.starts_with('+') && !line.starts_with("+++"))
                    || (line.starts_with('-') && !line.starts_with("---"))
            })
            .count();

        Self::from_changed_line_count(changed_line_count)
    }

    fn from_changed_line_count(changed_line_count: usize) -> Self {
        match changed_line_count {
            0..=10 => SessionSize::Xs,
            11..=30 => SessionSize::S,
            31..=80 => SessionSize::M,
            81..=200 => SessionSize::L,
            201..=500 => SessionSize::Xl,
            _ => SessionSize::Xxl,
        }
    }

    /// Returns a short label for this size bucket.
    pub fn label(self) -> &'static str {
        match self {
            SessionSize::Xs => "XS",
            SessionSize::S => "S",
            SessionSize::M => "M",
            SessionSize::L => "L",
            SessionSize::Xl => "XL",
            SessionSize::Xxl => "XXL",
        }
    }
}

impl fmt::Display for SessionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for SessionSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "XS" | "Xs" | "xs" => Ok(SessionSize::Xs),
            "S" | "s" => Ok(SessionSize::S),
            "M" | "m" => Ok(SessionSize::M),
            "L" | "l" => Ok(SessionSize::L),
            "XL" | "Xl" | "xl" => Ok(SessionSize::Xl),
            "XXL" | "Xxl" | "xxl" => Ok(SessionSize::Xxl),
            _ => Err(format!("Unknown session size: {s}")),
        }
    }
}

/// Per-session token statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// In-memory snapshot of one persisted session row (spec §3 "Session").
#[derive(Clone)]
pub struct Session {
    /// Stable opaque session identifier.
    pub id: String,
    /// Path to the repository this session's worktree was branched from.
    pub repo_path: PathBuf,
    /// Isolated checkout exclusively owned by this session's runner.
    pub work_tree: PathBuf,
    pub branch: String,
    pub base_branch: String,
    pub name: Option<String>,
    /// Session creation timestamp (Unix seconds).
    pub created_at: i64,
    pub updated_at: i64,

    /// Has sent at least one message.
    pub started: bool,
    pub autonomous: bool,
    pub is_supervisor: bool,
    /// Non-empty iff this session is a child of a supervisor session.
    pub supervisor_id: Option<String>,
    /// Non-empty iff this session was forked from another (parent) session;
    /// equals `supervisor_id` whenever `supervisor_id` is set (invariant).
    pub parent_id: Option<String>,
    pub workspace_id: Option<String>,
    /// Shared by every session created in one broadcast batch.
    pub broadcast_group_id: Option<String>,
    pub containerized: bool,
    pub issue_ref: Option<String>,

    pub merged: bool,
    pub merged_to_parent: bool,
    pub pr_created: bool,
    pub pr_merged: bool,
    pub pr_closed: bool,
    pub pr_comment_count: u32,
    pub pr_comments_addressed_count: u32,

    pub model: AgentModel,
    pub size: SessionSize,
    pub stats: SessionStats,
    pub status: Status,
    pub summary: Option<String>,
    pub prompt: String,
}

impl Session {
    /// Returns the display title for this session.
    pub fn display_title(&self) -> &str {
        self.name.as_deref().unwrap_or("No title")
    }

    /// Validates the cross-field invariants from spec §3.
    ///
    /// Returns the first violated invariant's description, if any.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.supervisor_id.is_some() && self.supervisor_id != self.parent_id {
            return Err("supervisor_id is set but parent_id does not match it".to_string());
        }
        if self.pr_merged && !self.pr_created {
            return Err("pr_merged is set but pr_created is not".to_string());
        }
        if self.merged_to_parent && self.parent_id.is_none() {
            return Err("merged_to_parent is set but parent_id is empty".to_string());
        }
        Ok(())
    }
}

/// Current wall-clock time as Unix seconds, clamped to 0 if the clock is somehow before the epoch.
pub fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_test_session() -> Session {
        Session {
            id: "s1".to_string(),
            repo_path: PathBuf::from("/repo"),
            work_tree: PathBuf::from("/repo/.conduit/s1"),
            branch: "conduit/s1".to_string(),
            base_branch: "main".to_string(),
            name: None,
            created_at: 0,
            updated_at: 0,
            started: false,
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

    #[test]
    fn test_status_from_str_pull_request() {
        let status = "PullRequest".parse::<Status>().expect("failed to parse status");
        assert_eq!(status, Status::PullRequest);
    }

    #[test]
    fn test_status_transition_review_to_creating_pull_request() {
        assert!(Status::Review.can_transition_to(Status::CreatingPullRequest));
    }

    #[test]
    fn test_status_transition_pull_request_to_in_progress_is_rejected() {
        assert!(!Status::PullRequest.can_transition_to(Status::InProgress));
    }

    #[test]
    fn test_invariant_supervisor_id_requires_matching_parent_id() {
        let mut session = new_test_session();
        session.supervisor_id = Some("sup".to_string());
        session.parent_id = Some("other".to_string());
        assert!(session.check_invariants().is_err());

        session.parent_id = Some("sup".to_string());
        assert!(session.check_invariants().is_ok());
    }

    #[test]
    fn test_invariant_pr_merged_requires_pr_created() {
        let mut session = new_test_session();
        session.pr_merged = true;
        assert!(session.check_invariants().is_err());

        session.pr_created = true;
        assert!(session.check_invariants().is_ok());
    }

    #[test]
    fn test_invariant_merged_to_parent_requires_parent_id() {
        let mut session = new_test_session();
        session.merged_to_parent = true;
        assert!(session.check_invariants().is_err());

        session.parent_id = Some("parent".to_string());
        assert!(session.check_invariants().is_ok());
    }
}
