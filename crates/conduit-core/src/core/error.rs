//! Error taxonomy for the CORE (spec §7), grounded in the
//! `AgentBackendError`/`AgentError` pattern already used in
//! `infra/agent/backend.rs` and `infra/channel.rs`.

use thiserror::Error;

/// One variant per §7 taxonomy bucket. The event loop matches on this to
/// decide whether to surface, retry, or swallow.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Validation of user-supplied input (branch names, duplicate repos,
    /// missing selection). Surfaced inline; never retried.
    #[error("invalid input: {0}")]
    UserInput(String),

    /// A collaborator (git/API/CI) timed out or otherwise failed
    /// transiently. Logged and retried by the owning state machine.
    #[error("transient failure in {session_id}: {source}")]
    Transient {
        session_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A collaborator failed in a way that terminates the current state
    /// machine (merge conflict, auth failure, PR create failure).
    #[error("fatal failure in {session_id}: {source}")]
    Fatal {
        session_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An internal invariant was violated: event for an unknown or
    /// already-deleted session, response on a stopped runner. Logged at
    /// warn and dropped; never surfaced to the user.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl CoreError {
    pub fn transient(session_id: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transient { session_id: session_id.into(), source: Box::new(source) }
    }

    pub fn fatal(session_id: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Fatal { session_id: session_id.into(), source: Box::new(source) }
    }
}
