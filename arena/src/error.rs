//! Arena error types
//!
//! Configuration problems and resume mismatches abort a run before (or
//! instead of) any conversation step. Invalid actions are recoverable up to
//! the orchestrator's retry bound and only surface here once that bound is
//! exhausted.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for arena operations
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Errors that can occur while configuring, running or persisting a conversation
#[derive(Error, Debug)]
pub enum ArenaError {
    /// Bad experiment or run configuration (unknown variant, scoring method, credential...)
    #[error("configuration error: {0}")]
    Config(String),

    /// A participant kept producing actions that failed validation
    #[error(
        "{participant} has made invalid actions for {attempts} times in phase {phase}. \
         Terminating the game. Last reason: {last_reason}"
    )]
    TooManyInvalidActions {
        participant: String,
        phase: usize,
        attempts: u32,
        last_reason: String,
    },

    /// A submitted human action failed validation; the caller may ask again
    #[error("invalid action from {participant} in phase {phase}: {reason}")]
    InvalidAction {
        participant: String,
        phase: usize,
        reason: String,
    },

    /// The agent for this participant wants a human to type the action
    #[error("{participant} needs human input in phase {phase}")]
    NeedsHumanInput { participant: String, phase: usize },

    /// Cached transcript does not match the configured reviewer count
    #[error("resume mismatch: transcript has {found} reviewers, configuration expects {expected}")]
    ResumeMismatch { expected: usize, found: usize },

    /// A message without a speaker cannot enter the log
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Speaking order or lookup referenced a participant not in the roster
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),

    /// No agent was registered for a participant in the roster
    #[error("no agent registered for participant {0}")]
    MissingAgent(String),

    /// The conversation already reached its terminal state
    #[error("conversation is already terminal")]
    ConversationTerminal,

    /// Operation is not allowed at the current phase
    #[error("operation not allowed in phase {phase}: {reason}")]
    InvalidPhase { phase: usize, reason: String },

    /// Decision batch store violates the fixed batch size invariant
    #[error("decision batch {index} has {found} papers, expected {expected} for non-final batches")]
    BatchInvariant {
        index: usize,
        found: usize,
        expected: usize,
    },

    /// Acceptance arithmetic over an empty or inconsistent decision set
    #[error("acceptance error: {0}")]
    Acceptance(String),

    /// Refusing to clobber an earlier run's transcript
    #[error("transcript already exists at {path}")]
    TranscriptExists { path: PathBuf },

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transcript or batch store JSON failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArenaError {
    /// Build a configuration error from anything displayable.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error ends the run (as opposed to a caller-recoverable signal).
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::NeedsHumanInput { .. } | Self::InvalidAction { .. }
        )
    }
}
