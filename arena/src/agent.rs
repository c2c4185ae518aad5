//! Agent seam: the single interface through which participants act.
//!
//! The orchestrator hands an [`Observation`] to the participant's agent and
//! gets free text back. Whether that text came from an LLM, a fixed string
//! or a person at a keyboard is the agent's business.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::ConversationKind;
use crate::message::Message;
use crate::participant::Participant;

/// What a participant knows when asked to act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub phase_index: usize,
    pub phase_name: String,
    /// Offset of the speaker within the phase's speaking order.
    pub speaker_offset: usize,
    pub turn: u32,
    /// The participant being asked to act.
    pub participant: Participant,
    /// Messages visible to the participant, in log order.
    pub messages: Vec<Message>,
    /// Paper under review, or the batch being decided.
    pub kind: ConversationKind,
}

impl Observation {
    /// Last visible message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Why an agent produced no action.
#[derive(Error, Debug)]
pub enum AgentError {
    /// A person has to type the action; the caller should prompt and
    /// submit it at the same phase and speaker.
    #[error("human input required")]
    NeedsHumanInput,

    /// The backing model call failed. Counts as an invalid attempt.
    #[error("agent backend failed: {0}")]
    Backend(String),
}

/// Produces one free-text action per call.
#[cfg_attr(test, mockall::automock)]
pub trait Agent {
    fn produce_action(&mut self, observation: &Observation) -> Result<String, AgentError>;
}
