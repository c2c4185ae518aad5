//! Phase state machine: who speaks next, and when a conversation ends.
//!
//! A conversation is a fixed list of phases, each with a speaking order.
//! The machine keeps a phase index, an offset into the current speaking
//! order and a turn counter. Only [`PhaseMachine::advance`] mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ArenaError, ArenaResult};
use crate::participant::{Role, Roster, AREA_CHAIR_ID, AUTHOR_ID, PAPER_EXTRACTOR_ID};

/// Index of the extraction phase.
pub const PHASE_PAPER_EXTRACTION: usize = 0;
/// Index of the phase in which reviewers write their reviews.
pub const PHASE_REVIEWER_WRITE_REVIEWS: usize = 1;
/// Index of the author rebuttal phase.
pub const PHASE_AUTHOR_REVIEWER_DISCUSSION: usize = 2;
/// Index of the reviewer / AC discussion phase.
pub const PHASE_REVIEWER_AC_DISCUSSION: usize = 3;
/// Index of the metareview phase; last phase of a review conversation.
pub const PHASE_AC_WRITE_METAREVIEWS: usize = 4;
/// Index of the decision phase, run as its own conversation.
pub const PHASE_AC_MAKE_DECISIONS: usize = 5;

/// A named stage with a fixed speaking order of participant ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub index: usize,
    pub name: String,
    pub speaking_order: Vec<String>,
}

impl Phase {
    pub fn new(index: usize, name: &str, speaking_order: Vec<String>) -> Self {
        Self {
            index,
            name: name.to_string(),
            speaking_order,
        }
    }
}

/// Mutable pointers of a running conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub phase_index: usize,
    pub next_speaker_offset: usize,
    pub turn: u32,
    pub terminal: bool,
}

/// A recorded phase change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: usize,
    pub to: usize,
    pub turn: u32,
    pub timestamp: DateTime<Utc>,
}

/// Phase definitions plus the pointers walking them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseMachine {
    phases: Vec<Phase>,
    /// Exclusive upper bound on phase indices that may run.
    ceiling: Option<usize>,
    state: ConversationState,
    transitions: Vec<PhaseTransition>,
}

impl PhaseMachine {
    /// Build a machine from phases with contiguous indices and non-empty
    /// speaking orders. Starts at the first phase, turn 0.
    pub fn new(phases: Vec<Phase>) -> ArenaResult<Self> {
        let first = phases
            .first()
            .ok_or_else(|| ArenaError::config("a conversation needs at least one phase"))?
            .index;
        for (i, phase) in phases.iter().enumerate() {
            if phase.index != first + i {
                return Err(ArenaError::InvalidPhase {
                    phase: phase.index,
                    reason: format!("expected contiguous index {}", first + i),
                });
            }
            if phase.speaking_order.is_empty() {
                return Err(ArenaError::InvalidPhase {
                    phase: phase.index,
                    reason: format!("phase '{}' has an empty speaking order", phase.name),
                });
            }
        }
        Ok(Self {
            phases,
            ceiling: None,
            state: ConversationState {
                phase_index: first,
                next_speaker_offset: 0,
                turn: 0,
                terminal: false,
            },
            transitions: Vec::new(),
        })
    }

    /// The five phases of a review conversation for this roster.
    pub fn review(roster: &Roster) -> ArenaResult<Self> {
        let reviewers = roster.ids_with_role(Role::Reviewer);
        if reviewers.is_empty() {
            return Err(ArenaError::config("a review conversation needs reviewers"));
        }
        for id in [PAPER_EXTRACTOR_ID, AUTHOR_ID, AREA_CHAIR_ID] {
            roster.require(id)?;
        }

        let mut discussion = vec![AREA_CHAIR_ID.to_string()];
        discussion.extend(reviewers.iter().cloned());

        Self::new(vec![
            Phase::new(
                PHASE_PAPER_EXTRACTION,
                "paper_extraction",
                vec![PAPER_EXTRACTOR_ID.to_string()],
            ),
            Phase::new(
                PHASE_REVIEWER_WRITE_REVIEWS,
                "reviewer_write_reviews",
                reviewers.clone(),
            ),
            // One author turn per reviewer; the offset selects the reviewer addressed.
            Phase::new(
                PHASE_AUTHOR_REVIEWER_DISCUSSION,
                "author_reviewer_discussion",
                vec![AUTHOR_ID.to_string(); reviewers.len()],
            ),
            Phase::new(
                PHASE_REVIEWER_AC_DISCUSSION,
                "reviewer_ac_discussion",
                discussion,
            ),
            Phase::new(
                PHASE_AC_WRITE_METAREVIEWS,
                "ac_write_metareviews",
                vec![AREA_CHAIR_ID.to_string()],
            ),
        ])
    }

    /// The single-phase decision conversation.
    pub fn decision(roster: &Roster) -> ArenaResult<Self> {
        roster.require(AREA_CHAIR_ID)?;
        Self::new(vec![Phase::new(
            PHASE_AC_MAKE_DECISIONS,
            "ac_make_decisions",
            vec![AREA_CHAIR_ID.to_string()],
        )])
    }

    /// Stop before `ceiling`: reaching that phase index makes the machine terminal.
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = Some(ceiling);
        if self.state.phase_index >= ceiling {
            self.state.terminal = true;
        }
        self
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn phase_index(&self) -> usize {
        self.state.phase_index
    }

    pub fn next_speaker_offset(&self) -> usize {
        self.state.next_speaker_offset
    }

    pub fn turn(&self) -> u32 {
        self.state.turn
    }

    pub fn is_terminal(&self) -> bool {
        self.state.terminal
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    fn phase_at(&self, index: usize) -> Option<&Phase> {
        let first = self.phases.first()?.index;
        index
            .checked_sub(first)
            .and_then(|i| self.phases.get(i))
    }

    /// The phase currently running, or `None` once terminal.
    pub fn current_phase(&self) -> Option<&Phase> {
        if self.state.terminal {
            return None;
        }
        self.phase_at(self.state.phase_index)
    }

    /// Id of the participant due to speak. Pure: calling it repeatedly
    /// without [`advance`](Self::advance) returns the same id.
    pub fn get_next_speaker(&self) -> Option<&str> {
        self.current_phase()
            .and_then(|p| p.speaking_order.get(self.state.next_speaker_offset))
            .map(String::as_str)
    }

    /// Move past the speaker who just acted.
    pub fn advance(&mut self) -> ArenaResult<()> {
        let phase = self
            .current_phase()
            .ok_or(ArenaError::ConversationTerminal)?;
        let last_offset = phase.speaking_order.len() - 1;
        let name = phase.name.clone();

        if self.state.next_speaker_offset < last_offset {
            self.state.next_speaker_offset += 1;
            return Ok(());
        }

        let from = self.state.phase_index;
        self.state.next_speaker_offset = 0;
        self.state.phase_index += 1;
        self.state.turn += 1;
        self.transitions.push(PhaseTransition {
            from,
            to: self.state.phase_index,
            turn: self.state.turn,
            timestamp: Utc::now(),
        });

        let past_last = self.phase_at(self.state.phase_index).is_none();
        let at_ceiling = self
            .ceiling
            .is_some_and(|c| self.state.phase_index >= c);
        self.state.terminal = past_last || at_ceiling;

        info!(
            phase = from,
            name = %name,
            next_phase = self.state.phase_index,
            turn = self.state.turn,
            terminal = self.state.terminal,
            "end of speaking order"
        );
        Ok(())
    }

    /// Reposition at the start of `phase_index`, keeping the turn counter.
    /// Used when resuming from a checkpoint.
    pub fn jump_to(&mut self, phase_index: usize) -> ArenaResult<()> {
        if self.phase_at(phase_index).is_none() {
            return Err(ArenaError::InvalidPhase {
                phase: phase_index,
                reason: "no such phase in this conversation".to_string(),
            });
        }
        let from = self.state.phase_index;
        self.state.phase_index = phase_index;
        self.state.next_speaker_offset = 0;
        self.state.terminal = self.ceiling.is_some_and(|c| phase_index >= c);
        self.transitions.push(PhaseTransition {
            from,
            to: phase_index,
            turn: self.state.turn,
            timestamp: Utc::now(),
        });
        info!(from, to = phase_index, "jumped to phase");
        Ok(())
    }
}
