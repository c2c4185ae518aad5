//! Conversations: one paper's review, or one batch of AC decisions.
//!
//! A `Conversation` owns the roster, the message log, the phase machine and
//! the visibility policy. It is the only writer of its log.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::Observation;
use crate::decision::{DecisionParseError, DecisionParser, DecisionRecord, ScoringMethod};
use crate::error::{ArenaError, ArenaResult};
use crate::message::{Message, MessageLog};
use crate::participant::{Participant, Role, Roster};
use crate::phase::{ConversationState, PhaseMachine, PHASE_AC_WRITE_METAREVIEWS, PHASE_REVIEWER_WRITE_REVIEWS};
use crate::setting::ExperimentSetting;
use crate::visibility::VisibilityPolicy;

/// Which of the two conversation types is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationKind {
    /// Phases 0-4 for one paper.
    PaperReview { paper_id: u64, paper_decision: String },
    /// Phase 5 for a batch of papers assigned to one area chair.
    PaperDecision {
        paper_ids: Vec<u64>,
        metareviews: Vec<String>,
        scoring: ScoringMethod,
    },
}

impl ConversationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PaperReview { .. } => "paper_review",
            Self::PaperDecision { .. } => "paper_decision",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    kind: ConversationKind,
    setting: ExperimentSetting,
    roster: Roster,
    log: MessageLog,
    machine: PhaseMachine,
    policy: VisibilityPolicy,
    parser: Option<DecisionParser>,
    ac_decisions: Option<DecisionRecord>,
}

impl Conversation {
    /// Review conversation for one paper.
    pub fn review(
        setting: ExperimentSetting,
        paper_id: u64,
        paper_decision: &str,
    ) -> ArenaResult<Self> {
        let roster = Roster::for_review(&setting)?;
        let machine = PhaseMachine::review(&roster)?;
        let policy = VisibilityPolicy::for_review(&roster, setting.area_chair()?);
        Ok(Self {
            kind: ConversationKind::PaperReview {
                paper_id,
                paper_decision: paper_decision.to_string(),
            },
            setting,
            roster,
            log: MessageLog::new(),
            machine,
            policy,
            parser: None,
            ac_decisions: None,
        })
    }

    /// Decision conversation over a batch. `metareviews[i]` belongs to `paper_ids[i]`.
    pub fn decision(
        setting: ExperimentSetting,
        paper_ids: Vec<u64>,
        metareviews: Vec<String>,
        scoring: ScoringMethod,
    ) -> ArenaResult<Self> {
        if paper_ids.len() != metareviews.len() {
            return Err(ArenaError::config(format!(
                "{} papers but {} metareviews",
                paper_ids.len(),
                metareviews.len()
            )));
        }
        let roster = Roster::for_decision(&setting)?;
        let machine = PhaseMachine::decision(&roster)?;
        let policy = VisibilityPolicy::for_decision(setting.area_chair()?);
        Ok(Self {
            kind: ConversationKind::PaperDecision {
                paper_ids,
                metareviews,
                scoring,
            },
            setting,
            roster,
            log: MessageLog::new(),
            machine,
            policy,
            parser: Some(DecisionParser::new(scoring)),
            ac_decisions: None,
        })
    }

    /// Stop once the machine reaches `phase_index`.
    pub fn with_ceiling(mut self, phase_index: usize) -> Self {
        self.machine = self.machine.with_ceiling(phase_index);
        self
    }

    pub fn kind(&self) -> &ConversationKind {
        &self.kind
    }

    pub fn setting(&self) -> &ExperimentSetting {
        &self.setting
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Every message, in order, regardless of visibility.
    pub fn messages(&self) -> Vec<Message> {
        self.log.all()
    }

    pub fn state(&self) -> ConversationState {
        self.machine.state()
    }

    pub fn machine(&self) -> &PhaseMachine {
        &self.machine
    }

    pub fn phase_index(&self) -> usize {
        self.machine.phase_index()
    }

    pub fn is_terminal(&self) -> bool {
        self.machine.is_terminal()
    }

    /// Record parsed by the last successful [`check_action`](Self::check_action).
    pub fn ac_decisions(&self) -> Option<&DecisionRecord> {
        self.ac_decisions.as_ref()
    }

    /// The participant due to speak, or `None` once terminal.
    pub fn next_speaker(&self) -> ArenaResult<Option<&Participant>> {
        match self.machine.get_next_speaker() {
            Some(id) => self.roster.require(id).map(Some),
            None => Ok(None),
        }
    }

    /// What `participant_id` sees right now.
    pub fn observation(&self, participant_id: &str) -> ArenaResult<Observation> {
        let participant = self.roster.require(participant_id)?;
        let phase = self
            .machine
            .current_phase()
            .ok_or(ArenaError::ConversationTerminal)?;
        let state = self.machine.state();
        let messages = self.policy.visible_messages(
            &self.log,
            state.phase_index,
            participant,
            state.next_speaker_offset,
        );
        Ok(Observation {
            phase_index: state.phase_index,
            phase_name: phase.name.clone(),
            speaker_offset: state.next_speaker_offset,
            turn: state.turn,
            participant: participant.clone(),
            messages,
            kind: self.kind.clone(),
        })
    }

    /// Validate a candidate action. Only an area chair's answer in a
    /// decision conversation is checked; its parsed record is kept.
    pub fn check_action(
        &mut self,
        participant_id: &str,
        action: &str,
    ) -> Result<(), DecisionParseError> {
        let is_ac = self
            .roster
            .get(participant_id)
            .is_some_and(|p| p.role == Role::AreaChair);
        if let (Some(parser), true) = (self.parser, is_ac) {
            self.ac_decisions = Some(parser.parse(action)?);
        }
        Ok(())
    }

    /// Append the speaker's action and move the machine on by one speaker.
    pub fn step(&mut self, participant_id: &str, action: &str) -> ArenaResult<Message> {
        let expected = self
            .machine
            .get_next_speaker()
            .ok_or(ArenaError::ConversationTerminal)?;
        if expected != participant_id {
            return Err(ArenaError::InvalidPhase {
                phase: self.machine.phase_index(),
                reason: format!("{} spoke but {} was due", participant_id, expected),
            });
        }
        let role = self.roster.require(participant_id)?.role;
        let state = self.machine.state();

        let message = Message::new(participant_id, role, action, state.turn, state.phase_index);
        self.log.append(message.clone())?;
        self.machine.advance()?;
        Ok(message)
    }

    /// Seed the log from an earlier transcript of the same paper and skip to
    /// the metareview phase.
    ///
    /// Extractor messages are skipped (the paper text is already in this
    /// log, or is not needed); loading stops at the second area chair
    /// message. Only allowed before any review has been written.
    pub fn resume_from_cache(&mut self, cached: &[Message]) -> ArenaResult<()> {
        if !matches!(self.kind, ConversationKind::PaperReview { .. }) {
            return Err(ArenaError::InvalidPhase {
                phase: self.phase_index(),
                reason: "only review conversations can resume from a transcript".to_string(),
            });
        }
        let state = self.machine.state();
        if state.phase_index > PHASE_REVIEWER_WRITE_REVIEWS || state.next_speaker_offset != 0 {
            return Err(ArenaError::InvalidPhase {
                phase: state.phase_index,
                reason: "resume must happen before reviews are written".to_string(),
            });
        }

        let found = cached
            .iter()
            .filter(|m| m.role == Role::Reviewer)
            .map(|m| m.speaker_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let expected = self.setting.num_reviewers();
        if found != expected {
            return Err(ArenaError::ResumeMismatch { expected, found });
        }

        let mut ac_messages = 0;
        let mut loaded = 0;
        for message in cached {
            if message.role == Role::PaperExtractor {
                continue;
            }
            if message.role == Role::AreaChair {
                if ac_messages == 1 {
                    break;
                }
                ac_messages += 1;
            }
            if self.roster.get(&message.speaker_id).is_none() {
                warn!(speaker = %message.speaker_id, "cached message from unknown participant");
            }
            self.log.append(message.clone())?;
            loaded += 1;
        }

        self.machine.jump_to(PHASE_AC_WRITE_METAREVIEWS)?;
        info!(loaded, "resumed conversation from cached transcript");
        Ok(())
    }
}
