//! Peer Review Arena Library
//!
//! Turn-based, phase-structured conversations between simulated
//! participants of an academic peer review:
//! - Message log with per-phase visibility rules
//! - Phase state machine for the review (phases 0-4) and decision (phase 5)
//!   conversations
//! - Decision parser for area chair rankings and recommendations
//! - Orchestrator loop with bounded retries on invalid actions
//! - Transcript persistence, resume, AC decision batches and acceptance
//!   arithmetic
//!
//! Agents are external: anything implementing [`Agent`] can take part.
//!
//! # Phases
//!
//! | Index | Name | Speaking order |
//! |---|---|---|
//! | 0 | `paper_extraction` | Paper Extractor |
//! | 1 | `reviewer_write_reviews` | Reviewer 1..N |
//! | 2 | `author_reviewer_discussion` | Author × N |
//! | 3 | `reviewer_ac_discussion` | AC, Reviewer 1..N |
//! | 4 | `ac_write_metareviews` | AC |
//! | 5 | `ac_make_decisions` | AC (separate conversation) |

#![allow(clippy::uninlined_format_args)]

pub mod agent;
pub mod batch;
pub mod conversation;
pub mod decision;
pub mod error;
pub mod layout;
pub mod message;
pub mod orchestrator;
pub mod participant;
pub mod phase;
pub mod rng;
pub mod setting;
pub mod transcript;
pub mod visibility;

pub use agent::{Agent, AgentError, Observation};
pub use batch::{generate_num_papers_to_accept, papers_accepted, plan_batches, DecisionBatchStore};
pub use conversation::{Conversation, ConversationKind};
pub use decision::{DecisionParseError, DecisionParser, DecisionRecord, Rating, ScoringMethod};
pub use error::{ArenaError, ArenaResult};
pub use layout::{model_short, OutputLayout};
pub use message::{Message, MessageLog, Visibility};
pub use orchestrator::{Arena, ArenaConfig, RunSummary, StepOutcome};
pub use participant::{Participant, Persona, Role, Roster};
pub use phase::{ConversationState, Phase, PhaseMachine};
pub use rng::SeededRng;
pub use setting::{
    AcVariant, AuthorFame, ExperimentSetting, GlobalSettings, ReviewerProfile, SettingSpec, PRESET_NAMES,
};
pub use transcript::{load_metareview, Transcript};
pub use visibility::VisibilityPolicy;
