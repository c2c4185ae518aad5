//! LLM-backed participants and pipelines for the peer review arena.
//!
//! - `backend`: OpenAI / Azure OpenAI chat completions and an offline backend
//! - `players`: one [`arena::Agent`] per role, built by [`players::AgentFactory`]
//! - `prompts`: role descriptions
//! - `papers`: paper text and ground-truth decisions from the data directory
//! - `config`: CLI flags and backend credentials
//! - `runner`: review, decision and acceptance pipelines

#![allow(clippy::uninlined_format_args)]

pub mod backend;
pub mod config;
pub mod papers;
pub mod players;
pub mod prompts;
pub mod runner;

pub use backend::{
    build_backend, BackendError, ChatBackend, ChatMessage, ChatRole, DummyBackend, OpenAiChat,
    Sampling,
};
pub use config::{BackendChoice, BackendConfig, BackendKind, RunArgs};
pub use papers::{PaperSource, TextDirSource};
pub use players::AgentFactory;
pub use runner::{
    drive, run_accept, run_paper_decision, run_paper_review, AcceptReport, DecisionReport,
    HumanInput, NoHumans, ReviewReport,
};
