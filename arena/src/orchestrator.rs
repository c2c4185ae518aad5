//! Arena orchestrator: drives a conversation one speaker at a time.
//!
//! Each step asks the phase machine who is next, builds that participant's
//! observation, asks its agent for an action, validates it and commits it.
//! Invalid actions are retried up to a fixed bound; nothing is appended
//! until an action validates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::{Agent, AgentError};
use crate::conversation::Conversation;
use crate::error::{ArenaError, ArenaResult};
use crate::message::Message;

/// Default number of attempts a participant gets per step.
pub const DEFAULT_INVALID_ACTIONS_RETRY: u32 = 3;
/// Default cap on steps for [`Arena::run`].
pub const DEFAULT_MAX_STEPS: usize = 20;

/// Orchestrator limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Attempts per step before the run is aborted.
    pub invalid_actions_retry: u32,
    /// Steps taken by one call to [`Arena::run`].
    pub max_steps: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            invalid_actions_retry: DEFAULT_INVALID_ACTIONS_RETRY,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Result of one successful step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// The message that was appended.
    pub message: Message,
    /// Whether the conversation is now over.
    pub terminal: bool,
}

/// Result of [`Arena::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: usize,
    pub terminal: bool,
}

/// A conversation plus one agent per participant.
pub struct Arena {
    conversation: Conversation,
    agents: HashMap<String, Box<dyn Agent>>,
    config: ArenaConfig,
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut agents: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        agents.sort_unstable();
        f.debug_struct("Arena")
            .field("conversation", &self.conversation)
            .field("agents", &agents)
            .field("config", &self.config)
            .finish()
    }
}

impl Arena {
    /// Every roster participant must have an agent.
    pub fn new(
        conversation: Conversation,
        agents: HashMap<String, Box<dyn Agent>>,
        config: ArenaConfig,
    ) -> ArenaResult<Self> {
        if config.invalid_actions_retry == 0 {
            return Err(ArenaError::config("invalid_actions_retry must be at least 1"));
        }
        if config.max_steps == 0 {
            return Err(ArenaError::config("max_steps must be at least 1"));
        }
        for participant in conversation.roster().iter() {
            if !agents.contains_key(&participant.id) {
                return Err(ArenaError::MissingAgent(participant.id.clone()));
            }
        }
        Ok(Self {
            conversation,
            agents,
            config,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    pub fn config(&self) -> ArenaConfig {
        self.config
    }

    pub fn is_terminal(&self) -> bool {
        self.conversation.is_terminal()
    }

    /// Id of the participant due to speak.
    pub fn next_speaker(&self) -> ArenaResult<String> {
        self.conversation
            .next_speaker()?
            .map(|p| p.id.clone())
            .ok_or(ArenaError::ConversationTerminal)
    }

    /// One speaker acts. Fails with `NeedsHumanInput` when the agent hands
    /// the turn to a person, and with `TooManyInvalidActions` once the
    /// retry bound is spent.
    pub fn step(&mut self) -> ArenaResult<StepOutcome> {
        let speaker = self.next_speaker()?;
        let phase = self.conversation.phase_index();
        let observation = self.conversation.observation(&speaker)?;
        let agent = self
            .agents
            .get_mut(&speaker)
            .ok_or_else(|| ArenaError::MissingAgent(speaker.clone()))?;

        let mut last_reason = String::new();
        for attempt in 1..=self.config.invalid_actions_retry {
            let action = match agent.produce_action(&observation) {
                Ok(action) => action,
                Err(AgentError::NeedsHumanInput) => {
                    return Err(ArenaError::NeedsHumanInput {
                        participant: speaker,
                        phase,
                    })
                }
                Err(AgentError::Backend(reason)) => {
                    warn!(speaker = %speaker, phase, attempt, error = %reason, "agent backend failed");
                    last_reason = reason;
                    continue;
                }
            };

            match self.conversation.check_action(&speaker, &action) {
                Ok(()) => return self.commit(&speaker, &action),
                Err(e) => {
                    warn!(speaker = %speaker, phase, attempt, error = %e, "invalid action");
                    last_reason = e.to_string();
                }
            }
        }

        warn!(
            speaker = %speaker,
            phase,
            attempts = self.config.invalid_actions_retry,
            "too many invalid actions, terminating"
        );
        Err(ArenaError::TooManyInvalidActions {
            participant: speaker,
            phase,
            attempts: self.config.invalid_actions_retry,
            last_reason,
        })
    }

    /// Commit an action typed by a person for the participant due to speak.
    /// Validation failures come back as `InvalidAction` so the caller can ask again.
    pub fn submit_human_action(&mut self, action: &str) -> ArenaResult<StepOutcome> {
        let speaker = self.next_speaker()?;
        if let Err(e) = self.conversation.check_action(&speaker, action) {
            warn!(speaker = %speaker, error = %e, "invalid human action");
            return Err(ArenaError::InvalidAction {
                participant: speaker,
                phase: self.conversation.phase_index(),
                reason: e.to_string(),
            });
        }
        self.commit(&speaker, action)
    }

    /// Step until terminal or `max_steps` steps have been taken.
    pub fn run(&mut self) -> ArenaResult<RunSummary> {
        let mut steps = 0;
        while !self.is_terminal() && steps < self.config.max_steps {
            self.step()?;
            steps += 1;
        }
        Ok(RunSummary {
            steps,
            terminal: self.is_terminal(),
        })
    }

    fn commit(&mut self, speaker: &str, action: &str) -> ArenaResult<StepOutcome> {
        let message = self.conversation.step(speaker, action)?;
        info!(
            speaker = %speaker,
            phase = message.phase,
            turn = message.turn,
            "{}",
            message.render()
        );
        Ok(StepOutcome {
            message,
            terminal: self.conversation.is_terminal(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockAgent;
    use crate::decision::ScoringMethod;
    use crate::setting::ExperimentSetting;

    fn decision_conversation() -> Conversation {
        Conversation::decision(
            ExperimentSetting::preset("BASELINE").unwrap(),
            vec![10, 7],
            vec!["solid".to_string(), "weak".to_string()],
            ScoringMethod::Ranking,
        )
        .unwrap()
    }

    fn arena_with(agent: MockAgent, retry: u32) -> Arena {
        let mut agents: HashMap<String, Box<dyn Agent>> = HashMap::new();
        agents.insert("AC".to_string(), Box::new(agent));
        Arena::new(
            decision_conversation(),
            agents,
            ArenaConfig {
                invalid_actions_retry: retry,
                ..ArenaConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_retry_bound_is_exact_and_appends_nothing() {
        let mut agent = MockAgent::new();
        agent
            .expect_produce_action()
            .times(3)
            .returning(|_| Ok("I refuse to rank these papers.".to_string()));
        let mut arena = arena_with(agent, 3);

        let err = arena.step().unwrap_err();
        match err {
            ArenaError::TooManyInvalidActions {
                participant,
                phase,
                attempts,
                ..
            } => {
                assert_eq!(participant, "AC");
                assert_eq!(phase, 5);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(arena.conversation().log().is_empty());
        assert!(!arena.is_terminal());
    }

    #[test]
    fn test_backend_errors_count_as_attempts() {
        let mut agent = MockAgent::new();
        let mut calls = 0;
        agent.expect_produce_action().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(AgentError::Backend("timeout".to_string()))
            } else {
                Ok("Paper ID: 10\nWillingness to accept: 1\nPaper ID: 7\nWillingness to accept: 2".to_string())
            }
        });
        let mut arena = arena_with(agent, 3);

        let outcome = arena.step().unwrap();
        assert!(outcome.terminal);
        assert_eq!(arena.conversation().log().len(), 1);
        assert_eq!(arena.conversation().ac_decisions().unwrap().len(), 2);
    }

    #[test]
    fn test_human_input_resumes_at_same_speaker() {
        let mut agent = MockAgent::new();
        agent
            .expect_produce_action()
            .times(1)
            .returning(|_| Err(AgentError::NeedsHumanInput));
        let mut arena = arena_with(agent, 3);

        let err = arena.step().unwrap_err();
        assert!(matches!(err, ArenaError::NeedsHumanInput { phase: 5, .. }));
        assert_eq!(arena.next_speaker().unwrap(), "AC");

        let err = arena.submit_human_action("no idea").unwrap_err();
        assert!(matches!(err, ArenaError::InvalidAction { .. }));
        assert!(arena.conversation().log().is_empty());

        let outcome = arena
            .submit_human_action("Paper ID: 7\nWillingness to accept: 1\nPaper ID: 10\nWillingness to accept: 2")
            .unwrap();
        assert!(outcome.terminal);
        assert_eq!(outcome.message.speaker_id, "AC");
    }

    #[test]
    fn test_zero_limits_rejected() {
        for config in [
            ArenaConfig { invalid_actions_retry: 0, max_steps: 20 },
            ArenaConfig { invalid_actions_retry: 3, max_steps: 0 },
        ] {
            let mut agents: HashMap<String, Box<dyn Agent>> = HashMap::new();
            agents.insert("AC".to_string(), Box::new(MockAgent::new()));
            let err = Arena::new(decision_conversation(), agents, config).unwrap_err();
            assert!(matches!(err, ArenaError::Config(_)), "{config:?}: {err}");
        }
    }

    #[test]
    fn test_missing_agent_rejected() {
        let err = Arena::new(decision_conversation(), HashMap::new(), ArenaConfig::default())
            .unwrap_err();
        assert!(matches!(err, ArenaError::MissingAgent(id) if id == "AC"));
    }

    #[test]
    fn test_step_after_terminal() {
        let mut agent = MockAgent::new();
        agent
            .expect_produce_action()
            .times(1)
            .returning(|_| Ok("Paper ID: 10\nWillingness to accept: 1".to_string()));
        let mut arena = arena_with(agent, 3);

        let summary = arena.run().unwrap();
        assert_eq!(summary, RunSummary { steps: 1, terminal: true });
        assert!(matches!(arena.step(), Err(ArenaError::ConversationTerminal)));
    }
}
