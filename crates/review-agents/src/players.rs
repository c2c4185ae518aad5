//! Per-role agents: the participants that take part in a conversation.
//!
//! Every agent implements [`arena::Agent`]. LLM-driven roles turn their
//! observation into a chat request; the paper extractor reads text from a
//! [`PaperSource`]; a human agent hands the turn to a person.

use std::collections::HashMap;
use std::rc::Rc;

use arena::phase::PHASE_REVIEWER_AC_DISCUSSION;
use arena::{
    Agent, AgentError, Conversation, ConversationKind, Observation, Participant, ReviewerProfile,
    Role, ScoringMethod,
};
use tracing::debug;

use crate::backend::{ChatBackend, ChatMessage, Sampling};
use crate::papers::PaperSource;
use crate::prompts::{
    ac_description, author_description, format_metareviews, reviewer_description, ChairBrief,
    ChairPhase, ReviewerPhase, AC_REQUEST_UPDATED_REVIEWS, GLOBAL_PROMPT, TURN_PROMPT,
};

/// Chat request for `observation`: system prompt, the visible history and a
/// final turn prompt. The participant's own messages become assistant turns.
pub fn chat_request(observation: &Observation, role_description: &str) -> Vec<ChatMessage> {
    let me = &observation.participant.id;
    let mut request = Vec::with_capacity(observation.messages.len() + 2);
    request.push(ChatMessage::system(format!(
        "{}\n\nYour name is {}.\n\nYour role: {}",
        GLOBAL_PROMPT, me, role_description
    )));
    for message in &observation.messages {
        if &message.speaker_id == me {
            request.push(ChatMessage::assistant(message.content.clone()));
        } else {
            request.push(ChatMessage::user(format!(
                "[{}]: {}",
                message.speaker_id, message.content
            )));
        }
    }
    request.push(ChatMessage::user(format!("{} [{}]:", TURN_PROMPT, me)));
    request
}

fn ask(
    backend: &dyn ChatBackend,
    observation: &Observation,
    role_description: &str,
    sampling: Sampling,
) -> Result<String, AgentError> {
    let request = chat_request(observation, role_description);
    debug!(
        speaker = %observation.participant.id,
        phase = observation.phase_index,
        turns = request.len(),
        "sending chat request"
    );
    backend
        .complete(&request, sampling)
        .map_err(|e| AgentError::Backend(e.to_string()))
}

/// Posts the paper text. Never calls an LLM.
pub struct PaperExtractorAgent {
    source: Rc<dyn PaperSource>,
}

impl PaperExtractorAgent {
    pub fn new(source: Rc<dyn PaperSource>) -> Self {
        Self { source }
    }
}

impl Agent for PaperExtractorAgent {
    fn produce_action(&mut self, observation: &Observation) -> Result<String, AgentError> {
        match &observation.kind {
            ConversationKind::PaperReview {
                paper_id,
                paper_decision,
            } => Ok(self.source.paper_text(*paper_id, paper_decision)),
            other => Err(AgentError::Backend(format!(
                "paper extractor has nothing to extract in a {} conversation",
                other.name()
            ))),
        }
    }
}

pub struct ReviewerAgent {
    backend: Rc<dyn ChatBackend>,
    write_review: String,
    discussion: String,
}

impl ReviewerAgent {
    pub fn new(profile: &ReviewerProfile, backend: Rc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            write_review: reviewer_description(profile, ReviewerPhase::WriteReview),
            discussion: reviewer_description(profile, ReviewerPhase::Discussion),
        }
    }
}

impl Agent for ReviewerAgent {
    fn produce_action(&mut self, observation: &Observation) -> Result<String, AgentError> {
        let description = if observation.phase_index == PHASE_REVIEWER_AC_DISCUSSION {
            &self.discussion
        } else {
            &self.write_review
        };
        ask(self.backend.as_ref(), observation, description, Sampling::PLAYER)
    }
}

pub struct AuthorAgent {
    backend: Rc<dyn ChatBackend>,
    description: String,
}

impl AuthorAgent {
    pub fn new(backend: Rc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            description: author_description(),
        }
    }
}

impl Agent for AuthorAgent {
    fn produce_action(&mut self, observation: &Observation) -> Result<String, AgentError> {
        ask(self.backend.as_ref(), observation, &self.description, Sampling::PLAYER)
    }
}

/// Writes the metareview in a review conversation and decides a batch in a
/// decision conversation.
pub struct AreaChairAgent {
    backend: Rc<dyn ChatBackend>,
    brief: ChairBrief,
}

impl AreaChairAgent {
    pub fn new(brief: ChairBrief, backend: Rc<dyn ChatBackend>) -> Self {
        Self { backend, brief }
    }
}

impl Agent for AreaChairAgent {
    fn produce_action(&mut self, observation: &Observation) -> Result<String, AgentError> {
        match &observation.kind {
            ConversationKind::PaperReview { .. } => {
                // The author just finished the rebuttals.
                if observation
                    .last_message()
                    .is_some_and(|m| m.role == Role::Author)
                {
                    return Ok(AC_REQUEST_UPDATED_REVIEWS.to_string());
                }
                let description = ac_description(&self.brief, ChairPhase::Metareview);
                ask(self.backend.as_ref(), observation, &description, Sampling::AREA_CHAIR)
            }
            ConversationKind::PaperDecision {
                paper_ids,
                metareviews,
                scoring,
            } => {
                let brief = ChairBrief {
                    scoring: *scoring,
                    num_papers: paper_ids.len(),
                    ..self.brief
                };
                let description = format!(
                    "{}{}",
                    ac_description(&brief, ChairPhase::Decision),
                    format_metareviews(paper_ids, metareviews)
                );
                ask(self.backend.as_ref(), observation, &description, Sampling::AREA_CHAIR)
            }
        }
    }
}

/// A participant played by a person. Always hands the turn back to the caller.
#[derive(Debug, Default)]
pub struct HumanAgent;

impl Agent for HumanAgent {
    fn produce_action(&mut self, _observation: &Observation) -> Result<String, AgentError> {
        Err(AgentError::NeedsHumanInput)
    }
}

/// Builds one agent per roster participant, chosen by role.
pub struct AgentFactory {
    backend: Rc<dyn ChatBackend>,
    source: Rc<dyn PaperSource>,
    scoring: ScoringMethod,
    acceptance_rate: f64,
    humans: Vec<String>,
}

impl AgentFactory {
    pub fn new(
        backend: Rc<dyn ChatBackend>,
        source: Rc<dyn PaperSource>,
        scoring: ScoringMethod,
        acceptance_rate: f64,
    ) -> Self {
        Self {
            backend,
            source,
            scoring,
            acceptance_rate,
            humans: Vec::new(),
        }
    }

    /// Participants played by a person at the terminal.
    pub fn with_humans(mut self, humans: Vec<String>) -> Self {
        self.humans = humans;
        self
    }

    pub fn agent_for(&self, participant: &Participant, conversation: &Conversation) -> Box<dyn Agent> {
        if self.humans.iter().any(|h| h == &participant.id) {
            return Box::new(HumanAgent);
        }
        match participant.role {
            Role::PaperExtractor => Box::new(PaperExtractorAgent::new(Rc::clone(&self.source))),
            Role::Reviewer => {
                let profile = participant.reviewer_profile().cloned().unwrap_or_default();
                Box::new(ReviewerAgent::new(&profile, Rc::clone(&self.backend)))
            }
            Role::Author => Box::new(AuthorAgent::new(Rc::clone(&self.backend))),
            Role::AreaChair => {
                let setting = conversation.setting();
                let brief = ChairBrief {
                    variant: participant
                        .ac_variant()
                        .unwrap_or(arena::AcVariant::Baseline),
                    scoring: self.scoring,
                    num_papers: 0,
                    acceptance_rate: self.acceptance_rate,
                    knows_authors: setting.global_settings.aware_of_authors(Role::AreaChair),
                };
                Box::new(AreaChairAgent::new(brief, Rc::clone(&self.backend)))
            }
            Role::Moderator => Box::new(HumanAgent),
        }
    }

    /// Agents for every participant of `conversation`, keyed by id.
    pub fn agents_for(&self, conversation: &Conversation) -> HashMap<String, Box<dyn Agent>> {
        conversation
            .roster()
            .iter()
            .map(|p| (p.id.clone(), self.agent_for(p, conversation)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, ChatRole, MockChatBackend};
    use arena::ExperimentSetting;

    struct FixedSource;

    impl PaperSource for FixedSource {
        fn paper_text(&self, paper_id: u64, paper_decision: &str) -> String {
            format!("paper {} ({})", paper_id, paper_decision)
        }
    }

    fn review() -> Conversation {
        Conversation::review(ExperimentSetting::preset("BASELINE").unwrap(), 39, "Reject").unwrap()
    }

    fn factory(backend: MockChatBackend) -> AgentFactory {
        AgentFactory::new(
            Rc::new(backend),
            Rc::new(FixedSource),
            ScoringMethod::Ranking,
            0.32,
        )
    }

    #[test]
    fn test_chat_request_roles() {
        let mut conversation = review();
        conversation.step("Paper Extractor", "paper text").unwrap();
        conversation.step("Reviewer 1", "my review").unwrap();
        let observation = conversation.observation("Reviewer 1").unwrap();

        let request = chat_request(&observation, "You are a reviewer.");
        assert_eq!(request[0].role, ChatRole::System);
        assert!(request[0].content.contains("Your name is Reviewer 1."));
        assert_eq!(request[1], ChatMessage::user("[Paper Extractor]: paper text"));
        assert_eq!(request.last().unwrap().role, ChatRole::User);
        assert!(request.last().unwrap().content.contains(TURN_PROMPT));
    }

    #[test]
    fn test_extractor_reads_source_without_backend() {
        let mut backend = MockChatBackend::new();
        backend.expect_complete().times(0);
        let conversation = review();
        let factory = factory(backend);
        let mut agents = factory.agents_for(&conversation);
        assert_eq!(agents.len(), 6);

        let observation = conversation.observation("Paper Extractor").unwrap();
        let text = agents
            .get_mut("Paper Extractor")
            .unwrap()
            .produce_action(&observation)
            .unwrap();
        assert_eq!(text, "paper 39 (Reject)");
    }

    #[test]
    fn test_area_chair_requests_updates_after_rebuttals() {
        let mut backend = MockChatBackend::new();
        backend.expect_complete().times(0);
        let mut conversation = review();
        conversation.step("Paper Extractor", "paper").unwrap();
        for i in 1..=3 {
            conversation.step(&format!("Reviewer {}", i), "review").unwrap();
        }
        for _ in 0..3 {
            conversation.step("Author", "rebuttal").unwrap();
        }

        let factory = factory(backend);
        let ac = conversation.roster().require("AC").unwrap().clone();
        let mut agent = factory.agent_for(&ac, &conversation);
        let observation = conversation.observation("AC").unwrap();
        assert_eq!(
            agent.produce_action(&observation).unwrap(),
            AC_REQUEST_UPDATED_REVIEWS
        );
    }

    #[test]
    fn test_area_chair_decision_prompt_lists_metareviews() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_complete()
            .withf(|messages, sampling| {
                messages[0].content.contains("Paper ID: 10\nMetareview: solid")
                    && messages[0].content.contains("Willingness to accept")
                    && sampling.temperature == 0.0
            })
            .times(1)
            .returning(|_, _| Ok("Paper ID: 10\nWillingness to accept: 1".to_string()));

        let conversation = Conversation::decision(
            ExperimentSetting::preset("BASELINE").unwrap(),
            vec![10],
            vec!["solid".to_string()],
            ScoringMethod::Ranking,
        )
        .unwrap();
        let mut agents = factory(backend).agents_for(&conversation);
        let observation = conversation.observation("AC").unwrap();
        let action = agents.get_mut("AC").unwrap().produce_action(&observation).unwrap();
        assert!(action.contains("Willingness to accept: 1"));
    }

    #[test]
    fn test_backend_failure_maps_to_agent_error() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_complete()
            .returning(|_, _| Err(BackendError::RequestFailed("timeout".to_string())));
        let mut conversation = review();
        conversation.step("Paper Extractor", "paper").unwrap();

        let mut agents = factory(backend).agents_for(&conversation);
        let observation = conversation.observation("Reviewer 1").unwrap();
        let err = agents
            .get_mut("Reviewer 1")
            .unwrap()
            .produce_action(&observation)
            .unwrap_err();
        assert!(matches!(err, AgentError::Backend(msg) if msg.contains("timeout")));
    }

    #[test]
    fn test_human_participants() {
        let conversation = review();
        let factory = factory(MockChatBackend::new()).with_humans(vec!["Reviewer 2".to_string()]);
        let mut agents = factory.agents_for(&conversation);
        let observation = conversation.observation("Reviewer 2").unwrap();
        assert!(matches!(
            agents.get_mut("Reviewer 2").unwrap().produce_action(&observation),
            Err(AgentError::NeedsHumanInput)
        ));
    }
}
