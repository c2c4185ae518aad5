//! Participants: who takes part in a conversation and in which role.
//!
//! Roles are attached at construction time and never derived from the
//! display id afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};
use crate::setting::{AcVariant, ExperimentSetting, ReviewerProfile};

/// Canonical id of the paper extractor.
pub const PAPER_EXTRACTOR_ID: &str = "Paper Extractor";
/// Canonical id of the author.
pub const AUTHOR_ID: &str = "Author";
/// Canonical id of the area chair.
pub const AREA_CHAIR_ID: &str = "AC";

/// Role of a participant in the review process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Supplies the paper text; never calls an LLM.
    PaperExtractor,
    /// Writes and updates reviews.
    Reviewer,
    /// Writes rebuttals.
    Author,
    /// Writes the metareview and makes decisions.
    AreaChair,
    /// Sees everything under the default visibility rule.
    Moderator,
}

impl Role {
    /// Whether messages from this role count as reviewer/author input for AC variants.
    pub fn is_review_party(self) -> bool {
        matches!(self, Self::Reviewer | Self::Author)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaperExtractor => write!(f, "paper_extractor"),
            Self::Reviewer => write!(f, "reviewer"),
            Self::Author => write!(f, "author"),
            Self::AreaChair => write!(f, "area_chair"),
            Self::Moderator => write!(f, "moderator"),
        }
    }
}

/// Per-role behavioral attributes fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Persona {
    /// No behavioral variant.
    Plain,
    /// Reviewer traits.
    Reviewer(ReviewerProfile),
    /// Area chair variant.
    AreaChair { variant: AcVariant },
}

/// A configured participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Display id, unique within a roster (e.g. "Reviewer 2").
    pub id: String,
    /// Role used by visibility and agent selection.
    pub role: Role,
    /// Behavioral variant.
    pub persona: Persona,
}

impl Participant {
    pub fn paper_extractor() -> Self {
        Self {
            id: PAPER_EXTRACTOR_ID.to_string(),
            role: Role::PaperExtractor,
            persona: Persona::Plain,
        }
    }

    pub fn author() -> Self {
        Self {
            id: AUTHOR_ID.to_string(),
            role: Role::Author,
            persona: Persona::Plain,
        }
    }

    /// Reviewer with a 1-based index ("Reviewer 1", "Reviewer 2", ...).
    pub fn reviewer(index: usize, profile: ReviewerProfile) -> Self {
        Self {
            id: format!("Reviewer {}", index),
            role: Role::Reviewer,
            persona: Persona::Reviewer(profile),
        }
    }

    pub fn area_chair(variant: AcVariant) -> Self {
        Self {
            id: AREA_CHAIR_ID.to_string(),
            role: Role::AreaChair,
            persona: Persona::AreaChair { variant },
        }
    }

    pub fn moderator(id: &str) -> Self {
        Self {
            id: id.to_string(),
            role: Role::Moderator,
            persona: Persona::Plain,
        }
    }

    /// Area chair variant, if this participant is an area chair.
    pub fn ac_variant(&self) -> Option<AcVariant> {
        match &self.persona {
            Persona::AreaChair { variant } => Some(*variant),
            _ => None,
        }
    }

    /// Reviewer profile, if this participant is a reviewer.
    pub fn reviewer_profile(&self) -> Option<&ReviewerProfile> {
        match &self.persona {
            Persona::Reviewer(profile) => Some(profile),
            _ => None,
        }
    }
}

/// The ordered set of participants in one conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    /// Build a roster, rejecting duplicate ids.
    pub fn new(participants: Vec<Participant>) -> ArenaResult<Self> {
        for (i, p) in participants.iter().enumerate() {
            if participants[..i].iter().any(|q| q.id == p.id) {
                return Err(ArenaError::config(format!(
                    "participant ids must be unique, '{}' appears twice",
                    p.id
                )));
            }
        }
        Ok(Self { participants })
    }

    /// Extractor, reviewers, author and AC for a review conversation.
    pub fn for_review(setting: &ExperimentSetting) -> ArenaResult<Self> {
        let mut participants = vec![Participant::paper_extractor()];
        participants.push(Participant::area_chair(setting.area_chair()?));
        participants.push(Participant::author());
        participants.extend(
            setting
                .reviewers
                .iter()
                .enumerate()
                .map(|(i, profile)| Participant::reviewer(i + 1, profile.clone())),
        );
        Self::new(participants)
    }

    /// Only the AC, for a decision conversation.
    pub fn for_decision(setting: &ExperimentSetting) -> ArenaResult<Self> {
        Self::new(vec![Participant::area_chair(setting.area_chair()?)])
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn require(&self, id: &str) -> ArenaResult<&Participant> {
        self.get(id)
            .ok_or_else(|| ArenaError::UnknownParticipant(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Ids of all participants with the given role, in roster order.
    pub fn ids_with_role(&self, role: Role) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| p.role == role)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Reviewer ids sorted lexicographically by name.
    pub fn sorted_reviewer_ids(&self) -> Vec<String> {
        let mut ids = self.ids_with_role(Role::Reviewer);
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Roster::new(vec![Participant::author(), Participant::author()]).unwrap_err();
        assert!(matches!(err, ArenaError::Config(_)));
    }

    #[test]
    fn test_review_roster() {
        let setting = ExperimentSetting::preset("malicious_Rx1").unwrap();
        let roster = Roster::for_review(&setting).unwrap();
        assert_eq!(roster.len(), 6);
        assert_eq!(roster.require("AC").unwrap().role, Role::AreaChair);
        assert_eq!(roster.require("Reviewer 3").unwrap().role, Role::Reviewer);
        assert_eq!(
            roster.sorted_reviewer_ids(),
            vec!["Reviewer 1", "Reviewer 2", "Reviewer 3"]
        );
    }

    #[test]
    fn test_sorted_reviewer_ids_is_lexicographic() {
        let roster = Roster::new(vec![
            Participant::reviewer(2, ReviewerProfile::default()),
            Participant::reviewer(1, ReviewerProfile::default()),
            Participant::reviewer(3, ReviewerProfile::default()),
        ])
        .unwrap();
        assert_eq!(
            roster.sorted_reviewer_ids(),
            vec!["Reviewer 1", "Reviewer 2", "Reviewer 3"]
        );
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::AreaChair.to_string(), "area_chair");
        assert_eq!(Role::PaperExtractor.to_string(), "paper_extractor");
        assert!(Role::Author.is_review_party());
        assert!(!Role::AreaChair.is_review_party());
    }

    #[test]
    fn test_unknown_participant() {
        let roster = Roster::new(vec![Participant::author()]).unwrap();
        assert!(matches!(
            roster.require("Reviewer 9"),
            Err(ArenaError::UnknownParticipant(_))
        ));
    }
}
