//! Visibility policy: which part of the log a participant may observe.
//!
//! The answer depends only on the phase index, the requester's role, the
//! area chair variant and (in the rebuttal phase) the speaker offset. It
//! never looks at message content or parses display names.

use tracing::debug;

use crate::message::{Message, MessageLog};
use crate::participant::{Participant, Role, Roster};
use crate::phase::{
    PHASE_AC_WRITE_METAREVIEWS, PHASE_AUTHOR_REVIEWER_DISCUSSION, PHASE_PAPER_EXTRACTION,
    PHASE_REVIEWER_AC_DISCUSSION, PHASE_REVIEWER_WRITE_REVIEWS,
};
use crate::setting::AcVariant;

/// Per-phase visibility rules for one conversation.
#[derive(Debug, Clone)]
pub struct VisibilityPolicy {
    /// Reviewer ids sorted by name; indexed by the rebuttal-phase offset.
    sorted_reviewer_ids: Vec<String>,
    ac_variant: AcVariant,
    /// Whether phases 0-4 use the review rules. Decision conversations use
    /// the default rule throughout.
    review_rules: bool,
}

impl VisibilityPolicy {
    /// Policy for a review conversation.
    pub fn for_review(roster: &Roster, ac_variant: AcVariant) -> Self {
        Self {
            sorted_reviewer_ids: roster.sorted_reviewer_ids(),
            ac_variant,
            review_rules: true,
        }
    }

    /// Policy for a decision conversation: default rule only.
    pub fn for_decision(ac_variant: AcVariant) -> Self {
        Self {
            sorted_reviewer_ids: Vec::new(),
            ac_variant,
            review_rules: false,
        }
    }

    pub fn ac_variant(&self) -> AcVariant {
        self.ac_variant
    }

    /// Messages of `log` visible to `requester`, in log order.
    pub fn visible_messages(
        &self,
        log: &MessageLog,
        phase_index: usize,
        requester: &Participant,
        next_speaker_offset: usize,
    ) -> Vec<Message> {
        let visible = if self.review_rules {
            self.review_rule(log, phase_index, requester, next_speaker_offset)
        } else {
            Self::default_rule(log, requester)
        };

        debug!(
            phase = phase_index,
            requester = %requester.id,
            count = visible.len(),
            from = %visible
                .iter()
                .map(|m| m.speaker_id.as_str())
                .collect::<Vec<_>>()
                .join(","),
            "visible messages"
        );
        visible
    }

    fn review_rule(
        &self,
        log: &MessageLog,
        phase_index: usize,
        requester: &Participant,
        next_speaker_offset: usize,
    ) -> Vec<Message> {
        match phase_index {
            PHASE_PAPER_EXTRACTION | PHASE_REVIEWER_WRITE_REVIEWS => {
                log.filter(|m| m.role == Role::PaperExtractor)
            }
            PHASE_AUTHOR_REVIEWER_DISCUSSION => {
                let addressed = self.sorted_reviewer_ids.get(next_speaker_offset);
                log.filter(|m| {
                    m.role == Role::PaperExtractor
                        || addressed.is_some_and(|id| *id == m.speaker_id)
                })
            }
            PHASE_REVIEWER_AC_DISCUSSION => match requester.role {
                Role::Author => Vec::new(),
                _ => log.all(),
            },
            PHASE_AC_WRITE_METAREVIEWS if requester.role == Role::AreaChair => {
                match self.ac_variant {
                    AcVariant::Inclusive | AcVariant::Baseline => log.all(),
                    AcVariant::Conformist => log.filter(|m| m.role.is_review_party()),
                    AcVariant::Authoritarian => log.filter(|m| !m.role.is_review_party()),
                }
            }
            _ => Self::default_rule(log, requester),
        }
    }

    /// Visible if addressed to all, to the requester, or the requester moderates.
    fn default_rule(log: &MessageLog, requester: &Participant) -> Vec<Message> {
        if requester.role == Role::Moderator {
            return log.all();
        }
        log.filter(|m| m.visible_to.includes(&requester.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Visibility;
    use crate::setting::ReviewerProfile;

    fn roster() -> Roster {
        Roster::new(vec![
            Participant::paper_extractor(),
            Participant::area_chair(AcVariant::Baseline),
            Participant::author(),
            Participant::reviewer(2, ReviewerProfile::default()),
            Participant::reviewer(1, ReviewerProfile::default()),
            Participant::reviewer(3, ReviewerProfile::default()),
        ])
        .unwrap()
    }

    fn populated_log() -> MessageLog {
        let mut log = MessageLog::new();
        let entries = [
            ("Paper Extractor", Role::PaperExtractor, 0),
            ("Reviewer 2", Role::Reviewer, 1),
            ("Reviewer 1", Role::Reviewer, 1),
            ("Reviewer 3", Role::Reviewer, 1),
            ("Author", Role::Author, 2),
            ("AC", Role::AreaChair, 3),
        ];
        for (speaker, role, phase) in entries {
            log.append(Message::new(speaker, role, speaker, 0, phase))
                .unwrap();
        }
        log
    }

    fn speakers(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.speaker_id.as_str()).collect()
    }

    #[test]
    fn test_early_phases_only_show_extractor() {
        let roster = roster();
        let policy = VisibilityPolicy::for_review(&roster, AcVariant::Baseline);
        let log = populated_log();
        for phase in [0, 1] {
            for p in roster.iter() {
                let seen = policy.visible_messages(&log, phase, p, 0);
                assert_eq!(speakers(&seen), vec!["Paper Extractor"]);
            }
        }
    }

    #[test]
    fn test_rebuttal_phase_uses_sorted_reviewer_order() {
        let roster = roster();
        let policy = VisibilityPolicy::for_review(&roster, AcVariant::Baseline);
        let log = populated_log();
        let author = roster.require("Author").unwrap();

        let seen = policy.visible_messages(&log, 2, author, 0);
        assert_eq!(speakers(&seen), vec!["Paper Extractor", "Reviewer 1"]);

        let seen = policy.visible_messages(&log, 2, author, 2);
        assert_eq!(speakers(&seen), vec!["Paper Extractor", "Reviewer 3"]);
    }

    #[test]
    fn test_discussion_phase_hides_everything_from_author() {
        let roster = roster();
        let policy = VisibilityPolicy::for_review(&roster, AcVariant::Baseline);
        let log = populated_log();

        let author = roster.require("Author").unwrap();
        assert!(policy.visible_messages(&log, 3, author, 0).is_empty());

        for id in ["AC", "Reviewer 2", "Paper Extractor"] {
            let p = roster.require(id).unwrap();
            assert_eq!(policy.visible_messages(&log, 3, p, 1).len(), log.len());
        }
    }

    #[test]
    fn test_metareview_visibility_by_ac_variant() {
        let roster = roster();
        let log = populated_log();
        let ac = roster.require("AC").unwrap();

        let inclusive = VisibilityPolicy::for_review(&roster, AcVariant::Inclusive);
        assert_eq!(inclusive.visible_messages(&log, 4, ac, 0).len(), 6);

        let conformist = VisibilityPolicy::for_review(&roster, AcVariant::Conformist);
        assert_eq!(
            speakers(&conformist.visible_messages(&log, 4, ac, 0)),
            vec!["Reviewer 2", "Reviewer 1", "Reviewer 3", "Author"]
        );

        let authoritarian = VisibilityPolicy::for_review(&roster, AcVariant::Authoritarian);
        let seen = authoritarian.visible_messages(&log, 4, ac, 0);
        assert_eq!(speakers(&seen), vec!["Paper Extractor", "AC"]);
        assert!(seen
            .iter()
            .all(|m| !m.speaker_id.starts_with("Author") && !m.speaker_id.starts_with("Reviewer")));
    }

    #[test]
    fn test_default_rule_honors_visible_to_and_moderator() {
        let mut log = MessageLog::new();
        log.append(Message::new("AC", Role::AreaChair, "public", 0, 5))
            .unwrap();
        log.append(
            Message::new("AC", Role::AreaChair, "private", 0, 5)
                .with_visibility(Visibility::only(["Reviewer 1"])),
        )
        .unwrap();

        let policy = VisibilityPolicy::for_decision(AcVariant::Baseline);
        let r1 = Participant::reviewer(1, ReviewerProfile::default());
        let r2 = Participant::reviewer(2, ReviewerProfile::default());
        let moderator = Participant::moderator("Moderator");

        assert_eq!(policy.visible_messages(&log, 5, &r1, 0).len(), 2);
        assert_eq!(policy.visible_messages(&log, 5, &r2, 0).len(), 1);
        assert_eq!(policy.visible_messages(&log, 5, &moderator, 0).len(), 2);
    }

    #[test]
    fn test_metareview_phase_non_ac_falls_back_to_default_rule() {
        let roster = roster();
        let policy = VisibilityPolicy::for_review(&roster, AcVariant::Authoritarian);
        let log = populated_log();
        let reviewer = roster.require("Reviewer 1").unwrap();
        assert_eq!(policy.visible_messages(&log, 4, reviewer, 0).len(), log.len());
    }
}
