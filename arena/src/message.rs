//! Message log: the append-only record of everything said in a conversation.
//!
//! Insertion order is the only ordering. Nothing is ever removed or
//! rewritten; readers get owned copies.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};
use crate::participant::Role;

/// Who may see a message under the default visibility rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Everyone.
    All,
    /// Only the listed participant ids.
    Only(BTreeSet<String>),
}

impl Visibility {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(ids.into_iter().map(Into::into).collect())
    }

    /// Whether the participant is named (or covered by `All`).
    pub fn includes(&self, participant_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(participant_id),
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Only(ids) => {
                let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
                write!(f, "{}", ids.join(","))
            }
        }
    }
}

/// One utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Participant id of the speaker.
    pub speaker_id: String,
    /// Speaker role at the time of speaking.
    pub role: Role,
    /// Free-text content.
    pub content: String,
    /// Turn counter when the message was produced.
    pub turn: u32,
    /// Phase index when the message was produced.
    pub phase: usize,
    pub timestamp: DateTime<Utc>,
    pub visible_to: Visibility,
    #[serde(default = "default_msg_type")]
    pub msg_type: String,
}

fn default_msg_type() -> String {
    "text".to_string()
}

impl Message {
    /// Create a message visible to all, stamped now.
    pub fn new(speaker_id: &str, role: Role, content: &str, turn: u32, phase: usize) -> Self {
        Self {
            speaker_id: speaker_id.to_string(),
            role,
            content: content.to_string(),
            turn,
            phase,
            timestamp: Utc::now(),
            visible_to: Visibility::All,
            msg_type: default_msg_type(),
        }
    }

    pub fn with_visibility(mut self, visible_to: Visibility) -> Self {
        self.visible_to = visible_to;
        self
    }

    /// One-line rendering used by logs and the CLI.
    pub fn render(&self) -> String {
        format!("[{}->{}]: {}", self.speaker_id, self.visible_to, self.content)
    }
}

/// Append-only ordered message store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Fails only when the speaker id is missing.
    pub fn append(&mut self, message: Message) -> ArenaResult<()> {
        if message.speaker_id.trim().is_empty() {
            return Err(ArenaError::MalformedMessage(
                "message has no speaker id".to_string(),
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Full ordered copy of the log.
    pub fn all(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Ordered copy of the messages matching `predicate`.
    pub fn filter<P>(&self, predicate: P) -> Vec<Message>
    where
        P: Fn(&Message) -> bool,
    {
        self.messages
            .iter()
            .filter(|m| predicate(m))
            .cloned()
            .collect()
    }

    /// Borrowing view, in order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(speaker: &str, role: Role, content: &str) -> Message {
        Message::new(speaker, role, content, 0, 0)
    }

    #[test]
    fn test_append_preserves_order() {
        let mut log = MessageLog::new();
        log.append(msg("Paper Extractor", Role::PaperExtractor, "paper"))
            .unwrap();
        log.append(msg("Reviewer 1", Role::Reviewer, "r1")).unwrap();
        log.append(msg("Reviewer 2", Role::Reviewer, "r2")).unwrap();

        let contents: Vec<String> = log.all().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["paper", "r1", "r2"]);
    }

    #[test]
    fn test_append_rejects_missing_speaker() {
        let mut log = MessageLog::new();
        let err = log.append(msg("  ", Role::Reviewer, "x")).unwrap_err();
        assert!(matches!(err, ArenaError::MalformedMessage(_)));
        assert!(log.is_empty());
    }

    #[test]
    fn test_all_returns_detached_copy() {
        let mut log = MessageLog::new();
        log.append(msg("Author", Role::Author, "rebuttal")).unwrap();

        let mut copy = log.all();
        copy[0].content = "tampered".to_string();
        copy.clear();

        assert_eq!(log.len(), 1);
        assert_eq!(log.all()[0].content, "rebuttal");
    }

    #[test]
    fn test_filter_keeps_relative_order() {
        let mut log = MessageLog::new();
        for (i, speaker) in ["Reviewer 1", "AC", "Reviewer 2", "AC"].iter().enumerate() {
            let role = if speaker.starts_with("AC") {
                Role::AreaChair
            } else {
                Role::Reviewer
            };
            log.append(msg(speaker, role, &i.to_string())).unwrap();
        }

        let ac: Vec<String> = log
            .filter(|m| m.role == Role::AreaChair)
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(ac, vec!["1", "3"]);
    }

    #[test]
    fn test_visibility_serde_and_display() {
        let v = Visibility::only(["Reviewer 1", "AC"]);
        assert!(v.includes("AC"));
        assert!(!v.includes("Author"));
        assert_eq!(v.to_string(), "AC,Reviewer 1");

        let json = serde_json::to_string(&Visibility::All).unwrap();
        assert_eq!(json, "\"all\"");
    }
}
