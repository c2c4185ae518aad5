//! Transcript persistence: saved review conversations and resume input.
//!
//! A transcript is the experiment setting plus every message of a finished
//! (or interrupted) conversation, in order.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::conversation::Conversation;
use crate::error::{ArenaError, ArenaResult};
use crate::message::Message;
use crate::participant::Role;
use crate::setting::ExperimentSetting;

/// A persisted conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Schema version for forward compatibility.
    #[serde(default = "current_version")]
    pub version: u32,
    pub experiment_setting: ExperimentSetting,
    /// Version of the role prompts the agents were given, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<String>,
    pub messages: Vec<Message>,
}

fn current_version() -> u32 {
    Transcript::CURRENT_VERSION
}

impl Transcript {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn from_conversation(conversation: &Conversation) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            experiment_setting: conversation.setting().clone(),
            prompt_version: None,
            messages: conversation.messages(),
        }
    }

    pub fn with_prompt_version(mut self, version: impl Into<String>) -> Self {
        self.prompt_version = Some(version.into());
        self
    }

    pub fn to_json(&self) -> ArenaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ArenaResult<Self> {
        let transcript: Self = serde_json::from_str(json)?;
        if transcript.version > Self::CURRENT_VERSION {
            return Err(ArenaError::config(format!(
                "transcript version {} is newer than supported version {}",
                transcript.version,
                Self::CURRENT_VERSION
            )));
        }
        Ok(transcript)
    }

    /// Write to `path`, creating parent directories. An existing file is
    /// only replaced when `overwrite` is set.
    pub fn save(&self, path: &Path, overwrite: bool) -> ArenaResult<()> {
        if path.exists() && !overwrite {
            return Err(ArenaError::TranscriptExists {
                path: path.to_path_buf(),
            });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), messages = self.messages.len(), "saved transcript");
        Ok(())
    }

    pub fn load(path: &Path) -> ArenaResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The metareview: content of the last message, when an area chair wrote it.
    pub fn metareview(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == Role::AreaChair)
            .map(|m| m.content.as_str())
    }
}

/// Load the metareview stored at `path`. Missing files and transcripts
/// that do not end with an area chair message both yield `None`.
pub fn load_metareview(path: &Path) -> ArenaResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let transcript = Transcript::load(path)?;
    Ok(transcript.metareview().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn finished_review() -> Conversation {
        let setting = ExperimentSetting::preset("BASELINE").unwrap();
        let mut conv = Conversation::review(setting, 39, "Accept: poster").unwrap();
        while let Some(speaker) = conv.next_speaker().unwrap().map(|p| p.id.clone()) {
            let text = format!("{} speaking", speaker);
            conv.step(&speaker, &text).unwrap();
        }
        conv
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("39").join("39.json");
        let transcript =
            Transcript::from_conversation(&finished_review()).with_prompt_version("1.2.0");

        transcript.save(&path, false).unwrap();
        let loaded = Transcript::load(&path).unwrap();

        assert_eq!(loaded.messages, transcript.messages);
        assert_eq!(loaded.experiment_setting.name, "BASELINE");
        assert_eq!(loaded.prompt_version.as_deref(), Some("1.2.0"));
        assert_eq!(loaded.metareview(), Some("AC speaking"));
    }

    #[test]
    fn test_prompt_version_is_optional() {
        let transcript = Transcript::from_conversation(&finished_review());
        let json = transcript.to_json().unwrap();
        assert!(!json.contains("prompt_version"));
        assert_eq!(Transcript::from_json(&json).unwrap().prompt_version, None);
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("39.json");
        let transcript = Transcript::from_conversation(&finished_review());

        transcript.save(&path, false).unwrap();
        let err = transcript.save(&path, false).unwrap_err();
        assert!(matches!(err, ArenaError::TranscriptExists { .. }));
        transcript.save(&path, true).unwrap();
    }

    #[test]
    fn test_metareview_absent_when_last_speaker_not_ac() {
        let setting = ExperimentSetting::preset("BASELINE").unwrap();
        let mut conv = Conversation::review(setting, 1, "Reject").unwrap();
        conv.step("Paper Extractor", "text").unwrap();
        let transcript = Transcript::from_conversation(&conv);
        assert_eq!(transcript.metareview(), None);
    }

    #[test]
    fn test_load_metareview_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load_metareview(&tmp.path().join("nope.json")).unwrap(), None);
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut json = serde_json::to_value(Transcript::from_conversation(&finished_review())).unwrap();
        json["version"] = serde_json::json!(99);
        let err = Transcript::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(err, ArenaError::Config(_)));
    }
}
