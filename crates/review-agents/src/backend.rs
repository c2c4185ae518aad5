//! Chat backends used by the participant agents.
//!
//! OpenAI-compatible chat completions over blocking `reqwest` (OpenAI and
//! Azure OpenAI), plus an offline backend that makes no API calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{BackendConfig, BackendKind};

/// Errors from a chat backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Response parse error: {0}")]
    ParseError(String),
}

/// Speaker of a chat message, in OpenAI terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters per request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Sampling {
    /// Reviewers and authors.
    pub const PLAYER: Self = Self {
        temperature: 0.9,
        max_tokens: 4096,
    };
    /// Area chairs decide deterministically.
    pub const AREA_CHAIR: Self = Self {
        temperature: 0.0,
        max_tokens: 4096,
    };
}

/// One chat completion per call.
#[cfg_attr(test, mockall::automock)]
pub trait ChatBackend {
    fn complete(&self, messages: &[ChatMessage], sampling: Sampling) -> Result<String, BackendError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

enum Auth {
    Bearer(String),
    AzureKey(String),
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiChat {
    client: reqwest::blocking::Client,
    url: String,
    auth: Auth,
    model: String,
    name: String,
}

impl OpenAiChat {
    const OPENAI_URL: &'static str = "https://api.openai.com/v1/chat/completions";

    fn http_client() -> Result<reqwest::blocking::Client, BackendError> {
        reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| BackendError::RequestFailed(format!("failed to create HTTP client: {}", e)))
    }

    pub fn openai(api_key: &str, model: &str) -> Result<Self, BackendError> {
        Ok(Self {
            client: Self::http_client()?,
            url: Self::OPENAI_URL.to_string(),
            auth: Auth::Bearer(api_key.to_string()),
            model: model.to_string(),
            name: "openai".to_string(),
        })
    }

    pub fn azure(
        api_key: &str,
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        model: &str,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: Self::http_client()?,
            url: format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
            auth: Auth::AzureKey(api_key.to_string()),
            model: model.to_string(),
            name: "azure-openai".to_string(),
        })
    }
}

impl ChatBackend for OpenAiChat {
    fn complete(&self, messages: &[ChatMessage], sampling: Sampling) -> Result<String, BackendError> {
        let request_body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": sampling.max_tokens,
            "temperature": sampling.temperature,
        });

        let request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        let request = match &self.auth {
            Auth::Bearer(key) => request.header("Authorization", format!("Bearer {}", key)),
            Auth::AzureKey(key) => request.header("api-key", key),
        };

        let response = request
            .json(&request_body)
            .send()
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Api { status, body });
        }

        let resp_json: serde_json::Value = response
            .json()
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| BackendError::ParseError("missing choices[0].message.content".to_string()))?
            .to_string();

        debug!(backend = %self.name, chars = content.len(), "chat completion received");
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Offline backend: no API calls, deterministic output.
///
/// When the conversation lists papers (`Paper ID: <n>` lines) it answers
/// in the decision format the prompt asks for, ranking papers in the order
/// they were listed; otherwise it echoes a short acknowledgement.
#[derive(Debug, Clone, Default)]
pub struct DummyBackend;

impl DummyBackend {
    fn listed_papers(messages: &[ChatMessage]) -> Vec<u64> {
        let mut ids = Vec::new();
        for line in messages.iter().flat_map(|m| m.content.lines()) {
            let line = line.trim();
            if !line.to_lowercase().starts_with("paper id:") {
                continue;
            }
            let value = line.split(':').nth(1).unwrap_or_default();
            if let Ok(id) = value.split('(').next().unwrap_or_default().trim().parse::<u64>() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }
}

impl ChatBackend for DummyBackend {
    fn complete(&self, messages: &[ChatMessage], _sampling: Sampling) -> Result<String, BackendError> {
        let papers = Self::listed_papers(messages);
        if !papers.is_empty() {
            let ranking = messages
                .iter()
                .any(|m| m.content.contains("Willingness to accept"));
            let lines: Vec<String> = papers
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    if ranking {
                        format!("Paper ID: {}\nWillingness to accept: {}", id, i + 1)
                    } else if i % 2 == 0 {
                        format!("Paper ID: {}\nDecision: Accept", id)
                    } else {
                        format!("Paper ID: {}\nDecision: Reject", id)
                    }
                })
                .collect();
            return Ok(lines.join("\n"));
        }

        let heard = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .count();
        Ok(format!("Acknowledged {} messages.", heard))
    }

    fn name(&self) -> &str {
        "dummy"
    }
}

/// Build the backend selected in the run configuration.
pub fn build_backend(config: &BackendConfig) -> Result<Box<dyn ChatBackend>, BackendError> {
    match &config.kind {
        BackendKind::OpenAi { api_key } => Ok(Box::new(OpenAiChat::openai(api_key, &config.model)?)),
        BackendKind::AzureOpenAi {
            api_key,
            endpoint,
            deployment,
            api_version,
        } => Ok(Box::new(OpenAiChat::azure(
            api_key,
            endpoint,
            deployment,
            api_version,
            &config.model,
        )?)),
        BackendKind::Dummy => Ok(Box::new(DummyBackend)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_ranks_listed_papers() {
        let messages = vec![
            ChatMessage::system(
                "Rank the papers.\nPaper ID: 1 # The paper ID you most want to accept.\n\
                 Willingness to accept: 1 # unique\n\
                 Paper ID: 39\nMetareview: fine\n-----\nPaper ID: 7\nMetareview: weak\n-----\n",
            ),
            ChatMessage::user("Now it's your turn to speak."),
        ];
        let out = DummyBackend.complete(&messages, Sampling::AREA_CHAIR).unwrap();
        assert_eq!(
            out,
            "Paper ID: 39\nWillingness to accept: 1\nPaper ID: 7\nWillingness to accept: 2"
        );
    }

    #[test]
    fn test_dummy_recommendation_and_plain() {
        let messages = vec![ChatMessage::system("Paper ID: 5\nPaper ID: 6\nDecision: ...")];
        let out = DummyBackend.complete(&messages, Sampling::AREA_CHAIR).unwrap();
        assert!(out.contains("Paper ID: 5\nDecision: Accept"));
        assert!(out.contains("Paper ID: 6\nDecision: Reject"));

        let plain = vec![ChatMessage::system("You are a reviewer."), ChatMessage::user("hi")];
        assert_eq!(
            DummyBackend.complete(&plain, Sampling::PLAYER).unwrap(),
            "Acknowledged 1 messages."
        );
    }

    #[test]
    fn test_chat_message_serializes_openai_shape() {
        let json = serde_json::to_value(ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "ok"}));
    }

    #[test]
    fn test_azure_url() {
        let chat = OpenAiChat::azure(
            "k",
            "https://myres.openai.azure.com/",
            "gpt4o-deploy",
            "2023-05-15",
            "gpt-4o",
        )
        .unwrap();
        assert_eq!(
            chat.url,
            "https://myres.openai.azure.com/openai/deployments/gpt4o-deploy/chat/completions?api-version=2023-05-15"
        );
        assert_eq!(chat.name(), "azure-openai");
    }
}
