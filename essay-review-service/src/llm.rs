//! Generative-model adapter. Stages talk to [`ChatModel`]; the production implementation
//! drives an OpenRouter agent through rig.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rig::{
    client::CompletionClient,
    completion::{Chat, Message},
    providers::openrouter,
};
use tracing::debug;

use crate::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
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

/// Prompt-in, text-out model call. Failures are returned to the caller untouched.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// A conversation reshaped for an agent: preamble, history, and the prompt to answer
#[derive(Debug)]
struct AgentCall {
    preamble: String,
    history: Vec<Message>,
    prompt: String,
}

fn to_rig_message(msg: &ChatMessage) -> Message {
    match msg.role {
        ChatRole::User => Message::user(msg.content.clone()),
        ChatRole::Assistant => Message::assistant(msg.content.clone()),
        // rig has no mid-conversation system message
        ChatRole::System => Message::user(format!("[SYSTEM] {}", msg.content)),
    }
}

fn split_conversation(messages: &[ChatMessage]) -> Result<AgentCall> {
    let (last, rest) = messages
        .split_last()
        .ok_or_else(|| anyhow!("conversation is empty"))?;
    if last.role != ChatRole::User {
        return Err(anyhow!("conversation must end with a user message"));
    }

    let leading_system = rest
        .iter()
        .take_while(|m| m.role == ChatRole::System)
        .count();
    let preamble = rest[..leading_system]
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let history = rest[leading_system..].iter().map(to_rig_message).collect();

    Ok(AgentCall {
        preamble,
        history,
        prompt: last.content.clone(),
    })
}

/// OpenRouter-backed chat model; the client is built once and shared
pub struct OpenRouterChatModel {
    client: openrouter::Client,
    model: String,
    temperature: f64,
}

impl OpenRouterChatModel {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: openrouter::Client::new(&settings.openrouter_api_key),
            model: settings.model_name.clone(),
            temperature: settings.temperature,
        }
    }
}

#[async_trait]
impl ChatModel for OpenRouterChatModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        let call = split_conversation(messages)?;
        debug!(
            model = %self.model,
            history_len = call.history.len(),
            prompt_len = call.prompt.len(),
            "Invoking chat model"
        );

        let agent = self
            .client
            .agent(&self.model)
            .preamble(&call.preamble)
            .temperature(self.temperature)
            .build();

        let response = agent.chat(call.prompt.as_str(), call.history).await?;
        Ok(response)
    }
}
