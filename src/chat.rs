//! Chat-completion service client.
//!
//! Single-turn only: every call sends one system instruction and one user
//! message, and nothing is remembered between calls.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::http;
use crate::models::RerankedDocument;

const SYSTEM_PREAMBLE: &str =
    "You are an expert programming assistant. Here are relevant code files ";

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Build the system instruction with the reranked documents inlined verbatim.
pub fn system_instruction(documents: &[RerankedDocument]) -> String {
    let mut prompt = String::from(SYSTEM_PREAMBLE);
    for doc in documents {
        prompt.push_str(&doc.text);
        prompt.push_str("\n\n\n\n");
    }
    prompt
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible `POST /chat/completions`.
pub struct OpenAiChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &ChatConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: http::endpoint(&config.base_url, "chat/completions"),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        let body = serde_json::to_value(&request)?;
        let json = http::post_json(&self.client, "Chat", &self.url, &self.api_key, &body).await?;
        parse_chat_response(json)
    }
}

/// Text of the first choice; an empty or missing message is an error.
pub fn parse_chat_response(json: serde_json::Value) -> Result<String> {
    let response: ChatResponse = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid chat response: {}", e))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Chat response contained no message"))
}
