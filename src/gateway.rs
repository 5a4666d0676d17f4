//! Access to the model-serving backend.
//!
//! Callers hand over a model identifier and an ordered list of chat messages
//! and get back the generated text. One attempt per call; retrying or masking
//! a failure is up to the caller.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("inference backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("inference backend returned {status}: {body}")]
    Backend { status: StatusCode, body: String },

    #[error("malformed inference response: {0}")]
    Malformed(String),

    #[error("inference backend returned an empty response")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// One role-tagged content block, optionally carrying raw image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub images: Vec<Vec<u8>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.images.push(image);
        self
    }
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn invoke(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, InferenceError>;
}

/// Gateway speaking the Ollama `/api/chat` protocol with streaming disabled.
#[derive(Clone)]
pub struct OllamaGateway {
    client: Client,
    chat_url: String,
}

impl OllamaGateway {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, InferenceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(OllamaGateway {
            client: builder.build()?,
            chat_url: format!("{}/api/chat", base_url.trim_end_matches('/')),
        })
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        WireMessage {
            role: message.role,
            content: &message.content,
            images: message.images.iter().map(|bytes| STANDARD.encode(bytes)).collect(),
        }
    }
}

#[derive(Deserialize)]
struct WireResponse {
    message: Option<WireReply>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct WireReply {
    content: Option<String>,
}

fn parse_reply(status: StatusCode, body: &str) -> Result<String, InferenceError> {
    if !status.is_success() {
        return Err(InferenceError::Backend {
            status,
            body: body.to_string(),
        });
    }
    let reply: WireResponse =
        serde_json::from_str(body).map_err(|err| InferenceError::Malformed(err.to_string()))?;
    if let Some(error) = reply.error {
        return Err(InferenceError::Backend { status, body: error });
    }
    match reply.message.and_then(|m| m.content) {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(InferenceError::EmptyResponse),
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    #[instrument(
        name = "gateway.invoke",
        skip(self, messages),
        fields(messages = messages.len())
    )]
    async fn invoke(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, InferenceError> {
        let request = WireRequest {
            model,
            messages: messages.iter().map(WireMessage::from).collect(),
            stream: false,
        };
        let response = self.client.post(&self.chat_url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(message = "Inference response", status = %status, bytes = body.len());
        parse_reply(status, &body)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Gateway that answers from a queue and records every call.
    #[derive(Default)]
    pub(crate) struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<String, InferenceError>>>,
        calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    impl ScriptedGateway {
        pub(crate) fn replying(replies: Vec<Result<String, InferenceError>>) -> Self {
            ScriptedGateway {
                replies: Mutex::new(replies.into()),
                calls: Mutex::default(),
            }
        }

        pub(crate) fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    pub(crate) fn backend_down() -> InferenceError {
        InferenceError::Backend {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "model not loaded".into(),
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn invoke(
            &self,
            model: &str,
            messages: &[ChatMessage],
        ) -> Result<String, InferenceError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(InferenceError::EmptyResponse))
        }
    }
}
