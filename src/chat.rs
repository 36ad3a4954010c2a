use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classify::classify_chat;
use crate::config::endpoint;
use crate::error::{ChatError, ConfigError};
use crate::models::{ChatReply, ChatRequest, Message};

pub const CONTEXT_WINDOW: usize = 10;

pub const GREETING: &str = "Hi! I'm your AI learning assistant. How can I help you today?";

pub const REMEDIATION_CHECKLIST: &str = "Please make sure:\n\
• The backend server is running\n\
• The assistant API key is configured on the backend\n\
• You have a working internet connection";

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn reply(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

pub struct HttpChatBackend {
    http: Client,
    chat_url: Url,
}

impl HttpChatBackend {
    pub fn new(http: Client, base_url: &Url) -> Result<Self, ConfigError> {
        Ok(Self {
            http,
            chat_url: endpoint(base_url, "chat")?,
        })
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn reply(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let response = self
            .http
            .post(self.chat_url.clone())
            .json(request)
            .send()
            .await
            .map_err(|err| classify_chat(None, &err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| classify_chat(None, &err.to_string()))?;

        if !status.is_success() {
            return Err(classify_chat(Some(status.as_u16()), &body));
        }

        let reply: ChatReply =
            serde_json::from_str(&body).map_err(|err| ChatError::Protocol(err.to_string()))?;
        Ok(reply.response)
    }
}

pub struct ChatSession<B> {
    id: Uuid,
    backend: B,
    messages: Vec<Message>,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend,
            messages: vec![Message::assistant(GREETING)],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Full transcript in conversational order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent messages, as forwarded to the backend.
    pub fn context_window(&self) -> &[Message] {
        let start = self.messages.len().saturating_sub(CONTEXT_WINDOW);
        &self.messages[start..]
    }

    /// Sends one user turn and records the outcome.
    ///
    /// Blank input is rejected with [`ChatError::EmptyMessage`] and leaves the
    /// session untouched. Any other failure is still returned, but only after a
    /// diagnostic assistant message has been appended to the transcript.
    /// Taking `&mut self` keeps a session to one request in flight.
    pub async fn send(&mut self, user_text: &str) -> Result<Message, ChatError> {
        let text = user_text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let request = ChatRequest {
            message: text.to_string(),
            history: self.context_window().to_vec(),
        };
        self.messages.push(Message::user(text));
        debug!(
            session = %self.id,
            history = request.history.len(),
            "sending chat message"
        );

        let outcome = match self.backend.reply(&request).await {
            Ok(reply) if reply.trim().is_empty() => {
                Err(ChatError::Protocol("assistant returned an empty reply".to_string()))
            }
            other => other,
        };

        match outcome {
            Ok(reply) => {
                info!(session = %self.id, "assistant replied");
                let message = Message::assistant(reply);
                self.messages.push(message.clone());
                Ok(message)
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "chat request failed");
                self.messages.push(Message::assistant(diagnostic(&err)));
                Err(err)
            }
        }
    }
}

/// Assistant-authored text shown in place of a reply when a request fails.
pub fn diagnostic(err: &ChatError) -> String {
    format!("I'm sorry, I encountered an error: {err}\n\n{REMEDIATION_CHECKLIST}")
}
