pub mod error;
pub mod outcome;
pub mod state;

use std::env;

use tracing::{debug, warn};

pub use error::ChatError;
pub use outcome::ChatOutcome;
pub use state::{ConversationState, Message, Role};

use crate::openai_client::{parse_reply, ChatRequest, ChatTransport};

/// Environment variable consulted when no API key is passed explicitly.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant buddy named Leo Pet. Be friendly, concise, and helpful.";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// One conversation with the model.
///
/// The client owns its transcript exclusively. Every [`send`](Self::send)
/// records the user turn, issues exactly one request carrying the system
/// prompt plus the whole transcript, and records the assistant turn only
/// when a reply comes back. Taking `&mut self` keeps requests on a single
/// client strictly sequential.
pub struct ConversationClient<T> {
    api_key: String,
    transport: T,
    settings: CompletionSettings,
    conversation_state: ConversationState,
}

impl<T: ChatTransport> ConversationClient<T> {
    /// Creates a client, falling back to `OPENAI_API_KEY` when `api_key` is
    /// absent or empty.
    pub fn new(api_key: Option<String>, transport: T) -> Result<Self, ChatError> {
        Self::with_settings(api_key, transport, CompletionSettings::default())
    }

    pub fn with_settings(
        api_key: Option<String>,
        transport: T,
        settings: CompletionSettings,
    ) -> Result<Self, ChatError> {
        Self::from_parts(api_key, env::var(API_KEY_ENV).ok(), transport, settings)
    }

    fn from_parts(
        api_key: Option<String>,
        env_api_key: Option<String>,
        transport: T,
        settings: CompletionSettings,
    ) -> Result<Self, ChatError> {
        let api_key = resolve_api_key(api_key, env_api_key)?;

        Ok(Self {
            api_key,
            transport,
            settings,
            conversation_state: ConversationState::new(),
        })
    }

    /// Sends one user message and returns the outcome in its wire shape.
    pub async fn send(&mut self, message: &str) -> ChatOutcome {
        self.try_send(message).await.into()
    }

    /// Same as [`send`](Self::send) but keeps the typed error.
    pub async fn try_send(&mut self, message: &str) -> Result<String, ChatError> {
        self.conversation_state.add_user_message(message);

        let request = self.build_request();
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat message"
        );

        let result = match self.transport.post_chat(&self.api_key, &request).await {
            Ok(response) => parse_reply(response),
            Err(e) => Err(e),
        };

        match result {
            Ok(reply) => {
                self.conversation_state.add_assistant_message(&reply);
                debug!(history = self.conversation_state.len(), "Recorded assistant reply");
                Ok(reply)
            }
            Err(e) => {
                warn!(kind = e.kind(), status = ?e.status(), "Chat request failed: {}", e);
                Err(e)
            }
        }
    }

    /// Copy of the transcript, oldest turn first.
    pub fn history(&self) -> Vec<Message> {
        self.conversation_state.snapshot()
    }

    pub fn clear(&mut self) {
        self.conversation_state.clear();
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    fn build_request(&self) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.conversation_state.len() + 1);
        messages.push(Message::system(SYSTEM_PROMPT));
        messages.extend(self.conversation_state.get_messages().iter().cloned());

        ChatRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }
}

fn resolve_api_key(
    explicit: Option<String>,
    from_env: Option<String>,
) -> Result<String, ChatError> {
    explicit
        .filter(|key| !key.is_empty())
        .or(from_env.filter(|key| !key.is_empty()))
        .ok_or(ChatError::MissingCredential)
}
