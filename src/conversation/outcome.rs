use serde::{Deserialize, Serialize};

use super::error::ChatError;

/// Result of a single `send`, as handed back to the host application.
///
/// On the wire this is always the three-field object
/// `{"success": bool, "response": string|null, "error": string|null}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "OutcomeEnvelope", try_from = "OutcomeEnvelope")]
pub enum ChatOutcome {
    Success { reply: String },
    Failure { error_message: String },
}

impl ChatOutcome {
    pub fn success(reply: impl Into<String>) -> Self {
        ChatOutcome::Success {
            reply: reply.into(),
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        ChatOutcome::Failure {
            error_message: error_message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ChatOutcome::Success { .. })
    }

    /// Serializes to a single line of JSON.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<Result<String, ChatError>> for ChatOutcome {
    fn from(result: Result<String, ChatError>) -> Self {
        match result {
            Ok(reply) => ChatOutcome::success(reply),
            Err(e) => ChatOutcome::failure(e.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct OutcomeEnvelope {
    success: bool,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl From<ChatOutcome> for OutcomeEnvelope {
    fn from(outcome: ChatOutcome) -> Self {
        match outcome {
            ChatOutcome::Success { reply } => OutcomeEnvelope {
                success: true,
                response: Some(reply),
                error: None,
            },
            ChatOutcome::Failure { error_message } => OutcomeEnvelope {
                success: false,
                response: None,
                error: Some(error_message),
            },
        }
    }
}

impl TryFrom<OutcomeEnvelope> for ChatOutcome {
    type Error = String;

    fn try_from(envelope: OutcomeEnvelope) -> Result<Self, Self::Error> {
        match envelope {
            OutcomeEnvelope {
                success: true,
                response: Some(reply),
                ..
            } => Ok(ChatOutcome::Success { reply }),
            OutcomeEnvelope { success: true, .. } => {
                Err("successful outcome is missing `response`".to_string())
            }
            OutcomeEnvelope {
                success: false,
                error,
                ..
            } => Ok(ChatOutcome::Failure {
                error_message: error.unwrap_or_else(|| "Unknown error".to_string()),
            }),
        }
    }
}
