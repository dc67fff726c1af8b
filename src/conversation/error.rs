use thiserror::Error;

/// Everything that can go wrong while talking to the chat provider.
///
/// Every failure path in the client resolves to exactly one of these kinds
/// before it reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// No API key was passed and none was found in the environment.
    #[error("OpenAI API key not provided")]
    MissingCredential,

    /// The provider answered with a non-2xx status.
    #[error("API Error: {message}")]
    Provider { status: u16, message: String },

    /// The provider answered 2xx but the body did not carry a reply.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Connection, DNS or timeout failure.
    #[error("Request failed: {0}")]
    Transport(String),
}

impl ChatError {
    /// Short name of the error kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::MissingCredential => "missing_credential",
            ChatError::Provider { .. } => "provider_error",
            ChatError::MalformedResponse(_) => "malformed_response",
            ChatError::Transport(_) => "transport_error",
        }
    }

    /// HTTP status returned by the provider, if it got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::Transport(format!("request timed out: {e}"))
        } else {
            ChatError::Transport(e.to_string())
        }
    }
}
