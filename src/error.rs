use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum ChatHubError {
    // Hub errors
    AdmissionRejected,
    HubClosed,

    // Messages errors
    MessageParseError(String),

    // Auth errors
    AuthError(String),
    Unauthorized,

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for ChatHubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdmissionRejected => write!(f, "Admission rejected: hub intake is saturated"),
            Self::HubClosed => write!(f, "Hub is shut down"),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::AuthError(msg) => write!(f, "Authentication error: {}", msg),
            Self::Unauthorized => write!(f, "Unauthorized access"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for ChatHubError {}

impl From<serde_json::Error> for ChatHubError {
    fn from(err: serde_json::Error) -> Self {
        ChatHubError::MessageParseError(err.to_string())
    }
}

// Generic result type for the hub
pub type Result<T> = std::result::Result<T, ChatHubError>;
