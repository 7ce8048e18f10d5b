//! Error types shared across the chat client.

use thiserror::Error;

/// Failures talking to the hosted inference endpoint.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API token rejected by the inference endpoint")]
    Unauthorized,

    #[error("rate limited by the inference endpoint")]
    RateLimited,

    #[error("model is loading, retry in about {estimated_secs:.0}s")]
    ModelLoading { estimated_secs: f64 },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Rejected chat-session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("input is empty")]
    EmptyInput,

    #[error("a response is already being generated")]
    Busy,

    #[error("no request is in flight")]
    NotBusy,

    #[error(transparent)]
    Generation(#[from] ProviderError),
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum PromptError {
    #[error("template is missing the {{{0}}} slot")]
    MissingSlot(&'static str),

    #[error("template contains {{{0}}} more than once")]
    DuplicateSlot(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API token: set HUGGINGFACEHUB_API_TOKEN or api_token in {0}")]
    MissingToken(String),

    #[error("invalid settings in config: {0}")]
    Settings(#[from] SettingsError),

    #[error("invalid prompt template: {0}")]
    Template(#[from] PromptError),

    #[error("logger error: {0}")]
    Logger(String),
}
