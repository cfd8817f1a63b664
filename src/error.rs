use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Gemini API key is required (set GEMINI_API_KEY or --api-key)")]
    MissingApiKey,

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Failed to decode provider payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Provider returned no candidates")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read system instruction file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("System instruction file '{0}' is empty")]
    EmptyInstruction(String),

    #[error("Invalid server address '{0}'")]
    InvalidAddr(String),
}
