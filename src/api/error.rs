use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid backend url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {}", .message.as_deref().unwrap_or("no error message"))]
    Status {
        endpoint: &'static str,
        status: u16,
        message: Option<String>,
    },

    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

