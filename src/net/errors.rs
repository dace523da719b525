//! Network Fetch Error Types
//!
//! Transport-level failures only: a non-success HTTP status is not an
//! error here, it comes back as a snapshot and the interception policy
//! decides what to do with it.

/// Transport failures while fetching a resource
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    BodyRead(String),
}

impl FetchError {
    /// Classify a reqwest transport error
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            FetchError::BodyRead(e.to_string())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}
