use thiserror::Error;

/// Failures talking to the task API.
///
/// `Network` and `Status` are both network failures from the caller's
/// point of view; `Parse` means the server answered with something that
/// is not a task payload.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {message}")]
    Parse { url: String, message: String },
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Status { .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
