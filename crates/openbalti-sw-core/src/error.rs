use thiserror::Error;

use crate::worker::WorkerState;

/// Failures of the cache storage backends.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache index is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache name: {0:?}")]
    InvalidName(String),
}

/// Failures of an outbound fetch. Non-2xx statuses are not errors here;
/// they come back as a `Response` and the caller decides.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Network unavailable")]
    Offline,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to cache essential file {url}: {reason}")]
    EssentialFile { url: String, reason: String },

    #[error("Cannot handle {event} while worker is {state:?}")]
    InvalidTransition { event: &'static str, state: WorkerState },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

impl WorkerError {
    /// Build an essential-file failure from a non-2xx response, quoting a
    /// bounded slice of the body.
    pub fn from_status(url: &str, status: u16, body: &str) -> Self {
        WorkerError::EssentialFile {
            url: url.to_string(),
            reason: Self::status_reason(status, body),
        }
    }

    fn status_reason(status: u16, body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            format!("status {}: {}", status, body)
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            format!(
                "status {}: {}... (truncated, {} total bytes)",
                status,
                &body[..cut],
                body.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_truncates_long_bodies() {
        let body = "x".repeat(500);
        let err = WorkerError::from_status("https://openbalti.com/", 500, &body);
        let msg = err.to_string();
        assert!(msg.contains("status 500"));
        assert!(msg.contains("truncated, 500 total bytes"));
    }

    #[test]
    fn test_from_status_keeps_short_bodies() {
        let err = WorkerError::from_status("https://openbalti.com/manifest.json", 404, "missing");
        assert_eq!(
            err.to_string(),
            "Failed to cache essential file https://openbalti.com/manifest.json: status 404: missing"
        );
    }
}
