//! Responses synthesized when neither the network nor the cache can answer.

use serde::{Deserialize, Serialize};

use crate::models::Response;

const OFFLINE_STATUS: u16 = 503;
const OFFLINE_STATUS_TEXT: &str = "Service Unavailable";

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>OpenBalti - Offline</title>
  <style>
    body { font-family: system-ui, sans-serif; text-align: center; padding: 3rem 1rem; color: #1f2937; }
    button { margin-top: 1.5rem; padding: 0.6rem 1.4rem; border: 0; border-radius: 6px; background: #2563eb; color: #fff; font-size: 1rem; cursor: pointer; }
  </style>
</head>
<body>
  <h1>OpenBalti Dictionary</h1>
  <p>You are offline and this page has not been saved yet.</p>
  <p>Check your connection and try again.</p>
  <button onclick="window.location.reload()">Retry</button>
</body>
</html>
"#;

/// Body returned to API callers while offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineApiError {
    pub error: String,
    pub offline: bool,
    pub message: String,
}

impl Default for OfflineApiError {
    fn default() -> Self {
        Self {
            error: "Network unavailable".to_string(),
            offline: true,
            message: "This feature requires an internet connection".to_string(),
        }
    }
}

/// Minimal HTML page with a retry button, for navigations.
pub fn offline_page() -> Response {
    Response::html(OFFLINE_STATUS, OFFLINE_STATUS_TEXT, OFFLINE_PAGE)
}

/// Structured JSON error so API callers can detect the offline state.
pub fn offline_api() -> Response {
    let body = serde_json::json!(OfflineApiError::default());
    Response::new(
        OFFLINE_STATUS,
        OFFLINE_STATUS_TEXT,
        "application/json",
        body.to_string().into_bytes(),
    )
}

pub fn offline_generic() -> Response {
    Response::text(OFFLINE_STATUS, OFFLINE_STATUS_TEXT, "Offline")
}
