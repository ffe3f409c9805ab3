use std::time::Duration;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::search_kind::SearchKind;

const RESET_MESSAGE: &str =
    "Connection was reset by the server. The workflow may have crashed or timed out.";
const EXHAUSTED_HINT: &str = "Unable to fetch listings. The page may be blocking automated requests. Try using different search terms.";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("{0}")]
    Validation(String),

    #[error("search already in progress")]
    AdmissionConflict { user_id: String, kind: SearchKind },

    #[error("{}", .last_error.as_deref().unwrap_or("No listings found after multiple attempts"))]
    ExtractionExhausted {
        attempts: u32,
        last_error: Option<String>,
    },

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Browser session error: {0}")]
    Session(String),

    #[error("Page did not load within {}s", .0.as_secs())]
    PageLoadTimeout(Duration),

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} searches are not scraped by a browser")]
    UnsupportedKind(SearchKind),
}

impl SearchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn session(message: impl std::fmt::Display) -> Self {
        Self::Session(message.to_string())
    }

    pub fn selector(selector: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// JSON body returned to the caller for this error.
    pub fn body(&self) -> Value {
        match self {
            SearchError::Validation(_) | SearchError::AdmissionConflict { .. } => {
                json!({ "error": self.to_string() })
            }
            SearchError::ExtractionExhausted { attempts, .. } => json!({
                "error": self.to_string(),
                "attempts": attempts,
                "message": EXHAUSTED_HINT,
            }),
            SearchError::Relay(e) => json!({
                "error": e.user_message(),
                "details": e.to_string(),
            }),
            _ => json!({
                "error": self.to_string(),
                "details": format!("{:?}", self),
            }),
        }
    }
}

impl From<thirtyfour::error::WebDriverError> for SearchError {
    fn from(value: thirtyfour::error::WebDriverError) -> Self {
        SearchError::Session(value.to_string())
    }
}

impl ResponseError for SearchError {
    fn status_code(&self) -> StatusCode {
        match self {
            SearchError::Validation(_) => StatusCode::BAD_REQUEST,
            SearchError::AdmissionConflict { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("No webhook configured for {0} searches")]
    NotConfigured(SearchKind),

    #[error("Webhook did not respond within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Could not reach webhook: {0}")]
    Connect(String),

    #[error("Webhook connection was reset: {0}")]
    Reset(String),

    #[error("Webhook responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Empty response from webhook")]
    EmptyBody,

    #[error("Failed to parse webhook response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl RelayError {
    /// Explanation shown to the user, phrased for the failure class.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::Timeout(deadline) => format!(
                "Request timed out after {}. The webhook may be taking too long or is unresponsive.",
                spoken_duration(*deadline)
            ),
            RelayError::Reset(_) => RESET_MESSAGE.to_string(),
            RelayError::Connect(details) => {
                let details = details.to_lowercase();
                if details.contains("dns") || details.contains("resolve") {
                    "DNS lookup failed for the webhook URL.".to_string()
                } else if details.contains("reset") || details.contains("closed") {
                    RESET_MESSAGE.to_string()
                } else {
                    "Could not connect to the webhook. The server may be down.".to_string()
                }
            }
            _ => self.to_string(),
        }
    }
}

fn spoken_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        1 => "1 second".to_string(),
        60 => "1 minute".to_string(),
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        s if s >= 1 => format!("{} seconds", s),
        _ => format!("{} milliseconds", duration.as_millis()),
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Result store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Result store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
