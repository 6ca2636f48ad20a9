use serde_json::Value;
use thiserror::Error;

pub const NETWORK_MESSAGE: &str = "Network error: unable to reach API server";
pub const FALLBACK_MESSAGE: &str = "Request failed";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    Forbidden { message: String, token_problem: bool },

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("{0}")]
    Network(String),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True for the cases that end the session and send the user back to login.
    pub fn forces_logout(&self) -> bool {
        match self {
            ApiError::SessionExpired | ApiError::Unauthorized(_) => true,
            ApiError::Forbidden { token_problem, .. } => *token_problem,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Server { status, .. } | ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Builds the error for a non-success response. `what` names the thing the
    /// request touched ("venue", "fixture result") for the not-found message.
    pub fn from_response(status: u16, body: &str, what: &str) -> Self {
        let extracted = extract_error_message(body);
        match status {
            401 => ApiError::Unauthorized(
                extracted.unwrap_or_else(|| "Not authenticated, please log in".to_string()),
            ),
            403 => {
                let message = extracted.unwrap_or_else(|| {
                    "Access forbidden: insufficient permissions".to_string()
                });
                let lower = message.to_ascii_lowercase();
                let token_problem = lower.contains("token") || lower.contains("expired");
                ApiError::Forbidden {
                    message,
                    token_problem,
                }
            }
            404 => ApiError::NotFound(extracted.unwrap_or_else(|| {
                format!("{what} not found (it may already have been deleted)")
            })),
            500..=599 => ApiError::Server {
                status,
                message: extracted.unwrap_or_else(|| {
                    format!("Server error ({status}): the API server is experiencing issues")
                }),
            },
            _ => ApiError::Rejected {
                status,
                message: extracted.unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            },
        }
    }
}

/// Pulls a display message out of an error body: `message`, then `error`, then
/// the first entry of `errors` (string, `.msg` or `.message`). A plain-text
/// body is the message itself.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };
    extract_from_value(&value)
}

fn extract_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Object(map) => {
            for key in ["message", "error"] {
                match map.get(key) {
                    Some(Value::String(s)) => {
                        if let Some(msg) = non_blank(s) {
                            return Some(msg);
                        }
                    }
                    Some(nested @ Value::Object(_)) => {
                        if let Some(msg) = extract_from_value(nested) {
                            return Some(msg);
                        }
                    }
                    _ => {}
                }
            }
            let first = map.get("errors")?.as_array()?.first()?;
            match first {
                Value::String(s) => non_blank(s),
                Value::Object(entry) => entry
                    .get("msg")
                    .or_else(|| entry.get("message"))
                    .and_then(|v| v.as_str())
                    .and_then(non_blank),
                _ => None,
            }
        }
        _ => None,
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
