use db::models::position::PositionFailure;
use serde::Deserialize;
use thiserror::Error;

/// Failures from the auth service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Session expired, please sign in again")]
    SessionExpired,
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Auth service rejected the request: HTTP {status} - {message}")]
    Rejected { status: u16, message: String },
    #[error("Request to auth service timed out")]
    Timeout,
    #[error("Request to auth service failed: {0}")]
    Transport(String),
    #[error("Failed to parse auth response: {0}")]
    Parse(String),
}

impl AuthError {
    /// Returns true if the error is transient and could be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }
}

/// Failures from the data API. Expected outcomes (missing rows, row-level
/// security denials, constraint violations) are values here, never panics.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Not found")]
    NotFound,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Position batch rejected for {} item(s)", .failures.len())]
    BatchRejected { failures: Vec<PositionFailure> },
    #[error("Request to data API timed out")]
    Timeout,
    #[error("Request to data API failed: {0}")]
    Transport(String),
    #[error("Failed to parse data API response: {0}")]
    Parse(String),
    #[error("Data API returned error: HTTP {status} - {message}")]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl DataError {
    /// Returns true if the error is transient and could be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }

    /// Maps a PostgREST error body onto the variants callers match on.
    pub fn from_postgrest(status: u16, body: &str) -> Self {
        let parsed: PostgrestErrorBody = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(_) => {
                return match status {
                    401 | 403 => Self::Forbidden(body.to_string()),
                    404 => Self::NotFound,
                    _ => Self::Remote {
                        status,
                        code: None,
                        message: body.to_string(),
                    },
                };
            }
        };

        let message = parsed.message.clone().unwrap_or_default();
        match parsed.code.as_deref() {
            Some("PGRST116") => Self::NotFound,
            Some("42501") => Self::Forbidden(message),
            Some("23505") => Self::Conflict(message),
            Some("23503" | "23502" | "22P02" | "23514") => Self::Validation(message),
            Some("PT409") => {
                let failures = parsed
                    .details
                    .as_deref()
                    .and_then(|details| serde_json::from_str::<Vec<PositionFailure>>(details).ok());
                match failures {
                    Some(failures) => Self::BatchRejected { failures },
                    None => Self::Parse(format!("unreadable batch failure details: {message}")),
                }
            }
            _ if status == 401 || status == 403 => Self::Forbidden(message),
            code => Self::Remote {
                status,
                code: code.map(str::to_string),
                message,
            },
        }
    }
}

impl From<AuthError> for DataError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::SessionExpired | AuthError::NotAuthenticated => Self::NotAuthenticated,
            AuthError::Timeout => Self::Timeout,
            AuthError::Transport(msg) => Self::Transport(msg),
            AuthError::Parse(msg) => Self::Parse(msg),
            AuthError::InvalidCredentials => Self::NotAuthenticated,
            AuthError::Rejected { status, message } => Self::Remote {
                status,
                code: None,
                message,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

pub(crate) fn map_reqwest_auth_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Timeout
    } else if e.is_decode() {
        AuthError::Parse(e.to_string())
    } else {
        AuthError::Transport(e.to_string())
    }
}

pub(crate) fn map_reqwest_data_error(e: reqwest::Error) -> DataError {
    if e.is_timeout() {
        DataError::Timeout
    } else if e.is_decode() {
        DataError::Parse(e.to_string())
    } else {
        DataError::Transport(e.to_string())
    }
}
