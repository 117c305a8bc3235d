use std::path::PathBuf;

use thiserror::Error;

pub const OUT_OF_CREDITS_MARKER: &str = "api key out of credits";
pub const INVALID_KEY_MARKERS: &[&str] = &[
    "re-enter a valid open ai api key",
    "api key not found",
    "invalid api key",
    "incorrect api key",
];

pub const CANCELED_MESSAGE: &str = "Processing was canceled by the user.";
pub const DEBUG_CANCELED_MESSAGE: &str = "Extra processing was canceled by the user.";
pub const TIMEOUT_MESSAGE: &str = "Operation timed out after 1 minute. Please try again.";
pub const SERVER_ERROR_MESSAGE: &str =
    "The server had an error processing your request. Please try again.";
pub const NETWORK_ERROR_MESSAGE: &str =
    "Could not reach the solving service. Check your connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoScreenshots,
    Canceled,
    Timeout,
    ServerError,
    Network,
    CreditsExhausted,
    InvalidCredential,
    MissingProblemInfo,
    Io,
    Decode,
    Unknown,
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("no screenshots to process")]
    NoScreenshots,
    #[error("request canceled")]
    Canceled,
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    CreditsExhausted(String),
    #[error("{0}")]
    InvalidCredential(String),
    #[error("No problem info available")]
    MissingProblemInfo,
    #[error("failed reading screenshot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected {route} response: {message}")]
    Decode { route: String, message: String },
    #[error("{0}")]
    Unknown(String),
}

impl SolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoScreenshots => ErrorKind::NoScreenshots,
            Self::Canceled => ErrorKind::Canceled,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::Network(_) => ErrorKind::Network,
            Self::CreditsExhausted(_) => ErrorKind::CreditsExhausted,
            Self::InvalidCredential(_) => ErrorKind::InvalidCredential,
            Self::MissingProblemInfo => ErrorKind::MissingProblemInfo,
            Self::Io { .. } => ErrorKind::Io,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Transient failures worth another attempt: 5xx, timeouts, dropped connections.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ServerError | ErrorKind::Timeout | ErrorKind::Network
        )
    }

    /// Text shown to the user once the error reaches the UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Canceled => CANCELED_MESSAGE.to_string(),
            Self::Timeout(_) => TIMEOUT_MESSAGE.to_string(),
            Self::ServerError { .. } => SERVER_ERROR_MESSAGE.to_string(),
            Self::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Maps a backend-provided failure message onto a business-rule error when it
/// carries one of the known markers.
pub fn classify_message(message: &str) -> SolveError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains(OUT_OF_CREDITS_MARKER) {
        return SolveError::CreditsExhausted(message.to_string());
    }
    if INVALID_KEY_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return SolveError::InvalidCredential(message.to_string());
    }
    SolveError::Unknown(message.to_string())
}

/// Classifies a non-2xx response.
pub fn classify_status(status: u16, message: &str) -> SolveError {
    if status >= 500 {
        return SolveError::ServerError {
            status,
            message: message.to_string(),
        };
    }
    match classify_message(message) {
        SolveError::Unknown(_) => match status {
            401 | 403 => SolveError::InvalidCredential(non_empty_or(
                message,
                "Please close this window and re-enter a valid Open AI API key.",
            )),
            402 => SolveError::CreditsExhausted(non_empty_or(message, "API Key out of credits")),
            _ => SolveError::Unknown(non_empty_or(
                message,
                &format!("request failed with status {status}"),
            )),
        },
        classified => classified,
    }
}

fn non_empty_or(message: &str, fallback: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_hundreds_are_retryable_server_errors() {
        let err = classify_status(502, "Bad Gateway");
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), SERVER_ERROR_MESSAGE);
    }

    #[test]
    fn credit_and_key_markers_win_over_status() {
        let credits = classify_status(400, "Error: API Key out of credits");
        assert_eq!(credits.kind(), ErrorKind::CreditsExhausted);
        assert!(!credits.is_retryable());

        let invalid = classify_message(
            "Invalid key. Please close this window and re-enter a valid Open AI API key.",
        );
        assert_eq!(invalid.kind(), ErrorKind::InvalidCredential);
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn bare_auth_statuses_get_default_messages() {
        assert_eq!(
            classify_status(401, "").kind(),
            ErrorKind::InvalidCredential
        );
        assert_eq!(classify_status(402, " ").kind(), ErrorKind::CreditsExhausted);
        let other = classify_status(404, "");
        assert_eq!(other.kind(), ErrorKind::Unknown);
        assert_eq!(other.to_string(), "request failed with status 404");
    }

    #[test]
    fn unknown_messages_pass_through_verbatim() {
        let err = classify_message("Failed to parse problem info");
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.user_message(), "Failed to parse problem info");
    }

    #[test]
    fn canceled_is_not_retryable() {
        assert!(!SolveError::Canceled.is_retryable());
        assert_eq!(SolveError::Canceled.user_message(), CANCELED_MESSAGE);
        assert!(SolveError::Timeout("60s".to_string()).is_retryable());
    }
}
