// ABOUTME: Fetch error type shared by query fetchers and the retry policy.
// ABOUTME: Classifies failures structurally by status, falling back to the invalid-token message marker.

use serde::Serialize;
use thiserror::Error;

/// Marker the backend puts in the message of an invalid or expired token error.
pub const INVALID_TOKEN_ERROR: &str = "INVALID_TOKEN";

/// HTTP status the backend answers with when the token is rejected.
pub const UNAUTHORIZED_STATUS: u16 = 401;

/// Structured category of a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FetchErrorKind {
    InvalidToken,
    Http { status: u16 },
    Transport,
    Decode,
}

/// Error returned by a query fetcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    /// Build an error from an HTTP response status and message, classifying
    /// 401 or a message carrying the marker as an invalid token.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if status == UNAUTHORIZED_STATUS || message.contains(INVALID_TOKEN_ERROR) {
            FetchErrorKind::InvalidToken
        } else {
            FetchErrorKind::Http { status }
        };
        Self { kind, message }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::classified(FetchErrorKind::Transport, message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::classified(FetchErrorKind::Decode, message.into())
    }

    /// Build an error from a bare message, with only the marker to go on.
    pub fn message(message: impl Into<String>) -> Self {
        Self::classified(FetchErrorKind::Transport, message.into())
    }

    fn classified(fallback: FetchErrorKind, message: String) -> Self {
        let kind = if message.contains(INVALID_TOKEN_ERROR) {
            FetchErrorKind::InvalidToken
        } else {
            fallback
        };
        Self { kind, message }
    }

    pub fn is_invalid_token(&self) -> bool {
        self.kind == FetchErrorKind::InvalidToken
    }
}
