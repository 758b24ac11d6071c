// ABOUTME: Opaque session state read from the access-token cookie.
// ABOUTME: Exposes only an authenticated flag and a non-secret fingerprint for query keys.

use std::fmt;

use sha2::{Digest, Sha256};

/// Digest bytes kept in a fingerprint.
const FINGERPRINT_BYTES: usize = 16;

/// Whether the current visitor holds an access token.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { token: String },
}

impl Session {
    /// Build a session from a raw token. Blank tokens are anonymous.
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Session::Authenticated {
                token: token.to_string(),
            },
            None => Session::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Session::Authenticated { token } => Some(token),
            Session::Anonymous => None,
        }
    }

    /// Hex prefix of the token's SHA-256, safe to show in query keys and logs.
    pub fn fingerprint(&self) -> Option<String> {
        self.token().map(|token| {
            let digest = Sha256::digest(token.as_bytes());
            hex::encode(&digest[..FINGERPRINT_BYTES])
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Anonymous => f.write_str("Anonymous"),
            Session::Authenticated { .. } => f
                .debug_struct("Authenticated")
                .field("fingerprint", &self.fingerprint())
                .finish(),
        }
    }
}
