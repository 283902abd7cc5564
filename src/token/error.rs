use thiserror::Error;

/// Reasons a token could not be issued or validated.
///
/// The variants stay distinguishable for logs; the HTTP boundary renders all of
/// them as the same unauthorized response.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("unsupported algorithm")]
    WrongAlgorithm,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token")]
    Signing,
}

impl TokenError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::WrongAlgorithm => "wrong_algorithm",
            Self::Expired => "expired",
            Self::Signing => "signing_failed",
        }
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(_: serde_json::Error) -> Self {
        Self::Malformed
    }
}
