//! Request authentication with transparent credential rotation.
//!
//! Flow Overview:
//! 1) Read the access credential (header, then cookie). None at all is a rejection.
//! 2) A valid access token authenticates the request as is.
//! 3) Otherwise a valid refresh token mints a new pair for its subject, which the
//!    boundary attaches to the response as cookies.
//! 4) The subject's administrator flag is looked up under a timeout; failures
//!    fall back to non-privileged and are logged as a degradation.

mod capability;
mod cookies;
mod credentials;

pub use capability::{Capabilities, CapabilityLookup};
pub use cookies::{credential_cookie, rotation_cookies, ACCESS_COOKIE, REFRESH_COOKIE};
pub use credentials::{PresentedCredentials, REFRESH_HEADER};

use crate::token::{CredentialPair, TokenClass, TokenError, TokenService};
use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_CAPABILITY_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    NoCredential,
    AccessValid,
    AccessExpiredRefreshValid,
    AccessExpiredRefreshInvalid,
    Rejected,
}

/// Why a single presented credential was not usable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential not presented")]
    Missing,
    #[error("token of the wrong class")]
    WrongClass,
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl CredentialError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing_credential",
            Self::WrongClass => "wrong_token_class",
            Self::Token(err) => err.kind(),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("invalid credential")]
    InvalidCredential {
        access: CredentialError,
        refresh: CredentialError,
    },
    #[error("failed to rotate credentials")]
    Rotation(#[source] TokenError),
}

impl AuthError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential { .. } => "invalid_credential",
            Self::Rotation(_) => "rotation_failed",
        }
    }

    /// Terminal state of a failed evaluation.
    #[must_use]
    pub const fn state(&self) -> GateState {
        GateState::Rejected
    }

    /// The gate state the request was in when it was rejected.
    #[must_use]
    pub const fn rejected_from(&self) -> GateState {
        match self {
            Self::MissingCredential => GateState::NoCredential,
            Self::InvalidCredential { .. } => GateState::AccessExpiredRefreshInvalid,
            Self::Rotation(_) => GateState::AccessExpiredRefreshValid,
        }
    }
}

/// Result of the token checks, before any capability lookup.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub subject: String,
    pub state: GateState,
    pub rotated: Option<CredentialPair>,
}

/// Subject bound to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject {
    pub subject: String,
    pub is_admin: bool,
    pub capability_degraded: bool,
}

#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub subject: AuthenticatedSubject,
    pub state: GateState,
    pub rotated: Option<CredentialPair>,
}

pub struct AuthGate {
    tokens: Arc<TokenService>,
    capabilities: Arc<dyn CapabilityLookup>,
    lookup_timeout: Duration,
    cookie_secure: bool,
}

impl AuthGate {
    #[must_use]
    pub fn new(tokens: Arc<TokenService>, capabilities: Arc<dyn CapabilityLookup>) -> Self {
        Self {
            tokens,
            capabilities,
            lookup_timeout: DEFAULT_CAPABILITY_TIMEOUT,
            cookie_secure: true,
        }
    }

    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Run the token state machine over the presented credentials.
    ///
    /// # Errors
    /// - [`AuthError::MissingCredential`] when no access credential was presented
    /// - [`AuthError::InvalidCredential`] when neither credential is usable
    /// - [`AuthError::Rotation`] when a replacement pair could not be signed
    pub fn evaluate(&self, presented: &PresentedCredentials) -> Result<Evaluation, AuthError> {
        let Some(access) = presented.access() else {
            debug!(
                state = ?GateState::Rejected,
                from = ?GateState::NoCredential,
                "no access credential presented"
            );
            return Err(AuthError::MissingCredential);
        };

        let access_error = match self.check(access, TokenClass::Access) {
            Ok(subject) => {
                debug!(state = ?GateState::AccessValid, "access credential accepted");
                return Ok(Evaluation {
                    subject,
                    state: GateState::AccessValid,
                    rotated: None,
                });
            }
            Err(err) => err,
        };

        let refreshed = presented
            .refresh()
            .ok_or(CredentialError::Missing)
            .and_then(|refresh| self.check(refresh, TokenClass::Refresh));

        let subject = match refreshed {
            Ok(subject) => subject,
            Err(refresh_error) => {
                warn!(
                    state = ?GateState::Rejected,
                    from = ?GateState::AccessExpiredRefreshInvalid,
                    access = access_error.kind(),
                    refresh = refresh_error.kind(),
                    "credential rejected"
                );
                return Err(AuthError::InvalidCredential {
                    access: access_error,
                    refresh: refresh_error,
                });
            }
        };

        let pair = self.tokens.rotate(&subject).map_err(AuthError::Rotation)?;
        info!(
            event = "credentials_rotated",
            state = ?GateState::AccessExpiredRefreshValid,
            access = access_error.kind(),
            "access credential renewed from refresh credential"
        );

        Ok(Evaluation {
            subject,
            state: GateState::AccessExpiredRefreshValid,
            rotated: Some(pair),
        })
    }

    /// Authenticate a request from its headers and resolve capabilities.
    ///
    /// # Errors
    /// See [`AuthGate::evaluate`].
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthOutcome, AuthError> {
        let presented = PresentedCredentials::from_headers(headers);
        let evaluation = self.evaluate(&presented)?;
        let capabilities = self.resolve_capabilities(&evaluation.subject).await;

        Ok(AuthOutcome {
            subject: AuthenticatedSubject {
                subject: evaluation.subject,
                is_admin: capabilities.is_admin,
                capability_degraded: capabilities.degraded,
            },
            state: evaluation.state,
            rotated: evaluation.rotated,
        })
    }

    /// Look up the administrator flag, bounded by the configured timeout.
    pub async fn resolve_capabilities(&self, subject: &str) -> Capabilities {
        match tokio::time::timeout(self.lookup_timeout, self.capabilities.is_admin(subject)).await
        {
            Ok(Ok(is_admin)) => Capabilities {
                is_admin,
                degraded: false,
            },
            Ok(Err(err)) => {
                warn!(
                    event = "capability_lookup_degraded",
                    reason = "lookup_failed",
                    error = %err,
                    "capability lookup failed, continuing without privileges"
                );
                Capabilities {
                    is_admin: false,
                    degraded: true,
                }
            }
            Err(_) => {
                warn!(
                    event = "capability_lookup_degraded",
                    reason = "timeout",
                    timeout_ms = u64::try_from(self.lookup_timeout.as_millis()).unwrap_or(u64::MAX),
                    "capability lookup timed out, continuing without privileges"
                );
                Capabilities {
                    is_admin: false,
                    degraded: true,
                }
            }
        }
    }

    /// `Set-Cookie` values for a rotated pair.
    ///
    /// # Errors
    /// Returns an error if a token cannot be placed in a header.
    pub fn rotation_cookies(
        &self,
        pair: &CredentialPair,
    ) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
        rotation_cookies(pair, self.tokens.ttls(), self.cookie_secure)
    }

    fn check(&self, token: &str, expected: TokenClass) -> Result<String, CredentialError> {
        let validated = self.tokens.validate(token)?;
        if validated.class != expected {
            return Err(CredentialError::WrongClass);
        }
        Ok(validated.subject)
    }
}
