//! ES256 access and refresh tokens.
//!
//! Tokens are compact JWS strings: `base64url(header).base64url(claims).base64url(sig)`.
//! The claim set is fixed to `{sub, exp}`; the token class travels in the
//! protected `typ` header (`at+jwt` or `rt+jwt`). Only `ES256` is accepted,
//! and a token naming any other algorithm is rejected before its signature is
//! even looked at.

mod error;

pub use error::TokenError;

use crate::keys::Keypair;
use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

pub const ALGORITHM: &str = "ES256";
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    const fn typ(self) -> &'static str {
        match self {
            Self::Access => "at+jwt",
            Self::Refresh => "rt+jwt",
        }
    }

    fn from_typ(typ: &str) -> Option<Self> {
        match typ {
            "at+jwt" => Some(Self::Access),
            "rt+jwt" => Some(Self::Refresh),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Claims {
    sub: String,
    exp: i64,
}

/// A signed token. The encoded form is kept secret so it never lands in logs.
#[derive(Clone)]
pub struct Token {
    encoded: SecretString,
    subject: String,
    class: TokenClass,
    expires_at: i64,
}

impl Token {
    /// The compact encoded token, for transport only.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.encoded.expose_secret()
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub const fn class(&self) -> TokenClass {
        self.class
    }

    /// Expiry as unix seconds.
    #[must_use]
    pub const fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("encoded", &"[REDACTED]")
            .field("subject", &self.subject)
            .field("class", &self.class)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CredentialPair {
    pub access: Token,
    pub refresh: Token,
}

/// Per-class lifetimes used by [`TokenService::rotate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: DEFAULT_ACCESS_TTL,
            refresh: DEFAULT_REFRESH_TTL,
        }
    }
}

impl TokenTtls {
    #[must_use]
    pub const fn for_class(&self, class: TokenClass) -> Duration {
        match class {
            TokenClass::Access => self.access,
            TokenClass::Refresh => self.refresh,
        }
    }
}

/// Subject and class of a token that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub subject: String,
    pub class: TokenClass,
}

/// Issues and validates tokens with the injected keypair.
#[derive(Debug)]
pub struct TokenService {
    keys: Keypair,
    ttls: TokenTtls,
}

impl TokenService {
    #[must_use]
    pub const fn new(keys: Keypair, ttls: TokenTtls) -> Self {
        Self { keys, ttls }
    }

    #[must_use]
    pub const fn ttls(&self) -> TokenTtls {
        self.ttls
    }

    /// Issue a token expiring `ttl` from now.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if the claims cannot be encoded or signed.
    pub fn issue(
        &self,
        subject: &str,
        class: TokenClass,
        ttl: Duration,
    ) -> Result<Token, TokenError> {
        self.issue_at(subject, class, ttl, unix_now())
    }

    /// Issue a token expiring `ttl` after `now` (unix seconds).
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if the claims cannot be encoded or signed.
    pub fn issue_at(
        &self,
        subject: &str,
        class: TokenClass,
        ttl: Duration,
        now: i64,
    ) -> Result<Token, TokenError> {
        let ttl_seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_seconds);

        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some(class.typ().to_string()),
        };
        let claims = Claims {
            sub: subject.to_string(),
            exp: expires_at,
        };

        let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(&claims)?);
        let signature: Signature = self
            .keys
            .signing_key()
            .try_sign(signing_input.as_bytes())
            .map_err(|_| TokenError::Signing)?;
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_bytes());

        Ok(Token {
            encoded: SecretString::from(format!("{signing_input}.{signature_b64}")),
            subject: claims.sub,
            class,
            expires_at,
        })
    }

    /// Validate a presented token against the current time.
    ///
    /// # Errors
    /// Returns the first check that failed; see [`TokenService::validate_at`].
    pub fn validate(&self, token: &str) -> Result<Validated, TokenError> {
        self.validate_at(token, unix_now())
    }

    /// Validate a presented token as of `now` (unix seconds).
    ///
    /// A leading `Bearer ` is stripped. Checks run in order: structure,
    /// algorithm, class, signature, claim shape, expiry.
    ///
    /// # Errors
    /// - [`TokenError::Malformed`] for bad structure, encoding, class or claims
    /// - [`TokenError::WrongAlgorithm`] when the header names anything but `ES256`
    /// - [`TokenError::InvalidSignature`] when the signature does not verify
    /// - [`TokenError::Expired`] when `exp <= now`
    pub fn validate_at(&self, token: &str, now: i64) -> Result<Validated, TokenError> {
        let token = strip_bearer(token);

        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header: Header = b64d_json(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::WrongAlgorithm);
        }
        let class = header
            .typ
            .as_deref()
            .and_then(TokenClass::from_typ)
            .ok_or(TokenError::Malformed)?;

        let signature_bytes =
            Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Malformed)?;
        let signature =
            Signature::from_slice(&signature_bytes).map_err(|_| TokenError::InvalidSignature)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        self.keys
            .verifying_key()
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(Validated {
            subject: claims.sub,
            class,
        })
    }

    /// Issue a fresh access and refresh pair for `subject`.
    ///
    /// Nothing is validated here; the caller must already hold a valid refresh token.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if either token cannot be signed.
    pub fn rotate(&self, subject: &str) -> Result<CredentialPair, TokenError> {
        self.rotate_at(subject, unix_now())
    }

    /// [`TokenService::rotate`] with an explicit clock.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if either token cannot be signed.
    pub fn rotate_at(&self, subject: &str, now: i64) -> Result<CredentialPair, TokenError> {
        Ok(CredentialPair {
            access: self.issue_at(subject, TokenClass::Access, self.ttls.access, now)?,
            refresh: self.issue_at(subject, TokenClass::Refresh, self.ttls.refresh, now)?,
        })
    }
}

/// Current time in whole unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

fn strip_bearer(token: &str) -> &str {
    let trimmed = token.trim();
    trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))
        .map_or(trimmed, str::trim)
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|_| TokenError::Signing)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Malformed)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn service() -> TokenService {
        TokenService::new(Keypair::generate(), TokenTtls::default())
    }

    // Sign arbitrary header/claims JSON with the service key, bypassing issue().
    fn sign_raw(service: &TokenService, header: &str, claims: &str) -> String {
        let header_b64 = Base64UrlUnpadded::encode_string(header.as_bytes());
        let claims_b64 = Base64UrlUnpadded::encode_string(claims.as_bytes());
        let input = format!("{header_b64}.{claims_b64}");
        let signature: Signature = service.keys.signing_key().sign(input.as_bytes());
        let sig_b64 = Base64UrlUnpadded::encode_string(&signature.to_bytes());
        format!("{input}.{sig_b64}")
    }

    #[test]
    fn issued_tokens_validate_with_subject_and_class() -> Result<(), TokenError> {
        let service = service();
        for class in [TokenClass::Access, TokenClass::Refresh] {
            let token = service.issue_at("alice@example.com", class, Duration::from_secs(60), NOW)?;
            assert_eq!(token.expires_at(), NOW + 60);

            let validated = service.validate_at(token.expose(), NOW)?;
            assert_eq!(validated.subject, "alice@example.com");
            assert_eq!(validated.class, class);
        }
        Ok(())
    }

    #[test]
    fn validate_uses_wall_clock() -> Result<(), TokenError> {
        let service = service();
        let token = service.issue("bob", TokenClass::Access, Duration::from_secs(300))?;
        assert_eq!(service.validate(token.expose())?.subject, "bob");
        Ok(())
    }

    #[test]
    fn zero_ttl_is_immediately_expired() -> Result<(), TokenError> {
        let service = service();
        let token = service.issue("bob", TokenClass::Access, Duration::ZERO)?;
        assert_eq!(service.validate(token.expose()), Err(TokenError::Expired));
        Ok(())
    }

    #[test]
    fn expiry_boundary_is_exclusive() -> Result<(), TokenError> {
        let service = service();
        let token = service.issue_at("carol", TokenClass::Access, Duration::from_secs(10), NOW)?;

        assert!(service.validate_at(token.expose(), NOW + 9).is_ok());
        assert_eq!(
            service.validate_at(token.expose(), NOW + 10),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn bearer_prefix_is_stripped() -> Result<(), TokenError> {
        let service = service();
        let token = service.issue_at("dave", TokenClass::Access, Duration::from_secs(60), NOW)?;
        let presented = format!("Bearer {}", token.expose());
        assert_eq!(service.validate_at(&presented, NOW)?.subject, "dave");
        Ok(())
    }

    #[test]
    fn tampered_claims_fail_signature() -> Result<(), TokenError> {
        let service = service();
        let token = service.issue_at("erin", TokenClass::Access, Duration::from_secs(60), NOW)?;
        let mut parts: Vec<String> = token.expose().split('.').map(str::to_string).collect();
        parts[1] = Base64UrlUnpadded::encode_string(br#"{"sub":"mallory","exp":1700000060}"#);

        assert_eq!(
            service.validate_at(&parts.join("."), NOW),
            Err(TokenError::InvalidSignature)
        );
        Ok(())
    }

    #[test]
    fn token_from_another_key_fails_signature() -> Result<(), TokenError> {
        let issuer = service();
        let verifier = service();
        let token = issuer.issue_at("frank", TokenClass::Access, Duration::from_secs(60), NOW)?;
        assert_eq!(
            verifier.validate_at(token.expose(), NOW),
            Err(TokenError::InvalidSignature)
        );
        Ok(())
    }

    #[test]
    fn foreign_algorithms_are_rejected_even_with_valid_signature() {
        let service = service();
        let claims = r#"{"sub":"grace","exp":1700000060}"#;
        for alg in ["HS256", "RS256", "ES384", "EdDSA", "none", "es256"] {
            let header = format!(r#"{{"alg":"{alg}","typ":"at+jwt"}}"#);
            let token = sign_raw(&service, &header, claims);
            assert_eq!(
                service.validate_at(&token, NOW),
                Err(TokenError::WrongAlgorithm),
                "{alg} must be rejected"
            );
        }
    }

    #[test]
    fn unexpected_claims_are_rejected() {
        let service = service();
        let token = sign_raw(
            &service,
            r#"{"alg":"ES256","typ":"at+jwt"}"#,
            r#"{"sub":"heidi","exp":1700000060,"admin":true}"#,
        );
        assert_eq!(service.validate_at(&token, NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn missing_or_unknown_class_is_malformed() {
        let service = service();
        let claims = r#"{"sub":"ivan","exp":1700000060}"#;
        for header in [r#"{"alg":"ES256"}"#, r#"{"alg":"ES256","typ":"JWT"}"#] {
            let token = sign_raw(&service, header, claims);
            assert_eq!(service.validate_at(&token, NOW), Err(TokenError::Malformed));
        }
    }

    #[test]
    fn structurally_broken_tokens_are_malformed() {
        let service = service();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***", "Bearer "] {
            assert_eq!(
                service.validate_at(token, NOW),
                Err(TokenError::Malformed),
                "{token:?}"
            );
        }
    }

    #[test]
    fn rotate_issues_independent_pair() -> Result<(), TokenError> {
        let service = service();
        let pair = service.rotate_at("judy", NOW)?;

        assert_eq!(pair.access.class(), TokenClass::Access);
        assert_eq!(pair.refresh.class(), TokenClass::Refresh);
        assert_eq!(pair.access.expires_at(), NOW + 15 * 60);
        assert_eq!(pair.refresh.expires_at(), NOW + 7 * 24 * 60 * 60);
        assert_ne!(pair.access.expose(), pair.refresh.expose());

        assert_eq!(
            service.validate_at(pair.access.expose(), NOW)?.class,
            TokenClass::Access
        );
        assert_eq!(
            service.validate_at(pair.refresh.expose(), NOW)?.class,
            TokenClass::Refresh
        );
        Ok(())
    }

    #[test]
    fn debug_output_hides_encoded_token() -> Result<(), TokenError> {
        let service = service();
        let token = service.issue_at("ken", TokenClass::Access, Duration::from_secs(60), NOW)?;
        let rendered = format!("{token:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains(token.expose()));
        Ok(())
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(TokenError::Malformed.kind(), "malformed_token");
        assert_eq!(TokenError::InvalidSignature.kind(), "invalid_signature");
        assert_eq!(TokenError::WrongAlgorithm.kind(), "wrong_algorithm");
        assert_eq!(TokenError::Expired.kind(), "expired");
    }
}
