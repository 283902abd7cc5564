//! Cookies carrying rotated credentials back to the client.

use axum::http::{header::InvalidHeaderValue, HeaderValue};

use crate::token::{CredentialPair, Token, TokenTtls};

pub const ACCESS_COOKIE: &str = "auth_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Build an `HttpOnly` cookie for one credential.
///
/// # Errors
/// Returns an error if the token contains bytes not allowed in a header.
pub fn credential_cookie(
    name: &str,
    token: &Token,
    max_age_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{name}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}",
        token.expose()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    let mut value = HeaderValue::from_str(&cookie)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Both `Set-Cookie` values for a freshly rotated pair.
///
/// # Errors
/// Returns an error if either token cannot be placed in a header.
pub fn rotation_cookies(
    pair: &CredentialPair,
    ttls: TokenTtls,
    secure: bool,
) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
    Ok([
        credential_cookie(ACCESS_COOKIE, &pair.access, ttls.access.as_secs(), secure)?,
        credential_cookie(REFRESH_COOKIE, &pair.refresh, ttls.refresh.as_secs(), secure)?,
    ])
}
