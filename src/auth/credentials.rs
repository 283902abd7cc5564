//! Credential extraction from request headers and cookies.

use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap,
};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::cookies::{ACCESS_COOKIE, REFRESH_COOKIE};

pub const REFRESH_HEADER: &str = "refresh";

/// Access and refresh credentials as presented by the caller.
///
/// Each slot reads its header first and falls back to the matching cookie.
#[derive(Clone, Default)]
pub struct PresentedCredentials {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

impl fmt::Debug for PresentedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentedCredentials")
            .field("access", &self.access.is_some())
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}

impl PresentedCredentials {
    #[must_use]
    pub fn new(access: Option<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.map(SecretString::from),
            refresh: refresh.map(SecretString::from),
        }
    }

    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let access = header_value(headers, AUTHORIZATION.as_str())
            .or_else(|| cookie_value(headers, ACCESS_COOKIE));
        let refresh = header_value(headers, REFRESH_HEADER)
            .or_else(|| cookie_value(headers, REFRESH_COOKIE));
        Self::new(access, refresh)
    }

    #[must_use]
    pub fn access(&self) -> Option<&str> {
        self.access.as_ref().map(ExposeSecret::expose_secret)
    }

    #[must_use]
    pub fn refresh(&self) -> Option<&str> {
        self.refresh.as_ref().map(ExposeSecret::expose_secret)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == name && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}
