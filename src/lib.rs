//! # Reunite (collar lookup with relay codes)
//!
//! `reunite` lets whoever finds a lost pet reach its owner without ever seeing
//! the owner's phone number.
//!
//! ## Relay codes
//!
//! Scanning a registered collar returns the pet's public details plus a short
//! numeric code. The code is bound, in memory only, to the owner's contact and
//! expires after a configurable TTL. A call center operator redeems the code
//! through the authenticated API to connect the call.
//!
//! - **Uniqueness:** no two live codes share a value; allocation fails with a
//!   retryable error once every code of the configured width is live.
//! - **Expiry:** expired codes are never returned and never count as taken.
//!
//! ## Credentials
//!
//! API callers present ES256-signed access and refresh tokens as headers or
//! cookies. An expired access token paired with a valid refresh token is
//! renewed transparently: the request proceeds and the response carries the
//! new pair as `HttpOnly` cookies. Every credential failure looks the same to
//! the client.

pub mod api;
pub mod auth;
pub mod broker;
pub mod cli;
pub mod keys;
pub mod lookup;
pub mod storage;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
