//! Collar lookup: a finder scans a tag and gets a relay code; the call
//! center redeems that code for the owner's phone number.

use crate::broker::{BrokerError, CodeBroker, Payload};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(15 * 60);

/// Public, non-sensitive collar details shown to whoever scanned the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CollarInfo {
    pub tag_id: String,
    pub pet_name: String,
    pub pet_image: Option<String>,
    pub pet_dob: Option<String>,
    pub neutered: bool,
    pub vaccinated: bool,
}

/// A registered collar as resolved by the directory.
#[derive(Clone)]
pub struct CollarRecord {
    pub info: CollarInfo,
    pub contact_phone: String,
}

impl fmt::Debug for CollarRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollarRecord")
            .field("info", &self.info)
            .field("contact_phone", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContactDetails {
    pub phone_number: String,
}

impl fmt::Debug for ContactDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactDetails")
            .field("phone_number", &"[REDACTED]")
            .finish()
    }
}

/// Source of registered collars.
#[async_trait]
pub trait CollarDirectory: Send + Sync {
    /// `Ok(None)` when the tag is unknown or not registered.
    async fn find_registered(&self, tag_id: &str) -> anyhow::Result<Option<CollarRecord>>;
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("collar not found or not registered")]
    CollarNotFound,
    #[error("invalid or expired code")]
    InvalidOrExpiredCode,
    #[error("no relay codes available")]
    KeyspaceExhausted,
    #[error("contact payload could not be encoded")]
    PayloadEncoding(#[source] serde_json::Error),
    #[error("stored payload could not be decoded")]
    CorruptPayload(#[source] serde_json::Error),
    #[error("collar directory unavailable")]
    Storage(#[source] anyhow::Error),
}

impl LookupError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CollarNotFound => "collar_not_found",
            Self::InvalidOrExpiredCode => "invalid_or_expired_code",
            Self::KeyspaceExhausted => "keyspace_exhausted",
            Self::PayloadEncoding(_) => "payload_encoding_failed",
            Self::CorruptPayload(_) => "corrupt_payload",
            Self::Storage(_) => "storage_unavailable",
        }
    }
}

impl From<BrokerError> for LookupError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::KeyspaceExhausted => Self::KeyspaceExhausted,
            BrokerError::NotFoundOrExpired => Self::InvalidOrExpiredCode,
        }
    }
}

#[must_use]
pub fn valid_tag_id(tag_id: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").is_ok_and(|regex| regex.is_match(tag_id))
}

pub struct CollarLookupFlow {
    directory: Arc<dyn CollarDirectory>,
    broker: Arc<CodeBroker>,
    code_ttl: Duration,
}

impl CollarLookupFlow {
    #[must_use]
    pub fn new(
        directory: Arc<dyn CollarDirectory>,
        broker: Arc<CodeBroker>,
        code_ttl: Duration,
    ) -> Self {
        Self {
            directory,
            broker,
            code_ttl,
        }
    }

    #[must_use]
    pub fn broker(&self) -> &CodeBroker {
        &self.broker
    }

    /// Resolve a tag to its public record and mint a relay code for the owner's phone.
    ///
    /// # Errors
    /// - [`LookupError::CollarNotFound`] for malformed, unknown or unregistered tags
    /// - [`LookupError::KeyspaceExhausted`] when no code is free
    /// - [`LookupError::Storage`] when the directory cannot be queried
    /// - [`LookupError::PayloadEncoding`] if the contact cannot be serialized
    #[instrument(skip_all, fields(tag_id = %tag_id))]
    pub async fn produce(&self, tag_id: &str) -> Result<(CollarInfo, String), LookupError> {
        if !valid_tag_id(tag_id) {
            debug!("rejected malformed tag id");
            return Err(LookupError::CollarNotFound);
        }

        let record = self
            .directory
            .find_registered(tag_id)
            .await
            .map_err(LookupError::Storage)?
            .ok_or(LookupError::CollarNotFound)?;

        let payload = serde_json::to_vec(&ContactDetails {
            phone_number: record.contact_phone,
        })
        .map_err(LookupError::PayloadEncoding)?;

        let code = self.broker.allocate(Payload::from(payload), self.code_ttl)?;
        info!(ttl_seconds = self.code_ttl.as_secs(), "relay code issued");

        Ok((record.info, code))
    }

    /// Redeem a relay code. The code stays valid until it expires.
    ///
    /// # Errors
    /// - [`LookupError::InvalidOrExpiredCode`] for unknown, expired or malformed codes
    /// - [`LookupError::CorruptPayload`] if the stored payload cannot be decoded
    pub fn consume(&self, code: &str) -> Result<ContactDetails, LookupError> {
        let payload = self.broker.get(code)?;
        serde_json::from_slice(payload.as_bytes()).map_err(|err| {
            warn!(error = %err, "relay code payload could not be decoded");
            LookupError::CorruptPayload(err)
        })
    }
}
