//! Postgres-backed collaborators: collar directory and administrator lookup.

use crate::{
    auth::CapabilityLookup,
    lookup::{CollarDirectory, CollarInfo, CollarRecord},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use tracing::{warn, Instrument};

/// Raw row of the collar query. Every column is nullable here so a bad row
/// surfaces as an error instead of a decode panic.
#[derive(Debug, Clone)]
struct CollarRow {
    tag_id: Option<String>,
    name: Option<String>,
    file: Option<String>,
    date_of_birth: Option<String>,
    neutered: Option<bool>,
    vaccinated: Option<bool>,
    mobile_number: Option<String>,
}

impl<'r> FromRow<'r, PgRow> for CollarRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            tag_id: row.try_get("tag_id")?,
            name: row.try_get("name")?,
            file: row.try_get("file")?,
            date_of_birth: row.try_get("date_of_birth")?,
            neutered: row.try_get("neutered")?,
            vaccinated: row.try_get("vaccinated")?,
            mobile_number: row.try_get("mobile_number")?,
        })
    }
}

impl CollarRow {
    /// `Ok(None)` when the owner has no phone number on file.
    fn into_record(self) -> Result<Option<CollarRecord>> {
        let tag_id = self.tag_id.context("collar row without tag_id")?;
        let Some(contact_phone) = self
            .mobile_number
            .filter(|phone| !phone.trim().is_empty())
        else {
            warn!(tag_id = %tag_id, "registered collar has no owner phone number");
            return Ok(None);
        };

        Ok(Some(CollarRecord {
            info: CollarInfo {
                pet_name: self.name.context("collar row without pet name")?,
                pet_image: self.file,
                pet_dob: self.date_of_birth,
                neutered: self.neutered.unwrap_or(false),
                vaccinated: self.vaccinated.unwrap_or(false),
                tag_id,
            },
            contact_phone,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct PgCollarDirectory {
    pool: PgPool,
}

impl PgCollarDirectory {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollarDirectory for PgCollarDirectory {
    async fn find_registered(&self, tag_id: &str) -> Result<Option<CollarRecord>> {
        let query = r"
            SELECT rc.tag_id,
                   pp.name,
                   img.file,
                   pp.date_of_birth::text AS date_of_birth,
                   COALESCE(pp.neutered, FALSE) AS neutered,
                   COALESCE(pp.vaccinated, FALSE) AS vaccinated,
                   u.mobile_number
            FROM reunite_collars rc
            JOIN pet_collars pc ON rc.tag_id = pc.collar_id
            JOIN pet_profiles pp ON pc.pet_id = pp.id
            JOIN user_pets up ON pp.id = up.pet_id
            JOIN user_profiles u ON up.user_id = u.email
            LEFT JOIN images img ON pp.picture_id = img.id
            WHERE rc.tag_id = $1 AND rc.registered = TRUE
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query_as::<_, CollarRow>(query)
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup collar")?;

        row.map_or(Ok(None), CollarRow::into_record)
    }
}

#[derive(Debug, Clone)]
pub struct PgCapabilityLookup {
    pool: PgPool,
}

impl PgCapabilityLookup {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CapabilityLookup for PgCapabilityLookup {
    async fn is_admin(&self, subject: &str) -> Result<bool> {
        let query = r"
            SELECT p.admin
            FROM users u
            JOIN personas p ON u.persona_id = p.id
            WHERE u.email = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(subject)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup administrator flag")?;
        let Some(row) = row else {
            return Ok(false);
        };
        let admin: Option<bool> = row
            .try_get("admin")
            .context("failed to decode administrator flag")?;
        Ok(admin.unwrap_or(false))
    }
}
