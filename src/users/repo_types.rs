use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Audit block kept alongside every user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime, // set once on create
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime, // refreshed on every update
    pub created_by: String,         // actor that created the row
    pub updated_by: String,         // actor of the last mutation
}

impl Metadata {
    /// Fresh audit block for a record created by `actor` at `now`.
    pub fn created(now: OffsetDateTime, actor: &str) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            created_by: actor.to_string(),
            updated_by: actor.to_string(),
        }
    }
}

/// User record as held by any repository backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String, // supplied by the caller; uniqueness is the caller's job
    pub name: String,
    pub email: String,
    pub metadata: Metadata,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            metadata,
        }
    }
}
