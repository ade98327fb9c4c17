//! Conversion between [`User`] values and the 7-field rows of the backing file.
//!
//! Column order is fixed: `id, name, email, createdAt, updatedAt, createdBy,
//! updatedBy`. Timestamps are written and read as RFC 3339.

use csv::StringRecord;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::warn;

use super::error::{StoreError, StoreResult};
use crate::users::repo_types::{Metadata, User};

/// Literal header written as the first row of a freshly created file.
pub const HEADER: [&str; FIELD_COUNT] = [
    "id",
    "name",
    "email",
    "createdAt",
    "updatedAt",
    "createdBy",
    "updatedBy",
];

pub const FIELD_COUNT: usize = 7;

const COL_ID: usize = 0;
const COL_NAME: usize = 1;
const COL_EMAIL: usize = 2;
const COL_CREATED_AT: usize = 3;
const COL_UPDATED_AT: usize = 4;
const COL_CREATED_BY: usize = 5;
const COL_UPDATED_BY: usize = 6;

/// What to do with a timestamp field that does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampPolicy {
    /// Substitute the zero timestamp (unix epoch) and log a warning.
    #[default]
    Lenient,
    /// Reject the row with [`StoreError::MalformedRecord`].
    Strict,
}

/// 1-based line of a row read from disk, 0 for rows built in memory.
pub fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// Rejects any data row that does not carry exactly [`FIELD_COUNT`] fields.
pub fn check_shape(record: &StringRecord) -> StoreResult<()> {
    if record.len() != FIELD_COUNT {
        return Err(StoreError::MalformedRecord {
            line: line_of(record),
            reason: format!("expected {} fields, found {}", FIELD_COUNT, record.len()),
        });
    }
    Ok(())
}

pub fn matches_id(record: &StringRecord, id: &str) -> bool {
    record.get(COL_ID) == Some(id)
}

pub fn decode(record: &StringRecord, policy: TimestampPolicy) -> StoreResult<User> {
    check_shape(record)?;

    let created_at = parse_timestamp(record, COL_CREATED_AT, "createdAt", policy)?;
    let updated_at = parse_timestamp(record, COL_UPDATED_AT, "updatedAt", policy)?;

    Ok(User::new(
        &record[COL_ID],
        &record[COL_NAME],
        &record[COL_EMAIL],
        Metadata {
            created_at,
            updated_at,
            created_by: record[COL_CREATED_BY].to_string(),
            updated_by: record[COL_UPDATED_BY].to_string(),
        },
    ))
}

/// Builds the row for a newly created user; `actor` fills both audit actor columns.
pub fn encode(user: &User, actor: &str) -> StoreResult<StringRecord> {
    let created_at = format_timestamp(user.metadata.created_at)?;
    let updated_at = format_timestamp(user.metadata.updated_at)?;

    Ok(StringRecord::from(vec![
        user.id.as_str(),
        user.name.as_str(),
        user.email.as_str(),
        created_at.as_str(),
        updated_at.as_str(),
        actor,
        actor,
    ]))
}

/// Copy of `record` with new name/email and a refreshed `updatedAt`/`updatedBy`.
/// Id and the creation columns are carried over untouched.
pub fn stamp_update(
    record: &StringRecord,
    name: &str,
    email: &str,
    now: OffsetDateTime,
    actor: &str,
) -> StoreResult<StringRecord> {
    check_shape(record)?;
    let updated_at = format_timestamp(now)?;

    let mut out = StringRecord::with_capacity(record.as_slice().len(), FIELD_COUNT);
    for (col, field) in record.iter().enumerate() {
        match col {
            COL_NAME => out.push_field(name),
            COL_EMAIL => out.push_field(email),
            COL_UPDATED_AT => out.push_field(&updated_at),
            COL_UPDATED_BY => out.push_field(actor),
            _ => out.push_field(field),
        }
    }
    Ok(out)
}

fn parse_timestamp(
    record: &StringRecord,
    col: usize,
    column: &str,
    policy: TimestampPolicy,
) -> StoreResult<OffsetDateTime> {
    let raw = &record[col];
    match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(ts) => Ok(ts),
        Err(e) => match policy {
            TimestampPolicy::Lenient => {
                warn!(
                    line = line_of(record),
                    column,
                    value = raw,
                    error = %e,
                    "unparsable timestamp, using zero value"
                );
                Ok(OffsetDateTime::UNIX_EPOCH)
            }
            TimestampPolicy::Strict => Err(StoreError::MalformedRecord {
                line: line_of(record),
                reason: format!("{column}: {e}"),
            }),
        },
    }
}

fn format_timestamp(ts: OffsetDateTime) -> StoreResult<String> {
    ts.format(&Rfc3339).map_err(|e| StoreError::MalformedRecord {
        line: 0,
        reason: format!("cannot format timestamp {ts}: {e}"),
    })
}
