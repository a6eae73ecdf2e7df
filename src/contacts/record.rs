//! Contact Records and Input Validation

use crate::error::{ContactError, ContactResult};
use crate::store::{Row, StoreError, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned contact identity. Opaque to the service: a UUID on
/// Postgres, an integer on SQLite, always rendered as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: ContactId,
    pub external_id: i32,
    pub phone_number: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl ContactRecord {
    /// Decodes a row selected with [`crate::query::CONTACT_COLUMNS`].
    pub fn from_row(row: &Row) -> Result<Self, StoreError> {
        if row.len() != 5 {
            return Err(StoreError::Decode(format!(
                "expected 5 columns, got {}",
                row.len()
            )));
        }

        let id = match column(row, 0, "id")? {
            Value::Uuid(u) => u.to_string(),
            Value::Text(s) if !s.is_empty() => s.clone(),
            Value::Int64(n) => n.to_string(),
            Value::Int32(n) => n.to_string(),
            other => return Err(unexpected("id", other)),
        };

        let external_id = match column(row, 1, "external_id")? {
            Value::Int32(v) => *v,
            Value::Int64(v) => i32::try_from(*v).map_err(|_| {
                StoreError::Decode(format!("external_id: {} out of range", v))
            })?,
            other => return Err(unexpected("external_id", other)),
        };

        let phone_number = match column(row, 2, "phone_number")? {
            Value::Text(s) => s.clone(),
            other => return Err(unexpected("phone_number", other)),
        };

        Ok(Self {
            id: ContactId(id),
            external_id,
            phone_number,
            date_created: timestamp(column(row, 3, "date_created")?, "date_created")?,
            date_updated: timestamp(column(row, 4, "date_updated")?, "date_updated")?,
        })
    }
}

fn column<'a>(row: &'a Row, index: usize, name: &str) -> Result<&'a Value, StoreError> {
    row.get(index)
        .ok_or_else(|| StoreError::Decode(format!("{}: missing column", name)))
}

fn unexpected(name: &str, value: &Value) -> StoreError {
    StoreError::Decode(format!("{}: unexpected {} value", name, value.kind()))
}

fn timestamp(value: &Value, name: &str) -> Result<DateTime<Utc>, StoreError> {
    match value {
        Value::Timestamp(t) => Ok(*t),
        Value::Text(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|err| StoreError::Decode(format!("{}: {}", name, err))),
        other => Err(unexpected(name, other)),
    }
}

/// A validated contact ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub external_id: i32,
    pub phone_number: String,
}

impl NewContact {
    /// Checks that `external_id` fits the store's integer column and that
    /// `phone_number` is not blank.
    pub fn validate(external_id: i64, phone_number: &str) -> ContactResult<Self> {
        let external_id = i32::try_from(external_id)
            .map_err(|_| ContactError::validation("external_id is out of range"))?;
        if phone_number.trim().is_empty() {
            return Err(ContactError::validation("phone_number must not be empty"));
        }
        Ok(Self {
            external_id,
            phone_number: phone_number.to_string(),
        })
    }
}

/// JSON body of `POST /contacts`.
#[derive(Debug, Deserialize)]
pub struct CreateContactBody {
    pub external_id: Option<i64>,
    pub phone_number: Option<String>,
}

impl CreateContactBody {
    /// Parses the request body. Malformed JSON, wrong field types and missing
    /// fields are all validation failures.
    pub fn from_json(body: &[u8]) -> ContactResult<(i64, String)> {
        let parsed: CreateContactBody = serde_json::from_slice(body)
            .map_err(|err| ContactError::validation(format!("invalid JSON body: {}", err)))?;
        let external_id = parsed
            .external_id
            .ok_or_else(|| ContactError::validation("external_id is required"))?;
        let phone_number = parsed
            .phone_number
            .ok_or_else(|| ContactError::validation("phone_number is required"))?;
        Ok((external_id, phone_number))
    }
}
