//! Attribute entity and key/value validation.
//!
//! # Responsibility
//! - Define the key/value pair owned by exactly one document.
//! - Normalize and validate user-provided keys and values.
//!
//! # Invariants
//! - `key` and `value` are trimmed and `1..=MAX_FIELD_LENGTH` bytes long.
//! - `document_id` points at the owning document; it is a back-reference,
//!   not an ownership pointer.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Upper bound (in bytes) for attribute keys and values.
pub const MAX_FIELD_LENGTH: usize = 256;

/// Stable identifier of one attribute row.
pub type AttributeId = Uuid;

/// Key/value pair attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    /// Owning document. Becomes `NULL` in storage once the document is gone.
    pub document_id: Uuid,
    pub key: String,
    pub value: String,
}

/// Which half of a key/value pair failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeField {
    Key,
    Value,
}

impl Display for AttributeField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::Value => write!(f, "value"),
        }
    }
}

/// Rejected key/value input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValidationError {
    pub field: AttributeField,
    /// Byte length observed after trimming.
    pub length: usize,
}

impl Display for AttributeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid {} length {}; expected 1..={MAX_FIELD_LENGTH}",
            self.field, self.length
        )
    }
}

impl Error for AttributeValidationError {}

/// Trims and validates one key/value pair.
///
/// Returns the trimmed pair on success.
pub fn normalize_pair(key: &str, value: &str) -> Result<(String, String), AttributeValidationError> {
    let key = normalize_field(AttributeField::Key, key)?;
    let value = normalize_field(AttributeField::Value, value)?;
    Ok((key, value))
}

/// Trims one key or value and checks its length bounds.
pub fn normalize_field(
    field: AttributeField,
    raw: &str,
) -> Result<String, AttributeValidationError> {
    let trimmed = raw.trim();
    let length = trimmed.len();
    if length == 0 || length > MAX_FIELD_LENGTH {
        return Err(AttributeValidationError { field, length });
    }
    Ok(trimmed.to_string())
}
