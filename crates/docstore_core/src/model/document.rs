//! Document entity, creation request and validation.
//!
//! # Responsibility
//! - Define the time-series document shared by every core component.
//! - Turn untrusted creation input into a validated `DocumentDraft`.
//!
//! # Invariants
//! - `timestamp` is whole Unix seconds and never negative.
//! - `attributes` is non-empty and every attribute points back at `id`.
//! - Attribute ids are unique within a document.
//! - Validation happens before a document reaches the write pipeline or cache.

use crate::model::attribute::{
    normalize_pair, Attribute, AttributeId, AttributeValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Primary identity of a document.
pub type DocumentId = Uuid;

/// Time-series document: identity, timestamp and ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Unix epoch seconds.
    pub timestamp: i64,
    pub attributes: Vec<Attribute>,
}

/// Validation failure for creation requests, documents and search input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentValidationError {
    EmptyAttributes,
    /// Nil UUIDs are never valid identities.
    InvalidId,
    InvalidTimestamp(String),
    Attribute {
        index: usize,
        source: AttributeValidationError,
    },
    /// An attribute names a different owning document than the request.
    AttributeOwnerMismatch {
        index: usize,
        document_id: Uuid,
    },
    /// Two attributes of one document share an id.
    DuplicateAttributeId {
        index: usize,
        id: AttributeId,
    },
    InvalidRange {
        start: i64,
        end: i64,
    },
}

impl Display for DocumentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyAttributes => write!(f, "document attributes list empty"),
            Self::InvalidId => write!(f, "invalid id"),
            Self::InvalidTimestamp(raw) => write!(f, "invalid timestamp `{raw}`"),
            Self::Attribute { index, source } => write!(f, "attribute {index}: {source}"),
            Self::AttributeOwnerMismatch { index, document_id } => write!(
                f,
                "attribute {index} belongs to document {document_id}, not this document"
            ),
            Self::DuplicateAttributeId { index, id } => {
                write!(f, "attribute {index} reuses attribute id {id}")
            }
            Self::InvalidRange { start, end } => {
                write!(f, "timestamp range start {start} is after end {end}")
            }
        }
    }
}

impl Error for DocumentValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Attribute { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Parses a base-10 Unix-seconds timestamp; negative values are rejected.
pub fn parse_timestamp(raw: &str) -> Result<i64, DocumentValidationError> {
    match raw.trim().parse::<i64>() {
        Ok(value) if value >= 0 => Ok(value),
        _ => Err(DocumentValidationError::InvalidTimestamp(raw.to_string())),
    }
}

impl Document {
    /// Checks the entity invariants on an already-built document.
    ///
    /// Used on both write and read paths of the repository.
    pub fn validate(&self) -> Result<(), DocumentValidationError> {
        if self.id.is_nil() {
            return Err(DocumentValidationError::InvalidId);
        }
        if self.timestamp < 0 {
            return Err(DocumentValidationError::InvalidTimestamp(
                self.timestamp.to_string(),
            ));
        }
        if self.attributes.is_empty() {
            return Err(DocumentValidationError::EmptyAttributes);
        }
        let mut seen = HashSet::with_capacity(self.attributes.len());
        for (index, attribute) in self.attributes.iter().enumerate() {
            if !seen.insert(attribute.id) {
                return Err(DocumentValidationError::DuplicateAttributeId {
                    index,
                    id: attribute.id,
                });
            }
            if attribute.document_id != self.id {
                return Err(DocumentValidationError::AttributeOwnerMismatch {
                    index,
                    document_id: attribute.document_id,
                });
            }
            normalize_pair(&attribute.key, &attribute.value)
                .map_err(|source| DocumentValidationError::Attribute { index, source })?;
        }
        Ok(())
    }
}

/// Untrusted attribute input as received by the request layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInput {
    #[serde(default)]
    pub id: Option<AttributeId>,
    #[serde(default)]
    pub document_id: Option<Uuid>,
    pub key: String,
    pub value: String,
}

impl AttributeInput {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

/// Untrusted document creation input.
///
/// `timestamp` stays textual so malformed values surface as validation
/// errors instead of decode failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub id: Option<DocumentId>,
    pub timestamp: String,
    pub attributes: Vec<AttributeInput>,
}

impl CreateDocumentRequest {
    /// Validates and normalizes the request into a draft.
    ///
    /// # Errors
    /// - `EmptyAttributes` when no attribute is supplied.
    /// - `InvalidId` when `id` is the nil UUID.
    /// - `InvalidTimestamp` when the timestamp is not a non-negative integer.
    /// - `Attribute` when a trimmed key/value is outside the length bounds.
    /// - `AttributeOwnerMismatch` when an attribute names another document.
    /// - `DuplicateAttributeId` when two attributes carry the same id.
    pub fn validate(&self) -> Result<DocumentDraft, DocumentValidationError> {
        if self.attributes.is_empty() {
            return Err(DocumentValidationError::EmptyAttributes);
        }
        if self.id.is_some_and(|id| id.is_nil()) {
            return Err(DocumentValidationError::InvalidId);
        }
        let timestamp = parse_timestamp(&self.timestamp)?;

        let mut attributes = Vec::with_capacity(self.attributes.len());
        let mut seen = HashSet::with_capacity(self.attributes.len());
        for (index, input) in self.attributes.iter().enumerate() {
            let (key, value) = normalize_pair(&input.key, &input.value)
                .map_err(|source| DocumentValidationError::Attribute { index, source })?;
            if let Some(owner) = input.document_id.filter(|owner| !owner.is_nil()) {
                if Some(owner) != self.id {
                    return Err(DocumentValidationError::AttributeOwnerMismatch {
                        index,
                        document_id: owner,
                    });
                }
            }
            let requested = input.id.filter(|id| !id.is_nil());
            if let Some(id) = requested {
                if !seen.insert(id) {
                    return Err(DocumentValidationError::DuplicateAttributeId { index, id });
                }
            }
            attributes.push(AttributeDraft {
                requested_id: requested,
                key,
                value,
            });
        }

        Ok(DocumentDraft {
            requested_id: self.id,
            timestamp,
            attributes,
        })
    }
}

/// Validated attribute waiting for its final owning document ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDraft {
    /// Client-chosen id, honored only while the document keeps its requested id.
    pub requested_id: Option<AttributeId>,
    pub key: String,
    pub value: String,
}

/// Validated creation input whose identity is not settled yet.
///
/// The service may mint a different ID than `requested_id` when the
/// requested one is already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDraft {
    pub requested_id: Option<DocumentId>,
    pub timestamp: i64,
    pub attributes: Vec<AttributeDraft>,
}

impl DocumentDraft {
    /// Materializes the draft under `id`, attaching every attribute to it.
    ///
    /// Client attribute ids are kept only when `id` is the requested document
    /// id; a reassigned document gets fresh attribute ids as well.
    pub fn build(&self, id: DocumentId) -> Document {
        let keep_ids = self.requested_id == Some(id);
        Document {
            id,
            timestamp: self.timestamp,
            attributes: self
                .attributes
                .iter()
                .map(|draft| Attribute {
                    id: draft
                        .requested_id
                        .filter(|_| keep_ids)
                        .unwrap_or_else(Uuid::new_v4),
                    document_id: id,
                    key: draft.key.clone(),
                    value: draft.value.clone(),
                })
                .collect(),
        }
    }
}
