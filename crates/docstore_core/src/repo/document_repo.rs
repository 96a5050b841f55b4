//! Document repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist documents with their ordered attributes atomically.
//! - Answer point lookups and timestamp/attribute searches.
//!
//! # Invariants
//! - Write paths call `Document::validate()` before any SQL mutation.
//! - An existing document is never overwritten; a second insert for the same
//!   id fails with `RepoError::DuplicateId`; an attribute id that is already
//!   stored fails with `RepoError::DuplicateAttributeId`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::attribute::{normalize_field, Attribute, AttributeField, AttributeId};
use crate::model::document::{Document, DocumentId, DocumentValidationError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Row cap applied to searches when the caller does not pick one.
pub const DEFAULT_SEARCH_LIMIT: u32 = 500;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for document persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(DocumentValidationError),
    Db(DbError),
    DuplicateId(DocumentId),
    DuplicateAttributeId(AttributeId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "document already exists: {id}"),
            Self::DuplicateAttributeId(id) => write!(f, "attribute already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted document data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::DuplicateId(_) | Self::DuplicateAttributeId(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DocumentValidationError> for RepoError {
    fn from(value: DocumentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Search filter over document timestamps and attributes.
///
/// `key` and `value` must match on the same attribute row. Timestamp bounds
/// are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSearchQuery {
    pub start_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub limit: u32,
}

impl Default for DocumentSearchQuery {
    fn default() -> Self {
        Self {
            start_timestamp: None,
            end_timestamp: None,
            key: None,
            value: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl DocumentSearchQuery {
    /// Exact timestamp + key/value match.
    pub fn exact(timestamp: i64, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            start_timestamp: Some(timestamp),
            end_timestamp: Some(timestamp),
            key: Some(key.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Returns a trimmed copy, or the first rule the filter breaks.
    pub fn normalized(&self) -> Result<Self, DocumentValidationError> {
        for bound in [self.start_timestamp, self.end_timestamp].into_iter().flatten() {
            if bound < 0 {
                return Err(DocumentValidationError::InvalidTimestamp(bound.to_string()));
            }
        }
        if let (Some(start), Some(end)) = (self.start_timestamp, self.end_timestamp) {
            if start > end {
                return Err(DocumentValidationError::InvalidRange { start, end });
            }
        }

        let field = |kind: AttributeField, raw: &Option<String>| {
            raw.as_deref()
                .map(|raw| normalize_field(kind, raw))
                .transpose()
                .map_err(|source| DocumentValidationError::Attribute { index: 0, source })
        };

        Ok(Self {
            key: field(AttributeField::Key, &self.key)?,
            value: field(AttributeField::Value, &self.value)?,
            ..self.clone()
        })
    }
}

/// Repository interface for the durable document store.
pub trait DocumentRepository {
    fn create_document(&self, document: &Document) -> RepoResult<DocumentId>;
    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>>;
    fn search_documents(&self, query: &DocumentSearchQuery) -> RepoResult<Vec<DocumentId>>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn create_document(&self, document: &Document) -> RepoResult<DocumentId> {
        document.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1);",
            [document.id.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(RepoError::DuplicateId(document.id));
        }
        {
            let mut attribute_exists =
                tx.prepare("SELECT EXISTS(SELECT 1 FROM attributes WHERE id = ?1);")?;
            for attribute in &document.attributes {
                let taken: bool =
                    attribute_exists.query_row([attribute.id.to_string()], |row| row.get(0))?;
                if taken {
                    return Err(RepoError::DuplicateAttributeId(attribute.id));
                }
            }
        }

        tx.execute(
            "INSERT INTO documents (id, timestamp) VALUES (?1, ?2);",
            params![document.id.to_string(), document.timestamp],
        )?;
        {
            let mut insert_attribute = tx.prepare(
                "INSERT INTO attributes (id, document_id, key, value, position)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for (position, attribute) in document.attributes.iter().enumerate() {
                insert_attribute.execute(params![
                    attribute.id.to_string(),
                    document.id.to_string(),
                    attribute.key.as_str(),
                    attribute.value.as_str(),
                    position as i64,
                ])?;
            }
        }
        tx.commit()?;

        Ok(document.id)
    }

    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>> {
        let timestamp: Option<i64> = self
            .conn
            .query_row(
                "SELECT timestamp FROM documents WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(timestamp) = timestamp else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT id, document_id, key, value
             FROM attributes
             WHERE document_id = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut attributes = Vec::new();
        while let Some(row) = rows.next()? {
            attributes.push(parse_attribute_row(row)?);
        }

        let document = Document {
            id,
            timestamp,
            attributes,
        };
        document
            .validate()
            .map_err(|err| RepoError::InvalidData(format!("document {id}: {err}")))?;
        Ok(Some(document))
    }

    fn search_documents(&self, query: &DocumentSearchQuery) -> RepoResult<Vec<DocumentId>> {
        let query = query.normalized()?;
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut sql = String::from("SELECT DISTINCT documents.id, documents.timestamp FROM documents");
        let mut bind_values: Vec<Value> = Vec::new();

        if query.key.is_some() || query.value.is_some() {
            sql.push_str(" JOIN attributes ON attributes.document_id = documents.id");
        }
        sql.push_str(" WHERE 1 = 1");

        if let Some(start) = query.start_timestamp {
            sql.push_str(" AND documents.timestamp >= ?");
            bind_values.push(Value::Integer(start));
        }
        if let Some(end) = query.end_timestamp {
            sql.push_str(" AND documents.timestamp <= ?");
            bind_values.push(Value::Integer(end));
        }
        if let Some(key) = query.key {
            sql.push_str(" AND attributes.key = ?");
            bind_values.push(Value::Text(key));
        }
        if let Some(value) = query.value {
            sql.push_str(" AND attributes.value = ?");
            bind_values.push(Value::Text(value));
        }

        sql.push_str(" ORDER BY documents.timestamp ASC, documents.id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(query.limit)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            ids.push(parse_uuid(&text, "documents.id")?);
        }
        Ok(ids)
    }
}

fn parse_attribute_row(row: &Row<'_>) -> RepoResult<Attribute> {
    let id_text: String = row.get("id")?;
    let owner_text: String = row.get("document_id")?;
    Ok(Attribute {
        id: parse_uuid(&id_text, "attributes.id")?,
        document_id: parse_uuid(&owner_text, "attributes.document_id")?,
        key: row.get("key")?,
        value: row.get("value")?,
    })
}

fn parse_uuid(text: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}")))
}
