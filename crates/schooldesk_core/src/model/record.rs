//! Record domain model.
//!
//! # Responsibility
//! - Define the JSON object shape stored in collections.
//! - Provide patch-merge and validation helpers.
//!
//! # Invariants
//! - `id` is non-blank and immutable once stored.
//! - `fields` never contains an `id` key; identity lives in `Record::id`.
//! - Serialized form is a flat JSON object `{ "id": ..., ...fields }`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static COLLECTION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("valid collection name regex"));

const ID_FIELD: &str = "id";

/// Record identifier. Callers generate ids; the store only checks uniqueness.
pub type RecordId = String;

/// Shallow field patch merged into an existing record.
pub type RecordPatch = Map<String, Value>;

/// Validation errors for record payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    BlankId,
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "record id must not be blank"),
        }
    }
}

impl Error for RecordValidationError {}

/// One domain entity (student, notice, event, ...) held by a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record with a caller-provided id.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Creates an empty record with a random UUID v4 id.
    pub fn with_generated_id() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Builder-style field setter. An `id` key is ignored.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets one field. An `id` key is ignored.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if key == ID_FIELD {
            return;
        }
        self.fields.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// Shallow-merges `patch` into this record. The `id` key is skipped.
    pub fn apply_patch(&mut self, patch: &RecordPatch) {
        for (key, value) in patch {
            if key == ID_FIELD {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.trim().is_empty() {
            return Err(RecordValidationError::BlankId);
        }
        Ok(())
    }
}

/// Builds a patch from `(field, value)` pairs.
pub fn patch<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> RecordPatch
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Returns whether `name` is usable as a collection name.
///
/// Names are lowercase ASCII identifiers so persisted keys stay unambiguous.
pub fn is_valid_collection_name(name: &str) -> bool {
    COLLECTION_NAME_RE.is_match(name)
}
