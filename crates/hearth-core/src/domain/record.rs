//! Record descriptor trait and field-level patches
//!
//! Every item domain (shopping, tasks, vouchers) plugs into the sync engine
//! through [`SyncRecord`]. The trait fixes three things the engine needs to
//! know about a record shape: its domain tag, its identity, and the equality
//! used to decide whether an edit must be sent to the backing store.
//!
//! Records travel to and from the backing store as JSON documents
//! ([`RecordDocument`]). Updates are sent as a [`RecordPatch`] holding only
//! the fields whose serialized value differs.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::DomainError;
use super::list::ListDomain;
use super::newtypes::RecordId;

/// Wire-independent document form of a record
pub type RecordDocument = Value;

/// Name of the identity field inside a record document
pub const ID_FIELD: &str = "id";

/// Domain descriptor for a synchronizable record type
pub trait SyncRecord:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The list domain whose collections hold this record type
    const DOMAIN: ListDomain;

    /// Immutable identity of the record
    fn id(&self) -> &RecordId;

    /// Domain equality used by the diff engine
    ///
    /// Two versions of the same record for which this returns true produce
    /// no remote operation. Defaults to full structural equality.
    fn content_eq(&self, other: &Self) -> bool {
        self == other
    }

    /// Encode the record as a backing-store document
    fn to_document(&self) -> Result<RecordDocument, DomainError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a backing-store document
    ///
    /// Only the basic shape is checked: missing optional fields fall back to
    /// their defaults.
    fn from_document(document: RecordDocument) -> Result<Self, DomainError> {
        Ok(serde_json::from_value(document)?)
    }
}

/// Field-level update of a stored record
///
/// Maps field names to their new serialized values. The identity field is
/// never part of a patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordPatch(Map<String, Value>);

impl RecordPatch {
    /// Compute the patch that turns `before` into `after`
    ///
    /// Fields that exist in `before` but not in `after` are patched to
    /// `null`.
    ///
    /// # Errors
    /// Returns error if either record does not serialize to a JSON object
    pub fn between<R: SyncRecord>(before: &R, after: &R) -> Result<Self, DomainError> {
        let before = into_object(before.to_document()?)?;
        let after = into_object(after.to_document()?)?;

        let mut fields = Map::new();
        for (name, value) in &after {
            if name == ID_FIELD {
                continue;
            }
            if before.get(name) != Some(value) {
                fields.insert(name.clone(), value.clone());
            }
        }
        for name in before.keys() {
            if name != ID_FIELD && !after.contains_key(name) {
                fields.insert(name.clone(), Value::Null);
            }
        }

        Ok(Self(fields))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// New value of `field`, if the patch touches it
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Names of the patched fields
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Merge this patch into a stored document in place
    ///
    /// # Errors
    /// Returns error if the document is not a JSON object
    pub fn apply_to(&self, document: &mut RecordDocument) -> Result<(), DomainError> {
        let object = document.as_object_mut().ok_or_else(|| {
            DomainError::RecordEncoding("stored record is not a JSON object".to_string())
        })?;
        for (name, value) in &self.0 {
            if name == ID_FIELD {
                continue;
            }
            object.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Read the id field of a raw document without decoding the whole record
pub fn document_id(document: &RecordDocument) -> Option<RecordId> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| RecordId::new(s.to_string()).ok())
}

fn into_object(value: Value) -> Result<Map<String, Value>, DomainError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::RecordEncoding(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
