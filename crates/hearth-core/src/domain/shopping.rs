//! Shopping list entries

use serde::{Deserialize, Serialize};

use super::list::ListDomain;
use super::newtypes::RecordId;
use super::record::SyncRecord;

/// One entry on a shopping list (or on its master template)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub id: RecordId,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// Household member who added the entry; informational only
    #[serde(default)]
    pub added_by: Option<String>,
}

impl ShoppingItem {
    /// Create an open entry with a client-generated id
    pub fn new(text: impl Into<String>, category: Option<String>) -> Self {
        Self {
            id: RecordId::generate(),
            text: text.into(),
            category,
            completed: false,
            added_by: None,
        }
    }

    /// Copy of this entry with the completion flag flipped
    #[must_use]
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }
}

impl SyncRecord for ShoppingItem {
    const DOMAIN: ListDomain = ListDomain::Shopping;

    fn id(&self) -> &RecordId {
        &self.id
    }

    /// Only text, category and completion are user-editable
    fn content_eq(&self, other: &Self) -> bool {
        self.text == other.text && self.category == other.category && self.completed == other.completed
    }
}
