//! Domain newtypes with validation
//!
//! Identifiers in Hearth are client-generated strings. Records and lists get
//! a fresh UUID when created locally, so a concurrently arriving snapshot can
//! recognize a record that this client created before the write landed.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Suffix appended to a list id to address its master template collection
const MASTER_SUFFIX: &str = ":master";

/// Default reserved id of the derived urgent task view
pub const URGENT_LIST_ID: &str = "urgent";

fn validate_id(kind: &str, id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::InvalidId(format!("{kind} cannot be empty")));
    }

    if !id
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
    {
        return Err(DomainError::InvalidId(format!(
            "{kind} contains invalid characters: {id}"
        )));
    }

    Ok(())
}

// ============================================================================
// RecordId
// ============================================================================

/// Identifier of a record inside a collection
///
/// Assigned once at creation and never reused. The same value is used as the
/// primary key in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Create a RecordId from an existing string
    ///
    /// # Errors
    /// Returns error if the id is empty or contains invalid characters
    pub fn new(id: String) -> Result<Self, DomainError> {
        validate_id("Record ID", &id)?;
        Ok(Self(id))
    }

    /// Generate a fresh client-side id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RecordId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

// ============================================================================
// ListId
// ============================================================================

/// Identifier of a list entity (and of the collection it owns)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListId(String);

impl ListId {
    /// Create a ListId from an existing string
    ///
    /// # Errors
    /// Returns error if the id is empty or contains invalid characters
    pub fn new(id: String) -> Result<Self, DomainError> {
        validate_id("List ID", &id)?;
        Ok(Self(id))
    }

    /// Generate a fresh client-side list id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The default reserved id of the urgent task view
    #[must_use]
    pub fn urgent() -> Self {
        Self(URGENT_LIST_ID.to_string())
    }

    /// Id of the master template collection belonging to `list`
    ///
    /// Master collections hold the reusable template entries of a shopping
    /// list. They are deleted together with their owning list.
    #[must_use]
    pub fn master_of(list: &ListId) -> Self {
        Self(format!("{}{MASTER_SUFFIX}", list.0))
    }

    /// Returns true if this id addresses a master template collection
    pub fn is_master(&self) -> bool {
        self.0.ends_with(MASTER_SUFFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ListId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ListId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ListId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ListId> for String {
    fn from(id: ListId) -> Self {
        id.0
    }
}

// ============================================================================
// HouseholdId
// ============================================================================

/// Owner scope of a set of lists
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HouseholdId(String);

impl HouseholdId {
    /// Create a HouseholdId
    ///
    /// # Errors
    /// Returns error if the id is empty or contains invalid characters
    pub fn new(id: String) -> Result<Self, DomainError> {
        validate_id("Household ID", &id)?;
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for HouseholdId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HouseholdId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for HouseholdId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<HouseholdId> for String {
    fn from(id: HouseholdId) -> Self {
        id.0
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Handle returned by the backing store for a live push subscription
///
/// Handles are process-unique. Passing one to `unsubscribe` is the only way
/// to stop its notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocate the next process-unique handle
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}
