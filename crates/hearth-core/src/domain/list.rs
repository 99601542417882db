//! List registry entries
//!
//! A list entity owns exactly one item collection. Its metadata lives in a
//! household-scoped index that is fetched and subscribed separately from the
//! items themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ListId;

/// Which record shape a list holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListDomain {
    /// Shopping lists of [`ShoppingItem`](super::ShoppingItem)s
    Shopping,
    /// Task lists of [`Task`](super::Task)s
    Tasks,
    /// Voucher and reservation lists of [`Voucher`](super::Voucher)s
    Vouchers,
}

impl ListDomain {
    pub const ALL: [ListDomain; 3] = [ListDomain::Shopping, ListDomain::Tasks, ListDomain::Vouchers];

    /// Stable lowercase name, used in logs and storage
    pub fn name(&self) -> &'static str {
        match self {
            ListDomain::Shopping => "shopping",
            ListDomain::Tasks => "tasks",
            ListDomain::Vouchers => "vouchers",
        }
    }
}

impl fmt::Display for ListDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ListDomain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shopping" => Ok(ListDomain::Shopping),
            "tasks" | "task" => Ok(ListDomain::Tasks),
            "vouchers" | "voucher" => Ok(ListDomain::Vouchers),
            other => Err(DomainError::UnknownDomain(other.to_string())),
        }
    }
}

/// Metadata describing a list, independent of its item contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    pub id: ListId,
    pub name: String,
    pub domain: ListDomain,
}

impl ListMeta {
    /// Create metadata for a brand-new list with a client-generated id
    ///
    /// # Errors
    /// Returns error if the name is blank
    pub fn create(name: impl Into<String>, domain: ListDomain) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidListName(
                "List name cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id: ListId::generate(),
            name,
            domain,
        })
    }
}
