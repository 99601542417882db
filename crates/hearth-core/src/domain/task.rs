//! Household tasks

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::list::ListDomain;
use super::newtypes::RecordId;
use super::record::SyncRecord;

/// Progress of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

/// Priority label of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    /// Sort rank: High < Medium < Low < unspecified
    pub fn rank(urgency: Option<Urgency>) -> u8 {
        match urgency {
            Some(Urgency::High) => 0,
            Some(Urgency::Medium) => 1,
            Some(Urgency::Low) => 2,
            None => 3,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        })
    }
}

impl FromStr for Urgency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Urgency::High),
            "medium" => Ok(Urgency::Medium),
            "low" => Ok(Urgency::Low),
            other => Err(DomainError::UnknownUrgency(other.to_string())),
        }
    }
}

/// One task on a task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub urgency: Option<Urgency>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Task {
    /// Create an open task with a client-generated id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RecordId::generate(),
            name: name.into(),
            status: TaskStatus::Todo,
            urgency: None,
            due_date: None,
            assignee: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    #[must_use]
    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Copy of this task with completion flipped (Done <-> Todo)
    #[must_use]
    pub fn toggled(&self) -> Self {
        let status = if self.is_done() {
            TaskStatus::Todo
        } else {
            TaskStatus::Done
        };
        Self {
            status,
            ..self.clone()
        }
    }
}

impl SyncRecord for Task {
    const DOMAIN: ListDomain = ListDomain::Tasks;

    fn id(&self) -> &RecordId {
        &self.id
    }
}
