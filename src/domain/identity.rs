//! The `(owner_id, task_id)` compound key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Addresses exactly one task record.
///
/// Task ids are only unique within an owner, so every lookup goes through
/// the full identity. The subsystem trusts the identity it is given: making
/// sure `owner_id` belongs to the caller is the REST layer's job.
///
/// # Examples
///
/// ```
/// use orion_tasks::TaskIdentity;
///
/// let id = TaskIdentity::new("test", "18f3c2a9d41e7b-0");
/// assert_eq!(id.owner_id(), "test");
/// assert_eq!(id.to_string(), "test/18f3c2a9d41e7b-0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskIdentity {
    owner_id: String,
    task_id: String,
}

impl TaskIdentity {
    /// Creates an identity from its two components.
    pub fn new(owner_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            task_id: task_id.into(),
        }
    }

    /// The owning namespace (typically a user id).
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// The task id, unique within the owner.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.task_id)
    }
}
