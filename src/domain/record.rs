//! Task record: the persisted state of one task.
//!
//! [`TaskRecord`] is both the in-memory domain object and, through serde,
//! the JSON document a [`TaskStore`](crate::store::TaskStore) holds for it.
//! The lifecycle rules live here so that every store and every caller sees
//! the same state machine:
//!
//! ```text
//! Running --complete--> Done   (terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{TaskIdentity, TaskResult};
use crate::error::TaskError;

/// Lifecycle state derived from [`TaskRecord::running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Created and not yet finished. Progress and message may change.
    Running,
    /// Finished. The record carries a result and is immutable.
    Done,
}

/// The full state of a task.
///
/// All fields are public so that the REST layer can render them directly;
/// mutation should go through [`TaskService`](crate::service::TaskService),
/// which serializes updates per identity and persists them.
///
/// # Examples
///
/// ```
/// use orion_tasks::{TaskIdentity, TaskRecord, TaskResult, TaskState};
///
/// let mut record = TaskRecord::new(TaskIdentity::new("test", "t-1"), "Cloning", true);
/// assert_eq!(record.state(), TaskState::Running);
///
/// record.update_progress(40, Some("Receiving objects".to_string())).unwrap();
/// assert_eq!(record.percent_complete, 40);
///
/// record.complete(TaskResult::ok()).unwrap();
/// assert_eq!(record.state(), TaskState::Done);
/// assert_eq!(record.percent_complete, 100);
/// assert!(record.update_progress(50, None).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskRecord {
    /// Namespace for uniqueness and listing.
    pub owner_id: String,

    /// Opaque id, unique within `owner_id`.
    pub task_id: String,

    /// Human-readable label. Never changes after creation.
    pub name: String,

    /// `true` from creation until the task is completed.
    pub running: bool,

    /// Progress in `0..=100`. Never decreases while running; forced to 100
    /// on completion.
    #[serde(deserialize_with = "deserialize_percent")]
    pub percent_complete: u8,

    /// Free-text progress message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Outcome, present once `running` is `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,

    /// Whether the record must survive a process restart.
    #[serde(default)]
    pub durable: bool,

    /// Creation time.
    pub created: DateTime<Utc>,

    /// Time of the last successful mutation.
    pub last_modified: DateTime<Utc>,
}

impl TaskRecord {
    /// Creates a new running record at 0%.
    pub fn new(identity: TaskIdentity, name: impl Into<String>, durable: bool) -> Self {
        let now = Utc::now();
        Self {
            owner_id: identity.owner_id().to_string(),
            task_id: identity.task_id().to_string(),
            name: name.into(),
            running: true,
            percent_complete: 0,
            message: None,
            result: None,
            durable,
            created: now,
            last_modified: now,
        }
    }

    /// Returns the identity addressing this record.
    pub fn identity(&self) -> TaskIdentity {
        TaskIdentity::new(self.owner_id.clone(), self.task_id.clone())
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> TaskState {
        if self.running {
            TaskState::Running
        } else {
            TaskState::Done
        }
    }

    /// Returns `true` once the task has been completed.
    pub fn is_done(&self) -> bool {
        self.state() == TaskState::Done
    }

    fn ensure_running(&self, operation: &'static str) -> Result<(), TaskError> {
        if self.is_done() {
            tracing::warn!(
                owner_id = %self.owner_id,
                task_id = %self.task_id,
                operation,
                "rejected mutation of a finished task"
            );
            return Err(TaskError::InvalidTransition {
                identity: self.identity(),
                operation,
            });
        }
        Ok(())
    }

    /// Records progress.
    ///
    /// `percent` is clamped to `0..=100`; a value below the current progress
    /// leaves the progress where it is. `message`, when given, replaces the
    /// current message.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] if the task is done.
    pub fn update_progress(&mut self, percent: i32, message: Option<String>) -> Result<(), TaskError> {
        self.ensure_running("update_progress")?;
        self.percent_complete = self.percent_complete.max(clamp_percent(i64::from(percent)));
        if message.is_some() {
            self.message = message;
        }
        self.touch();
        Ok(())
    }

    /// Replaces the progress message.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] if the task is done.
    pub fn set_message(&mut self, message: impl Into<String>) -> Result<(), TaskError> {
        self.ensure_running("set_message")?;
        self.message = Some(message.into());
        self.touch();
        Ok(())
    }

    /// Finishes the task with `result`.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] if the task is already done. The
    /// first result is kept.
    pub fn complete(&mut self, result: TaskResult) -> Result<(), TaskError> {
        self.ensure_running("complete")?;
        self.running = false;
        self.percent_complete = 100;
        self.result = Some(result);
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.last_modified = Utc::now().max(self.last_modified);
    }

    /// Serializes the record into its persisted JSON form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a record from its persisted JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Clamps an arbitrary progress value into `0..=100`.
pub fn clamp_percent(percent: i64) -> u8 {
    // The clamp makes the narrowing lossless.
    percent.clamp(0, 100) as u8
}

fn deserialize_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(clamp_percent)
}
