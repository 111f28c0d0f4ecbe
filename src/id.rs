//! Collision-free task id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

/// Hands out task ids that are unique under unbounded concurrent use.
///
/// An id is `{salt}-{counter}`:
///
/// - `salt` is fixed per generator: the creation time in milliseconds
///   followed by 16 random bits, both in hex. It keeps ids from a restarted
///   process clear of ids persisted by earlier ones.
/// - `counter` is a single atomic increment. It wraps on overflow.
///
/// Allocation never touches the store, so there is no window between
/// choosing an id and persisting it.
///
/// # Examples
///
/// ```
/// use orion_tasks::TaskIdGenerator;
///
/// let ids = TaskIdGenerator::new();
/// let a = ids.next();
/// let b = ids.next();
/// assert_ne!(a, b);
/// assert!(a.ends_with("-0"));
/// ```
#[derive(Debug)]
pub struct TaskIdGenerator {
    salt: String,
    counter: AtomicU64,
}

impl TaskIdGenerator {
    /// Creates a generator with a fresh salt.
    pub fn new() -> Self {
        let millis = Utc::now().timestamp_millis();
        let random = (Uuid::new_v4().as_u128() & 0xffff) as u16;
        Self::with_salt(format!("{millis:x}{random:04x}"))
    }

    /// Creates a generator with a fixed salt.
    ///
    /// Two generators with the same salt produce the same sequence; only
    /// use this where ids from different generators never share an owner.
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// The salt shared by every id of this generator.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Allocates the next id.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.salt)
    }
}

impl Default for TaskIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
