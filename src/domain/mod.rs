//! Domain types for task tracking.
//!
//! [`TaskIdentity`] addresses a task, [`TaskRecord`] holds its state, and
//! [`TaskResult`] describes how it ended. The record is also the wire form:
//! stores persist its JSON serialization verbatim.

pub mod identity;
pub mod record;
pub mod result;

pub use identity::*;
pub use record::*;
pub use result::*;
