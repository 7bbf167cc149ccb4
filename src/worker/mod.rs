//! Worker system: single-job execution with blocking completion.
//!
//! - `job`: `JobHandle` (one action on one thread) and its `Completion`
//!
//! Scheduling many jobs is left to callers composing handles.

pub mod job;

pub use job::{Action, Completion, JobHandle, spawn_job};
