//! Core domain types: identifiers, jobs, schedules and retry policies.

pub mod clock;
pub mod expression;
pub mod job;
pub mod outcome;
pub mod retry;
pub mod schedule;
pub mod types;
