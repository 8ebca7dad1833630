//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the record-level data access contract the task store writes through.
//! - Isolate SQLite query details from store orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Task::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `StaleOrder`) in
//!   addition to DB transport errors.

pub mod task_repo;
