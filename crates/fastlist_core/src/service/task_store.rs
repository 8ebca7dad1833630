//! Ordered task store service.
//!
//! # Responsibility
//! - Own the in-memory working set and keep it identical to the backend.
//! - Provide create, toggle, move and delete as single backend transactions.
//! - Derive the done/total summary from the working set.
//!
//! # Invariants
//! - After every successful load or mutation, `order` values are exactly
//!   `0..len` and match each task's index in the working set.
//! - Order is always recomputed from final positions, never patched per row.
//! - The working set is replaced only after the backend write succeeds; a
//!   failed call leaves it untouched.
//! - `load_ordered`, `summary` and the accessors never write.
//! - Orders compacted by a load are persisted by the next successful
//!   mutation, whichever kind it is.

use crate::model::task::{Task, TaskId, TaskSummary, TaskValidationError};
use crate::repo::task_repo::{RepoError, TaskRepository};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by task store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Title is blank or malformed.
    InvalidInput(TaskValidationError),
    /// Referenced id is not in the working set.
    NotFound(TaskId),
    /// Move position is outside `0..len`.
    OutOfRange { position: usize, len: usize },
    /// Backend read/write/commit failure.
    Persistence(RepoError),
}

impl StoreError {
    /// Returns `true` when the caller should ask the user for corrected input.
    ///
    /// Every other kind points at the environment and gets a generic notice.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Stable metadata code used in log events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::OutOfRange { .. } => "out_of_range",
            Self::Persistence(_) => "persistence_failed",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "invalid input: {err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::OutOfRange { position, len } => {
                write!(f, "position {position} is out of range for {len} tasks")
            }
            Self::Persistence(err) => write!(f, "persistence failed: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::NotFound(_) | Self::OutOfRange { .. } => None,
        }
    }
}

impl From<TaskValidationError> for StoreError {
    fn from(value: TaskValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidInput(err),
            other => Self::Persistence(other),
        }
    }
}

/// Persistent ordered task store.
///
/// Sole writer to its repository. Mutating calls take `&mut self`, so one
/// store instance never sees interleaved mutations.
pub struct TaskStore<R: TaskRepository> {
    repo: R,
    tasks: Vec<Task>,
    // Set when the last load compacted orders the backend still holds gapped.
    order_dirty: bool,
}

impl<R: TaskRepository> TaskStore<R> {
    /// Wraps an injected repository and loads the stored set.
    ///
    /// Loading up front keeps every later order rewrite covering the full
    /// stored set.
    pub fn open(repo: R) -> StoreResult<Self> {
        let mut store = Self {
            repo,
            tasks: Vec::new(),
            order_dirty: false,
        };
        store.load_ordered()?;
        Ok(store)
    }

    /// Reloads all records sorted by order and replaces the working set.
    ///
    /// Stored orders are compacted to `0..len` in memory; the next successful
    /// mutation persists the compacted values. On failure the previous
    /// working set is kept.
    pub fn load_ordered(&mut self) -> StoreResult<&[Task]> {
        let started_at = Instant::now();
        let result = self.repo.list_ordered().map_err(StoreError::from);
        let result = observe("task_load", started_at, result);
        let mut loaded = result?;
        let repaired = assign_dense_order(&mut loaded);
        if repaired > 0 {
            warn!(
                "event=task_load module=store status=repaired reassigned={}",
                repaired
            );
        }
        self.tasks = loaded;
        self.order_dirty = repaired > 0;
        debug!("event=task_load module=store count={}", self.tasks.len());
        Ok(&self.tasks)
    }

    /// Creates a task at the front of the list.
    ///
    /// # Errors
    /// - `InvalidInput` for blank titles; nothing is written.
    /// - `Persistence` when the insert fails; the working set is unchanged.
    pub fn create(&mut self, title: impl Into<String>) -> StoreResult<Task> {
        let started_at = Instant::now();
        let result = self.create_inner(title.into());
        observe("task_create", started_at, result)
    }

    fn create_inner(&mut self, title: String) -> StoreResult<Task> {
        let created = Task::new(title)?;

        let mut next = Vec::with_capacity(self.tasks.len() + 1);
        next.push(created.clone());
        next.extend(self.tasks.iter().cloned());
        assign_dense_order(&mut next);

        self.repo.insert_task(&created, &ordered_ids(&next))?;
        self.tasks = next;
        self.order_dirty = false;
        Ok(created)
    }

    /// Flips `done` for one task and returns the updated record.
    ///
    /// Never changes `order` or `title`.
    pub fn toggle_done(&mut self, id: TaskId) -> StoreResult<Task> {
        let started_at = Instant::now();
        let result = self.toggle_done_inner(id);
        observe("task_toggle", started_at, result)
    }

    fn toggle_done_inner(&mut self, id: TaskId) -> StoreResult<Task> {
        let index = self.index_of(id)?;
        let mut updated = self.tasks[index].clone();
        updated.done = !updated.done;

        if self.order_dirty {
            self.repo.update_done_with_order(id, updated.done, &ordered_ids(&self.tasks))?;
            self.order_dirty = false;
        } else {
            self.repo.update_done(id, updated.done)?;
        }
        self.tasks[index] = updated.clone();
        Ok(updated)
    }

    /// Moves the task at `from` to `to`, shifting the tasks in between.
    ///
    /// This is a single-element reposition, not a swap. Returns the new
    /// ordered sequence.
    pub fn move_task(&mut self, from: usize, to: usize) -> StoreResult<&[Task]> {
        let started_at = Instant::now();
        let result = self.move_inner(from, to);
        observe("task_move", started_at, result)?;
        Ok(&self.tasks)
    }

    fn move_inner(&mut self, from: usize, to: usize) -> StoreResult<()> {
        let len = self.tasks.len();
        for position in [from, to] {
            if position >= len {
                return Err(StoreError::OutOfRange { position, len });
            }
        }
        if from == to {
            if self.order_dirty {
                self.repo.write_order(&ordered_ids(&self.tasks))?;
                self.order_dirty = false;
            }
            return Ok(());
        }

        let mut next = self.tasks.clone();
        let moved = next.remove(from);
        next.insert(to, moved);
        assign_dense_order(&mut next);

        self.repo.write_order(&ordered_ids(&next))?;
        self.tasks = next;
        self.order_dirty = false;
        Ok(())
    }

    /// Deletes one task and closes the gap in `order`.
    pub fn delete(&mut self, id: TaskId) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.delete_inner(id);
        observe("task_delete", started_at, result)
    }

    fn delete_inner(&mut self, id: TaskId) -> StoreResult<()> {
        let index = self.index_of(id)?;

        let mut next = self.tasks.clone();
        next.remove(index);
        assign_dense_order(&mut next);

        self.repo.delete_task(id, &ordered_ids(&next))?;
        self.tasks = next;
        self.order_dirty = false;
        Ok(())
    }

    /// Done/total counts over the current working set.
    pub fn summary(&self) -> TaskSummary {
        TaskSummary::from_tasks(&self.tasks)
    }

    /// Current working set in display order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up one task in the working set.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn index_of(&self, id: TaskId) -> StoreResult<usize> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(StoreError::NotFound(id))
    }
}

/// Sets `order = index` for every task; returns how many values changed.
fn assign_dense_order(tasks: &mut [Task]) -> usize {
    let mut changed = 0;
    for (index, task) in tasks.iter_mut().enumerate() {
        let order = index as u32;
        if task.order != order {
            task.order = order;
            changed += 1;
        }
    }
    changed
}

fn ordered_ids(tasks: &[Task]) -> Vec<TaskId> {
    tasks.iter().map(|task| task.id).collect()
}

fn observe<T>(
    event: &'static str,
    started_at: Instant,
    result: StoreResult<T>,
) -> StoreResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => info!("event={event} module=store status=ok duration_ms={duration_ms}"),
        Err(err) if err.is_user_error() => warn!(
            "event={event} module=store status=rejected duration_ms={duration_ms} error_code={}",
            err.error_code()
        ),
        Err(err) => error!(
            "event={event} module=store status=error duration_ms={duration_ms} error_code={} error={err}",
            err.error_code()
        ),
    }
    result
}
