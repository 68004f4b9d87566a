//! Holder for the most recently deleted task.
//!
//! The slot keeps one record. It is replaced by a newer delete, emptied by a
//! successful undo or by leaving the task views, and goes stale once the
//! timeout passes. Undo re-creates the task, so the restored record always
//! gets a fresh id.

use std::time::{Duration, Instant};

use todo_shared::{CreateTaskRequest, Task};

pub const DEFAULT_UNDO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct DeletedTask {
    pub title: String,
    pub completed: bool,
}

impl DeletedTask {
    pub fn recreate_request(&self) -> CreateTaskRequest {
        CreateTaskRequest {
            title: self.title.clone(),
            completed: Some(self.completed),
        }
    }
}

impl From<&Task> for DeletedTask {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            completed: task.completed,
        }
    }
}

#[derive(Debug)]
pub struct UndoSlot {
    timeout: Duration,
    entry: Option<(DeletedTask, Instant)>,
}

impl UndoSlot {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entry: None,
        }
    }

    /// Copies the task's displayable fields, replacing any older entry.
    pub fn remember(&mut self, task: &Task, now: Instant) {
        self.entry = Some((DeletedTask::from(task), now));
    }

    /// The held entry, if it has not gone stale. A stale entry is dropped.
    pub fn peek(&mut self, now: Instant) -> Option<&DeletedTask> {
        self.expire(now);
        self.entry.as_ref().map(|(task, _)| task)
    }

    /// Drops a stale entry. Returns whether anything was dropped.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.entry {
            Some((_, at)) if now.saturating_duration_since(*at) >= self.timeout => {
                self.entry = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

impl Default for UndoSlot {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_TIMEOUT)
    }
}
