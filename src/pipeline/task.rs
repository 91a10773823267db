use std::fmt;

use crate::Fields;

type Job = Box<dyn FnOnce() -> anyhow::Result<Fields> + Send + 'static>;

/// One unit of work: an opaque id and the capability that turns it into [`Fields`].
///
/// Owned by whichever queue currently holds it; a worker takes it by value on pop.
pub struct Task {
    pub(crate) id: String,
    pub(crate) job: Job,
}

impl Task {
    /// Build a task. `job` runs on a worker thread, concurrently with other tasks.
    pub fn new<F>(id: impl Into<String>, job: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Fields> + Send + 'static,
    {
        Self {
            id: id.into(),
            job: Box::new(job),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}
