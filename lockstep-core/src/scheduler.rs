use std::{future::Future, sync::Arc, time::Duration};

use dashmap::{mapref::entry::Entry, DashMap};
use log::debug;
use tokio::{task::AbortHandle, time::sleep};

use crate::Id;

pub type ScheduledTaskId = Id<ScheduledTask>;

/// A named, delayed unit of work that can be cancelled before it fires.
pub struct ScheduledTask {
    id: ScheduledTaskId,
    abort: AbortHandle,
}

/// Runs named tasks after a delay. Scheduling a name that is already pending replaces it.
#[derive(Clone, Default)]
pub struct Scheduler {
    tasks: Arc<DashMap<String, ScheduledTask>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a task to run after `delay`. Must be called within a tokio runtime.
    pub fn schedule<F>(&self, name: impl Into<String>, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let id = ScheduledTaskId::new();
        let tasks = self.tasks.clone();
        let task_name = name.clone();

        // Holding the entry keeps the task from removing itself before it is registered.
        let entry = self.tasks.entry(name.clone());

        let handle = tokio::spawn(async move {
            sleep(delay).await;

            // Forget about the task before running it, so it can't cancel itself midway.
            tasks.remove_if(&task_name, |_, t| t.id == id);
            task.await
        });

        let task = ScheduledTask {
            id,
            abort: handle.abort_handle(),
        };

        let previous = match entry {
            Entry::Occupied(mut occupied) => Some(occupied.insert(task)),
            Entry::Vacant(vacant) => {
                vacant.insert(task);
                None
            }
        };

        debug!("Scheduled {} in {:?}", name, delay);

        if let Some(previous) = previous {
            previous.abort.abort();
        }
    }

    /// Cancels a pending task. Returns true if there was one.
    pub fn unschedule(&self, name: &str) -> bool {
        match self.tasks.remove(name) {
            Some((_, task)) => {
                task.abort.abort();
                debug!("Unscheduled {}", name);
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }
}
