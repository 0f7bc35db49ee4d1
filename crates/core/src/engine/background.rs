//! Detached task tracking.
//!
//! Stores after a fetch and stale-while-revalidate refreshes run detached
//! from the request that scheduled them. Their outcome is only ever logged;
//! [`Background::settle`] lets an adapter drain them before shutdown.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::{JoinError, JoinSet};

#[derive(Clone, Default)]
pub struct Background {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `task` on the runtime without awaiting it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn detach<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();
        while let Some(finished) = tasks.try_join_next() {
            log_join(finished);
        }
        tasks.spawn(task);
    }

    /// Number of tasks not yet reaped.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.tasks().len()
    }

    /// Wait for every detached task, including tasks they detach in turn.
    pub async fn settle(&self) {
        loop {
            let mut drained = std::mem::take(&mut *self.tasks());
            if drained.is_empty() {
                return;
            }
            while let Some(finished) = drained.join_next().await {
                log_join(finished);
            }
        }
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "detached task did not complete");
    }
}
