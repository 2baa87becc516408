//! Handles for the periodic tokio tasks

use tokio::task::JoinHandle;

/// A running background task; dropping the handle stops it
pub struct BackgroundTask {
    name: &'static str,
    task: JoinHandle<()>,
}

impl BackgroundTask {
    pub(crate) fn new(name: &'static str, task: JoinHandle<()>) -> Self {
        Self { name, task }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}
