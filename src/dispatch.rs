use tokio::runtime::Handle;

/// A unit of blocking remote work. Jobs report back through the channel they
/// captured, never by touching engine state directly.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs off the UI thread.
pub trait Spawner: Send + Sync {
    fn spawn(&self, job: Job);
}

/// Runs jobs on the blocking pool of a tokio runtime.
pub struct RuntimeSpawner {
    handle: Handle,
}

impl RuntimeSpawner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Spawner for RuntimeSpawner {
    fn spawn(&self, job: Job) {
        // The JoinHandle is dropped; results travel over the job's channel
        let _ = self.handle.spawn_blocking(job);
    }
}
