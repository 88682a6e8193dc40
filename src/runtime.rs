//! Where download tasks run.
//!
//! The HTTP download service hands its requests to a [`TaskSpawner`] instead of
//! calling into a runtime directly, so the texture layer itself can be driven
//! from any thread, inside or outside an async context.

use crate::prelude::{Future, Pin};

/// A detached unit of background work
pub type BackgroundTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait TaskSpawner: Send + Sync + 'static {
    /// Run `task` to completion in the background. Must not block.
    fn spawn_task(&self, task: BackgroundTask);

    /// Tasks spawned and not yet finished
    fn active_tasks(&self) -> usize;
}

#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;

#[cfg(feature = "tokio-runtime")]
mod tokio_spawner {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::runtime::Handle;

    /// Spawns onto a tokio runtime through its handle
    #[derive(Clone)]
    pub struct TokioSpawner {
        handle: Handle,
        active: Arc<AtomicUsize>,
    }

    impl TokioSpawner {
        pub fn new(handle: Handle) -> Self {
            Self {
                handle,
                active: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Spawner for the runtime the caller is running in, if any
        pub fn current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }
    }

    /// Decrements the active count when the task ends, also on panic or abort
    struct ActiveGuard(Arc<AtomicUsize>);

    impl Drop for ActiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl TaskSpawner for TokioSpawner {
        fn spawn_task(&self, task: BackgroundTask) {
            self.active.fetch_add(1, Ordering::SeqCst);
            let guard = ActiveGuard(self.active.clone());
            self.handle.spawn(async move {
                let _guard = guard;
                task.await;
            });
        }

        fn active_tasks(&self) -> usize {
            self.active.load(Ordering::SeqCst)
        }
    }
}
