use crate::config::WorkerSection;
use crate::error::{EngineError, Result};
use log::{error, info};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

const DEFAULT_STACK_MB: usize = 4;

/// Dedicated rayon pool for Monte Carlo batches, kept apart from the global pool.
pub struct SimulationPool {
    pool: Arc<ThreadPool>,
    num_threads: usize,
}

impl SimulationPool {
    pub fn new(section: &WorkerSection) -> Result<Self> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::build(thread_count(cores, section), stack_size(section))
    }

    /// Pool with an explicit thread count and default stack.
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::build(num_threads.max(1), DEFAULT_STACK_MB * 1024 * 1024)
    }

    fn build(num_threads: usize, stack_size: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("sim-worker-{}", i))
            .stack_size(stack_size)
            .panic_handler(|err| {
                error!("[Worker] Thread panicked: {:?}", err);
            })
            .build()
            .map_err(|e| EngineError::Worker(format!("failed to build pool: {}", e)))?;

        info!("[Worker] Simulation pool ready with {} threads.", num_threads);

        Ok(Self {
            pool: Arc::new(pool),
            num_threads,
        })
    }

    /// Runs `f` inside the pool; a panic comes back as `EngineError::Worker`.
    pub fn execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        let result = self
            .pool
            .install(|| panic::catch_unwind(AssertUnwindSafe(f)));

        result.map_err(|err| {
            let msg = if let Some(s) = err.downcast_ref::<&str>() {
                format!("task panicked: {}", s)
            } else if let Some(s) = err.downcast_ref::<String>() {
                format!("task panicked: {}", s)
            } else {
                "task panicked with unknown error".to_string()
            };
            EngineError::Worker(msg)
        })
    }

    pub fn thread_count(&self) -> usize {
        self.num_threads
    }
}

fn thread_count(cores: usize, section: &WorkerSection) -> usize {
    let mut num_threads = if cores > section.reserve_cores {
        cores - section.reserve_cores
    } else {
        1
    };
    if section.max_threads > 0 && num_threads > section.max_threads {
        num_threads = section.max_threads;
    }
    num_threads
}

fn stack_size(section: &WorkerSection) -> usize {
    let mb = if section.stack_size_mb == 0 {
        DEFAULT_STACK_MB
    } else {
        section.stack_size_mb
    };
    mb * 1024 * 1024
}
