//! Concurrency management for Codescape.
//! Sizes the rayon pool used by the load-time structure passes.

use anyhow::Result;
use tracing::info;

/// Number of workers for a configured value; 0 means half the cores.
pub fn worker_count(configured: usize) -> usize {
    if configured > 0 {
        configured
    } else {
        std::cmp::max(1, num_cpus::get() / 2)
    }
}

/// Initialize the global rayon thread pool.
pub fn init_thread_pool(configured: usize) -> Result<()> {
    let workers = worker_count(configured);

    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()?;

    info!(workers, cores = num_cpus::get(), "initialized thread pool");

    Ok(())
}
