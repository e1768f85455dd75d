use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::image_pipeline::common::error::{ImageError, Result};

pub const DEFAULT_IO_THREADS: usize = 8;

/// Worker count for `units` jobs: `io_threads`, capped at the job count, never zero.
pub fn worker_count(io_threads: usize, units: usize) -> usize {
    io_threads.min(units).max(1)
}

/// Builds a dedicated pool so batch work never depends on rayon's global pool size.
pub fn worker_pool(io_threads: usize, units: usize) -> Result<ThreadPool> {
    let threads = worker_count(io_threads, units);
    debug!(threads, units, "Building worker pool");
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("scicam-worker-{index}"))
        .build()
        .map_err(|e| ImageError::ThreadPoolError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_capped() {
        assert_eq!(worker_count(8, 3), 3);
        assert_eq!(worker_count(2, 100), 2);
        assert_eq!(worker_count(0, 5), 1);
        assert_eq!(worker_count(8, 0), 1);
    }

    #[test]
    fn test_pool_size() {
        let pool = worker_pool(4, 2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}
