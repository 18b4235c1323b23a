//! # Threading Configuration
//!
//! ## Role
//! Size and build the rayon pool that runs one task per chromosome.

use crate::error::{Result, TyperError};

/// Workers for `n_tasks` independent tasks: never more than requested, than
/// the machine offers, or than there are tasks, and never fewer than one.
pub fn pool_size(requested: usize, n_tasks: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.min(available).min(n_tasks).max(1)
}

/// Create a configured thread pool.
pub fn build_thread_pool(n_threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("pggtyper-worker-{}", i))
        .build()
        .map_err(|e| TyperError::ThreadPool {
            message: format!("failed to create thread pool: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_bounds() {
        assert_eq!(pool_size(0, 5), 1);
        assert_eq!(pool_size(8, 0), 1);
        assert_eq!(pool_size(8, 1), 1);
        assert!(pool_size(64, 64) <= 64);
        assert!(pool_size(2, 10) <= 2);
    }

    #[test]
    fn test_build_thread_pool() {
        let pool = build_thread_pool(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
        let name = pool.install(|| std::thread::current().name().map(str::to_string));
        assert!(name.unwrap().starts_with("pggtyper-worker-"));
    }
}
