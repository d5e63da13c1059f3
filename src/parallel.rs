//! Parallel processing configuration
//!
//! Profile reductions run on Rayon's global pool; this module configures it.

use crate::errors::{DlWindError, Result};
use rayon::ThreadPoolBuilder;
use tracing::info;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    #[must_use]
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Create a configuration that uses all available CPU cores
    #[must_use]
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    /// Set up the global Rayon thread pool with the specified configuration
    ///
    /// # Errors
    ///
    /// Returns [`DlWindError::ThreadPoolError`] for a zero thread count or if
    /// the global pool was already initialised.
    pub fn setup_global_pool(&self) -> Result<()> {
        let Some(num_threads) = self.num_threads else {
            info!("Using default thread pool ({} threads)", rayon::current_num_threads());
            return Ok(());
        };

        if num_threads == 0 {
            return Err(DlWindError::ThreadPoolError(
                "thread count must be at least 1".to_string(),
            ));
        }

        ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| {
                DlWindError::ThreadPoolError(format!(
                    "Failed to initialize thread pool with {num_threads} threads: {e}"
                ))
            })?;

        info!("Configured parallel processing with {num_threads} threads");
        Ok(())
    }

    /// Get the current number of threads being used
    #[must_use]
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}
