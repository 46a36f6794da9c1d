//! Order-preserving map over independent tasks.
//!
//! Group extraction, group decoding and permutation iterations fan out
//! through a [`ParallelMap`]. [`SerialMap`] runs on the calling thread;
//! `PoolMap` (feature `parallel`) runs on a dedicated rayon pool with a
//! larger per-thread stack.

#[cfg(feature = "parallel")]
use std::sync::OnceLock;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use rayon::ThreadPool;
use tracing::debug;

use crate::error::{Error, Result};

/// Apply a fallible function to every item.
///
/// Results come back in item order regardless of completion order. If any
/// task fails, all partial results are dropped and a single
/// [`Error::Executor`] reports how many failed and the first failure.
pub trait ParallelMap: Sync {
    /// Run `f` on every item and block until all tasks have finished.
    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync + Send;
}

/// Runs tasks one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialMap;

impl ParallelMap for SerialMap {
    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync + Send,
    {
        collect_results(items.into_iter().map(f).collect())
    }
}

/// Stack size of pool worker threads (rayon's default is 2 MB).
#[cfg(feature = "parallel")]
pub const POOL_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Runs tasks on a dedicated rayon thread pool.
#[cfg(feature = "parallel")]
#[derive(Debug)]
pub struct PoolMap {
    pool: ThreadPool,
}

#[cfg(feature = "parallel")]
static SHARED_POOL: OnceLock<PoolMap> = OnceLock::new();

#[cfg(feature = "parallel")]
impl PoolMap {
    /// A pool with one worker per logical CPU.
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// A pool with exactly `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidParameter {
                parameter: "threads",
                reason: "pool needs at least one thread".into(),
            });
        }
        Self::build(Some(threads))
    }

    /// The process-wide pool, built on first use.
    pub fn shared() -> Result<&'static PoolMap> {
        if let Some(pool) = SHARED_POOL.get() {
            return Ok(pool);
        }
        let pool = Self::new()?;
        Ok(SHARED_POOL.get_or_init(|| pool))
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn build(threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().stack_size(POOL_STACK_SIZE);
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().map_err(|e| Error::InvalidParameter {
            parameter: "threads",
            reason: e.to_string(),
        })?;
        Ok(Self { pool })
    }
}

#[cfg(feature = "parallel")]
impl ParallelMap for PoolMap {
    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync + Send,
    {
        let results = self
            .pool
            .install(|| items.into_par_iter().map(&f).collect::<Vec<_>>());
        collect_results(results)
    }
}

fn collect_results<R>(results: Vec<Result<R>>) -> Result<Vec<R>> {
    let total = results.len();
    let mut values = Vec::with_capacity(total);
    let mut first = None;
    let mut failed = 0;

    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(e) => {
                failed += 1;
                if first.is_none() {
                    first = Some(e);
                }
            }
        }
    }

    match first {
        None => Ok(values),
        Some(first) => {
            debug!(failed, total, "parallel map had failing tasks");
            Err(Error::Executor {
                failed,
                total,
                first: Box::new(first),
            })
        }
    }
}
