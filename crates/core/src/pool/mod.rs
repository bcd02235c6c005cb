//! Pool module for bounded concurrent execution.
//!
//! `WorkerPool` runs a fixed number of tokio tasks that drain a shared FIFO
//! queue. Submission never blocks; `join` consumes the pool and waits for
//! every queued and in-flight task.
//!
//! # Example
//!
//! ```ignore
//! use watermarker_core::pool::WorkerPool;
//!
//! let pool = WorkerPool::new("watermark", 4);
//! for job in jobs {
//!     pool.submit(run_job(job))?;
//! }
//! let results = pool.join().await; // completion order
//! ```

mod types;
mod worker;

pub use types::{PoolError, PoolStats, PoolStatus};
pub use worker::WorkerPool;
