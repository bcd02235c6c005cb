//! Scratch storage for batches and jobs.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/<batch_id>/watermark.<ext>        shared, read-only
//! <root>/<batch_id>/job-<index>/input.<ext>
//! <root>/<batch_id>/job-<index>/output.<ext>
//! ```
//!
//! Every release is idempotent and infallible: failures are logged at
//! `warn` and counted, never returned. Anything not released explicitly is
//! removed on drop.

mod job;
mod manager;
mod release;

pub use job::JobScratch;
pub use manager::{BatchScratch, ScratchManager};
