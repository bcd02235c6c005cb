pub mod batches;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use batches::{ErrorResponse, BATCH_REPORT_HEADER};
pub use routes::create_router;
