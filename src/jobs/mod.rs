pub mod daily_reset;
pub mod handlers;
pub mod repo;
pub mod scan_cleanup;

pub use handlers::router;
