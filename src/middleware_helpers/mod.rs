pub mod actor;
pub mod request_id;
pub mod retry;

pub use actor::{Actor, ACTOR_HEADER};
pub use request_id::request_id_middleware;
pub use retry::{retry_stock_conflicts, with_retry, RetryConfig, StockConflictPolicy};
