//! Database connectivity and the SQL Server feedback store.

mod connection;
mod store;

pub use connection::{create_pool, pool_status, ConnectionPool, PoolStatus, PooledConn};
pub use store::MssqlFeedbackStore;
