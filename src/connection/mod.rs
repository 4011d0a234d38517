pub mod config;
mod gate;
pub mod pool;

pub use config::{DEFAULT_PORT, PoolConfig};
pub use pool::{ConnectionPool, PoolGuard, PoolStats};
