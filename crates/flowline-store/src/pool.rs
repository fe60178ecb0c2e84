use std::time::Duration;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::{Result, StoreError};

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Build a bounded connection pool. Acquisition waits up to `acquire_timeout_ms`
/// and fails with `PoolExhausted` (mapped to `ResourceExhausted` at the call site)
/// once the pool is saturated.
pub fn build_pool(path: &str, max_size: u32, acquire_timeout_ms: u64) -> Result<Pool> {
    let manager = SqliteConnectionManager::file(path);
    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .connection_timeout(Duration::from_millis(acquire_timeout_ms))
        .build(manager)
        .map_err(StoreError::PoolExhausted)?;
    Ok(pool)
}
