//! Run blocking database work from async code.
//!
//! The database API is synchronous. Inside a tokio runtime, wrap calls in
//! [`run_blocking`] so they execute on the blocking pool instead of stalling
//! a worker thread.
//!
//! ```rust,no_run
//! use sql_plugins::prelude::*;
//! use sql_plugins::offload::run_blocking;
//!
//! # async fn demo(db: DatabaseHandle) -> Result<(), SqlPluginDbError> {
//! let rows = run_blocking(move || db.execute("select 1", ())?.fetchall()).await?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use crate::error::SqlPluginDbError;

/// Run `func` on tokio's blocking pool and await its result.
///
/// # Errors
///
/// Returns whatever `func` returns, or `BackendError` if the task panicked
/// or was cancelled.
pub async fn run_blocking<F, R>(func: F) -> Result<R, SqlPluginDbError>
where
    F: FnOnce() -> Result<R, SqlPluginDbError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(func)
        .await
        .map_err(|e| SqlPluginDbError::BackendError {
            code: -1,
            message: format!("spawn_blocking join error: {e}"),
        })?
}

/// [`run_blocking`] with an upper bound on how long the caller waits.
///
/// On timeout the blocking task is not interrupted; it runs to completion in
/// the background and its result is discarded.
///
/// # Errors
///
/// Returns `Timeout` if `limit` elapses first, otherwise as [`run_blocking`].
pub async fn run_blocking_with_timeout<F, R>(
    limit: Duration,
    func: F,
) -> Result<R, SqlPluginDbError>
where
    F: FnOnce() -> Result<R, SqlPluginDbError> + Send + 'static,
    R: Send + 'static,
{
    tokio::time::timeout(limit, run_blocking(func))
        .await
        .map_err(|_| SqlPluginDbError::Timeout(limit))?
}
