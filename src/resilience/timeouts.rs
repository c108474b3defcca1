//! Deadline enforcement for collaborator I/O.
//!
//! Every store call made on behalf of a request runs under a deadline. When
//! it fires, the inner future is dropped, which abandons the pending call.

use std::future::Future;
use std::time::Duration;

use crate::store::StoreError;

/// Run `fut` with a deadline, mapping expiry to `StoreError::Timeout`.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Store call exceeded deadline");
            Err(StoreError::Timeout)
        }
    }
}
