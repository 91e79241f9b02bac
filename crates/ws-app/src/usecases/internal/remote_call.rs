use std::future::Future;
use std::time::Duration;

use ws_core::ports::GatewayError;

/// Await a gateway call with a deadline; expiry is reported like a network failure.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(timeout)),
    }
}
