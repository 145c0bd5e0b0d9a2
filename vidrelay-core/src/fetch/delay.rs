//! Injectable backoff delay

use std::time::Duration;

use async_trait::async_trait;

/// Waits between two attempts on the same mirror.
#[async_trait]
pub trait Delay: Send + Sync + std::fmt::Debug {
    /// Suspends the current task for `duration`.
    async fn wait(&self, duration: Duration);
}

/// Production delay backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Zero-delay clock for tests and tools that must not sleep.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn wait(&self, _duration: Duration) {}
}
