//! Dry-run switch for mutating backend calls.
//!
//! The executor is picked once at startup. Mutations are handed over as
//! un-polled futures, so the simulating executor can drop them without any
//! request ever leaving the process.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, info};

#[async_trait]
pub trait Executor: Send + Sync {
    fn is_dry_run(&self) -> bool;

    /// Run (or simulate) `operation`, described by `action` for logging
    async fn execute<'a>(&self, action: &str, operation: BoxFuture<'a, Result<()>>) -> Result<()>;
}

/// Performs every mutation for real
pub struct LiveExecutor;

#[async_trait]
impl Executor for LiveExecutor {
    fn is_dry_run(&self) -> bool {
        false
    }

    async fn execute<'a>(&self, action: &str, operation: BoxFuture<'a, Result<()>>) -> Result<()> {
        debug!(action = action, "Executing action");
        operation.await
    }
}

/// Logs mutations instead of performing them
pub struct SimulatingExecutor;

#[async_trait]
impl Executor for SimulatingExecutor {
    fn is_dry_run(&self) -> bool {
        true
    }

    async fn execute<'a>(&self, action: &str, operation: BoxFuture<'a, Result<()>>) -> Result<()> {
        drop(operation);
        info!(action = action, dry_run = true, "Dry run, skipping action");
        Ok(())
    }
}

pub fn executor_for(dry_run: bool) -> Arc<dyn Executor> {
    if dry_run {
        Arc::new(SimulatingExecutor)
    } else {
        Arc::new(LiveExecutor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_live_executor_runs_operation() {
        let ran = AtomicBool::new(false);
        let executor = executor_for(false);

        executor
            .execute(
                "mark",
                async {
                    ran.store(true, Ordering::SeqCst);
                    Ok(())
                }
                .boxed(),
            )
            .await
            .unwrap();

        assert!(!executor.is_dry_run());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_simulating_executor_never_polls_operation() {
        let ran = AtomicBool::new(false);
        let executor = executor_for(true);

        executor
            .execute(
                "mark",
                async {
                    ran.store(true, Ordering::SeqCst);
                    Ok(())
                }
                .boxed(),
            )
            .await
            .unwrap();

        assert!(executor.is_dry_run());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_live_executor_propagates_errors() {
        let executor = executor_for(false);
        let result = executor
            .execute("fail", async { Err(anyhow::anyhow!("backend down")) }.boxed())
            .await;
        assert!(result.is_err());
    }
}
