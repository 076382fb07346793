use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

const MAX_IN_FLIGHT: usize = 16;

/// Unit of work for the maintenance jobs: per-entity writes are collected
/// without being awaited, then flushed together. The flush bounds in-flight
/// writes but gives no ordering or atomicity across entities.
pub struct WriteBatch<'a> {
    tasks: Vec<BoxFuture<'a, anyhow::Result<()>>>,
}

impl<'a> WriteBatch<'a> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn push<F>(&mut self, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'a,
    {
        self.tasks.push(Box::pin(fut));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub async fn flush(self) -> anyhow::Result<()> {
        stream::iter(self.tasks)
            .buffer_unordered(MAX_IN_FLIGHT)
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }
}

impl Default for WriteBatch<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod batch_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn flush_runs_every_task() {
        let counter = AtomicUsize::new(0);
        let mut batch = WriteBatch::new();
        for _ in 0..40 {
            batch.push(async {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert_eq!(batch.len(), 40);
        batch.flush().await.expect("flush");
        assert_eq!(counter.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn flush_surfaces_a_failure() {
        let mut batch = WriteBatch::new();
        batch.push(async { Ok(()) });
        batch.push(async { anyhow::bail!("write failed") });
        let err = batch.flush().await.unwrap_err();
        assert!(err.to_string().contains("write failed"));
    }

    #[tokio::test]
    async fn empty_batch_flushes() {
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.flush().await.expect("flush");
    }
}
