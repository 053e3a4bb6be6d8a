use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, error};
use tokio::sync::Semaphore;

use crate::errors::RenderError;

/// Runs per-section work with at most `max_concurrent` tasks in flight
#[derive(Debug, Clone)]
pub struct ClipBatcher {
    max_concurrent: usize,
}

impl ClipBatcher {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run `task` over every item and return the results in item order.
    ///
    /// Stops at the first failure: no further items are started and the
    /// tasks still in flight are dropped.
    pub async fn run<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        task: F,
        progress: impl Fn(usize, usize),
    ) -> Result<Vec<R>, RenderError>
    where
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = Result<R, RenderError>>,
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let finished = Arc::new(AtomicUsize::new(0));

        let mut pending = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| {
                let semaphore = semaphore.clone();
                let work = task(index, item);
                async move {
                    // The semaphore is never closed, so acquire only fails if it is
                    let _permit = semaphore.acquire().await.ok();
                    (index, work.await)
                }
            })
            .buffer_unordered(self.max_concurrent);

        let mut results = Vec::with_capacity(total);
        while let Some((index, result)) = pending.next().await {
            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            match result {
                Ok(value) => {
                    debug!("Section {} done ({}/{})", index + 1, done, total);
                    progress(done, total);
                    results.push((index, value));
                }
                Err(e) => {
                    error!("Section {} failed, abandoning remaining sections: {}", index + 1, e);
                    return Err(e);
                }
            }
        }

        // Sort results by index to maintain section order
        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }
}
