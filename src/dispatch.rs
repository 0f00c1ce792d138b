//! # Request Dispatcher
//!
//! Runs a batch of calls with at most `parallelism` in flight and collects the outcomes
//! into slots that keep the order of the input, whatever order the calls complete in.
//!
//! A failing call never cancels the others: it is logged with the request it came from
//! and leaves an empty slot. Only a batch in which every call failed is an error.

use crate::error::{DaasError, DaasResult};
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use std::fmt::Display;
use std::future::Future;

/// Ordered outcome of a batch; slot `i` belongs to request `i`
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    slots: Vec<Option<T>>,
}

impl<T> BatchResult<T> {
    pub fn from_slots(slots: Vec<Option<T>>) -> Self {
        BatchResult { slots }
    }

    pub fn slots(&self) -> &[Option<T>] {
        &self.slots
    }

    pub fn into_slots(self) -> Vec<Option<T>> {
        self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Indices of the requests that failed.
    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Successful results in request order.
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    pub fn into_successes(self) -> Vec<T> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Runs `call(i)` for every request index with bounded concurrency.
///
/// `requests` only labels log lines. A parallelism of 0 is treated as 1.
///
/// # Errors
/// `AllRequestsFailed` when the batch is non-empty and no call succeeded.
pub async fn run_batch<R, T, F, Fut>(
    requests: &[R],
    parallelism: usize,
    call: F,
) -> DaasResult<BatchResult<T>>
where
    R: Display,
    F: Fn(usize) -> Fut,
    Fut: Future<Output = DaasResult<T>>,
{
    let total = requests.len();
    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();

    let mut outcomes = stream::iter((0..total).map(|i| {
        let pending = call(i);
        async move { (i, pending.await) }
    }))
    .buffer_unordered(parallelism.max(1));

    while let Some((i, outcome)) = outcomes.next().await {
        match outcome {
            Ok(value) => slots[i] = Some(value),
            Err(e) => error!("{} - {}", requests[i], e),
        }
    }

    let failed = slots.iter().filter(|s| s.is_none()).count();
    if total > 0 && failed == total {
        error!("all {} requests failed", total);
        return Err(DaasError::AllRequestsFailed(total));
    }
    if failed > 0 {
        warn!("{} of {} requests failed", failed, total);
    } else {
        info!("{} requests completed", total);
    }
    Ok(BatchResult { slots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn remote_failure() -> DaasError {
        DaasError::RemoteQuery {
            code: -1,
            message: "no data".to_string(),
        }
    }

    #[tokio::test]
    async fn test_slots_follow_request_order() {
        let requests = vec!["a", "b", "c", "d"];
        // later requests finish first
        let batch = run_batch(&requests, 4, |i| async move {
            tokio::time::sleep(Duration::from_millis(40 - 10 * i as u64)).await;
            Ok::<_, DaasError>(i * 10)
        })
        .await
        .unwrap();

        let values: Vec<usize> = batch.successes().copied().collect();
        assert_eq!(values, vec![0, 10, 20, 30]);
        assert!(batch.is_complete());
    }

    #[tokio::test]
    async fn test_all_failed() {
        let requests = vec!["a", "b", "c"];
        let result = run_batch(&requests, 2, |_| async { Err::<usize, _>(remote_failure()) }).await;
        assert!(matches!(result, Err(DaasError::AllRequestsFailed(3))));
    }

    #[tokio::test]
    async fn test_partial_failure_reports_missing() {
        let requests = vec!["a", "b", "c"];
        let batch = run_batch(&requests, 1, |i| async move {
            if i == 1 { Ok(i) } else { Err(remote_failure()) }
        })
        .await
        .unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.missing(), vec![0, 2]);
        assert_eq!(batch.into_successes(), vec![1]);
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let requests: Vec<usize> = (0..8).collect();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        run_batch(&requests, 3, |i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, DaasError>(i)
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_zero_parallelism_runs_sequentially() {
        let requests = vec!["only"];
        let batch = tokio_test::block_on(run_batch(&requests, 0, |_| async { Ok::<_, DaasError>(7) })).unwrap();
        assert_eq!(batch.into_successes(), vec![7]);
    }
}
