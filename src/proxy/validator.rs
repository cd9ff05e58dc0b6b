//! Bounded concurrent validation of a proxy list

use crate::config::ValidatorConfig;
use crate::proxy::models::{ProbeResult, ProxyEndpoint, WorkingSet};
use crate::proxy::probe::{HttpProbe, Probe};
use crate::Result;
use futures::stream::{self, Stream, StreamExt};
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// A finished probe together with the input position of its proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub index: usize,
    pub result: ProbeResult,
}

/// Runs one probe per proxy with at most `concurrency` in flight
#[derive(Clone)]
pub struct Validator {
    probe: Arc<dyn Probe>,
    concurrency: usize,
}

impl Validator {
    /// Create a validator probing over HTTP with the given configuration
    pub fn new(config: &ValidatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_probe(HttpProbe::new(config)?, config.concurrency))
    }

    /// Create a validator around any probe implementation
    pub fn with_probe<P: Probe + 'static>(probe: P, concurrency: usize) -> Self {
        Self {
            probe: Arc::new(probe),
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Probe every proxy, yielding results in completion order
    pub fn completions(
        &self,
        endpoints: Vec<ProxyEndpoint>,
    ) -> impl Stream<Item = Completion> + Send + '_ {
        stream::iter(endpoints.into_iter().enumerate())
            .map(move |(index, endpoint)| async move {
                let result = self.probe.probe(&endpoint).await;
                Completion { index, result }
            })
            .buffer_unordered(self.concurrency)
    }

    /// Probe every proxy and keep the working ones, in input order
    pub async fn validate(&self, endpoints: Vec<ProxyEndpoint>) -> WorkingSet {
        self.validate_with(endpoints, |_| {}).await
    }

    /// Like [`validate`](Self::validate), calling `on_completion` as each probe finishes
    pub async fn validate_with<F>(
        &self,
        endpoints: Vec<ProxyEndpoint>,
        mut on_completion: F,
    ) -> WorkingSet
    where
        F: FnMut(&Completion),
    {
        if endpoints.is_empty() {
            return WorkingSet::new();
        }

        let total = endpoints.len();
        info!(total, concurrency = self.concurrency, "validating proxies");

        let mut working = Vec::new();
        let mut completions = pin!(self.completions(endpoints));
        while let Some(completion) = completions.next().await {
            on_completion(&completion);
            if let ProbeResult::Success { endpoint, .. } = completion.result {
                working.push((completion.index, endpoint));
            }
        }

        working.sort_by_key(|(index, _)| *index);
        info!(total, working = working.len(), "validation finished");

        working.into_iter().map(|(_, endpoint)| endpoint).collect()
    }

    /// Run the validation on a background task.
    ///
    /// The receiver yields every completion and closes once all probes have
    /// reported.
    pub fn spawn(&self, endpoints: Vec<ProxyEndpoint>) -> mpsc::UnboundedReceiver<Completion> {
        let (tx, rx) = mpsc::unbounded_channel();
        let validator = self.clone();

        tokio::spawn(async move {
            let mut completions = pin!(validator.completions(endpoints));
            while let Some(completion) = completions.next().await {
                // Keep probing even if nobody listens; runs are never cut short.
                let _ = tx.send(completion);
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Succeeds for endpoints starting with "ok", tracks how many run at once
    #[derive(Default)]
    struct FakeProbe {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FakeProbe {
        fn with_delay(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                ..Default::default()
            })
        }
    }

    impl Probe for Arc<FakeProbe> {
        fn probe<'a>(&'a self, endpoint: &'a ProxyEndpoint) -> BoxFuture<'a, ProbeResult> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);

                let delay = if endpoint.as_str().contains("slow") {
                    self.delay * 10
                } else {
                    self.delay
                };
                tokio::time::sleep(delay).await;

                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                if endpoint.as_str().starts_with("ok") {
                    ProbeResult::success(endpoint.clone(), 15, delay.as_millis() as u64)
                } else {
                    ProbeResult::failure(endpoint.clone())
                }
            }
            .boxed()
        }
    }

    fn endpoints(list: &[&str]) -> Vec<ProxyEndpoint> {
        list.iter().copied().map(ProxyEndpoint::from).collect()
    }

    #[tokio::test]
    async fn test_empty_input_dispatches_nothing() {
        let probe = FakeProbe::with_delay(Duration::from_millis(1));
        let validator = Validator::with_probe(probe.clone(), 4);

        let working = validator.validate(Vec::new()).await;

        assert!(working.is_empty());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keeps_only_successes_in_input_order() {
        let probe = FakeProbe::with_delay(Duration::from_millis(5));
        let validator = Validator::with_probe(probe.clone(), 3);
        let input = endpoints(&["ok-slow-1", "bad-1", "ok-2", "bad-2", "ok-3"]);

        let working = validator.validate(input.clone()).await;

        assert_eq!(working.into_vec(), endpoints(&["ok-slow-1", "ok-2", "ok-3"]));
        assert_eq!(probe.calls.load(Ordering::SeqCst), input.len());
    }

    #[tokio::test]
    async fn test_duplicates_probed_independently() {
        let probe = FakeProbe::with_delay(Duration::from_millis(1));
        let validator = Validator::with_probe(probe.clone(), 2);

        let working = validator
            .validate(endpoints(&["ok-a", "ok-a", "bad", "bad"]))
            .await;

        assert_eq!(working.into_vec(), endpoints(&["ok-a", "ok-a"]));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_never_exceeds_concurrency() {
        let probe = FakeProbe::with_delay(Duration::from_millis(10));
        let validator = Validator::with_probe(probe.clone(), 4);
        let input: Vec<ProxyEndpoint> = (0..25)
            .map(|i| ProxyEndpoint::new(format!("ok-{}", i)))
            .collect();

        let working = validator.validate(input).await;

        assert_eq!(working.len(), 25);
        assert!(probe.max_in_flight.load(Ordering::SeqCst) <= 4);
        assert!(probe.max_in_flight.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_working_set_never_larger_than_input() {
        let probe = FakeProbe::with_delay(Duration::from_millis(1));
        let validator = Validator::with_probe(probe, 8);
        let input = endpoints(&["ok-1", "bad", "ok-2", "", "   "]);

        let working = validator.validate(input.clone()).await;

        assert!(working.len() <= input.len());
        assert_eq!(working.len(), 2);
    }

    #[tokio::test]
    async fn test_validation_is_repeatable() {
        let probe = FakeProbe::with_delay(Duration::from_millis(2));
        let validator = Validator::with_probe(probe, 3);
        let input = endpoints(&["ok-slow", "bad", "ok-1", "ok-2", "bad-2", "ok-3"]);

        let first = validator.validate(input.clone()).await;
        let second = validator.validate(input).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_slow_probe_does_not_hold_back_others() {
        let probe = FakeProbe::with_delay(Duration::from_millis(20));
        let validator = Validator::with_probe(probe, 2);
        let input = endpoints(&["ok-slow", "ok-1", "ok-2", "ok-3"]);

        let mut order = Vec::new();
        let start = Instant::now();
        let working = validator
            .validate_with(input, |completion| order.push(completion.index))
            .await;

        assert_eq!(working.len(), 4);
        assert_eq!(order.len(), 4);
        assert_eq!(order.last(), Some(&0));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_spawn_reports_every_completion() {
        let probe = FakeProbe::with_delay(Duration::from_millis(1));
        let validator = Validator::with_probe(probe, 2);

        let mut rx = validator.spawn(endpoints(&["ok-1", "bad", "ok-2"]));
        let mut completions = Vec::new();
        while let Some(completion) = rx.recv().await {
            completions.push(completion);
        }

        assert_eq!(completions.len(), 3);
        assert_eq!(
            completions.iter().filter(|c| c.result.is_success()).count(),
            2
        );
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let validator = Validator::with_probe(FakeProbe::with_delay(Duration::ZERO), 0);
        assert_eq!(validator.concurrency(), 1);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ValidatorConfig::new().with_concurrency(0);
        assert!(Validator::new(&config).is_err());
    }
}
