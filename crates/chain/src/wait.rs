use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use wdchain_core_types::{ChainError, ChainResult, Trace};

use crate::config::WaitConfig;
use crate::trace::compact;

/// Polls a condition until it holds or the timeout elapses.
#[derive(Clone, Copy, Debug)]
pub struct WaitLoop {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitLoop {
    fn default() -> Self {
        Self::from_config(&WaitConfig::default())
    }
}

impl WaitLoop {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn from_config(config: &WaitConfig) -> Self {
        Self::new(config.timeout(), config.interval())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A not-found failure from `condition` counts as "not yet"; any other
    /// failure ends the loop. On timeout the returned error carries a single
    /// compacted frame named `label`.
    pub async fn run<F, Fut>(
        &self,
        label: &str,
        message: impl Into<String>,
        mut condition: F,
    ) -> ChainResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ChainResult<bool>>,
    {
        let started = Instant::now();
        let mut iterations = 0usize;
        loop {
            iterations += 1;
            match condition().await {
                Ok(true) => {
                    debug!(target: "wdchain::chain", label, iterations, "wait condition met");
                    return Ok(());
                }
                Ok(false) => {}
                Err(err) if err.is_no_such_element() => {}
                Err(err) => return Err(err),
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                let timeout_ms = self.timeout.as_millis() as u64;
                return Err(ChainError::wait_timeout(message, timeout_ms)
                    .with_trace(Trace::single(compact(label, iterations))));
            }
            tokio::time::sleep(self.interval.min(self.timeout - elapsed)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wdchain_core_types::TraceFrame;

    #[tokio::test]
    async fn returns_once_condition_holds() {
        let mut calls = 0;
        let wait = WaitLoop::new(Duration::from_millis(500), Duration::from_millis(1));
        wait.run("waitUntil", "never", || {
            calls += 1;
            let done = calls >= 3;
            async move { Ok(done) }
        })
        .await
        .unwrap();
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn timeout_compacts_iterations_into_one_group() {
        let wait = WaitLoop::new(Duration::from_millis(30), Duration::from_millis(2));
        let err = wait
            .run("waitForExist", "element (#late) still not existing", || async {
                Err(ChainError::no_such_element("#late", "not in DOM"))
            })
            .await
            .unwrap_err();

        assert!(err.is_wait_timeout());
        assert_eq!(err.trace().len(), 1);
        match &err.trace().frames()[0] {
            TraceFrame::Group { label, iterations } => {
                assert_eq!(label, "waitForExist");
                assert!(*iterations > 1);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_failures_stop_the_loop() {
        let wait = WaitLoop::default();
        let err = wait
            .run("waitUntil", "x", || async { Err(ChainError::remote("gone")) })
            .await
            .unwrap_err();
        assert!(err.is_remote());
    }
}
