//! Resilient per-symbol fetch scheduler.
//!
//! Every symbol becomes a [`FetchTask`] that moves through
//! `Fetching -> {Succeeded, Requeued, Failed}`:
//!
//! - a fresh snapshot is accumulated and the task succeeds;
//! - a stale snapshot (older than `stale_after_minutes`) triggers a
//!   fire-and-forget refresh request and sends the task to the back of the
//!   queue without consuming an attempt;
//! - a retryable status (429/5xx) waits `Retry-After` seconds when the
//!   upstream sent one (visible to every worker through the [`RetryGate`]),
//!   otherwise `backoff_step * (attempt + 1)`, then tries again;
//! - anything else, or running out of attempts, fails the task. Failures are
//!   counted and the run goes on.
//!
//! Up to `concurrency` tasks are in flight at once. Results are merged by the
//! coordinator loop, so accumulation needs no locking.

pub mod gate;
pub mod outcome;

use std::collections::VecDeque;
use std::num::NonZeroU32;

use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use tracing::{debug, info, warn};

pub use gate::RetryGate;
pub use outcome::{FetchOutcome, FetchReport, TaskOutcome};

use crate::config::SchedulerConfig;
use crate::models::exception_symbols::ExceptionSymbolSet;
use crate::models::task::{FetchState, FetchTask};
use crate::providers::OptionsFeed;

pub struct FetchScheduler<F> {
    feed: F,
    exceptions: ExceptionSymbolSet,
    config: SchedulerConfig,
    gate: RetryGate,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl<F: OptionsFeed> FetchScheduler<F> {
    pub fn new(feed: F, exceptions: ExceptionSymbolSet, config: SchedulerConfig) -> Self {
        let limiter = config.requests_per_second.map(steady_limiter);
        Self {
            feed,
            exceptions,
            config,
            gate: RetryGate::new(),
            limiter,
        }
    }

    /// Fetches every symbol and returns what was accumulated.
    pub async fn run<I, S>(&self, symbols: I) -> FetchOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue: VecDeque<FetchTask> = symbols.into_iter().map(FetchTask::new).collect();
        let workers = self.config.concurrency.max(1);
        let mut in_flight = FuturesUnordered::new();
        let mut outcome = FetchOutcome::default();

        info!(symbols = queue.len(), workers, "starting fetch run");

        loop {
            while in_flight.len() < workers {
                let Some(task) = queue.pop_front() else {
                    break;
                };
                if task.queued_for_retry && queue.is_empty() && in_flight.is_empty() {
                    let delay = self.config.requeue_delay();
                    info!(symbol = %task.symbol, ?delay, "only requeued symbols left, cooling down");
                    tokio::time::sleep(delay).await;
                }
                in_flight.push(self.process(task));
            }

            let Some(result) = in_flight.next().await else {
                break;
            };

            debug!(state = %result.state(), "task finished");
            match result {
                TaskOutcome::Succeeded { task, snapshot } => {
                    info!(symbol = %task.symbol, contracts = snapshot.options.len(), "fetched");
                    outcome.record_success(snapshot);
                }
                TaskOutcome::Requeued(task) => {
                    if task.requeues > self.config.max_requeues {
                        warn!(symbol = %task.symbol, requeues = task.requeues, "still stale, giving up");
                        outcome.record_failure(task.symbol);
                    } else {
                        info!(symbol = %task.symbol, "pushed to the end of the queue");
                        outcome.report.requeued += 1;
                        queue.push_back(task);
                    }
                }
                TaskOutcome::Failed { task, error } => {
                    warn!(symbol = %task.symbol, attempts = task.attempts, %error, "fetch failed");
                    outcome.record_failure(task.symbol);
                }
            }
        }

        info!(report = %outcome.report, "fetch run finished");
        outcome
    }

    /// Drives one task until it succeeds, gets requeued or fails.
    async fn process(&self, mut task: FetchTask) -> TaskOutcome {
        let exception = self.exceptions.contains(&task.symbol);
        let stale_after = self.config.stale_after();

        loop {
            self.gate.wait().await;
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            debug!(symbol = %task.symbol, state = %FetchState::Fetching, attempt = task.attempts);
            let error = match self.feed.fetch_chain(&task.symbol, exception).await {
                Ok(snapshot) => {
                    let age = snapshot.age(Utc::now());
                    if age <= stale_after {
                        return TaskOutcome::Succeeded { task, snapshot };
                    }

                    warn!(
                        symbol = %task.symbol,
                        timestamp = %snapshot.timestamp,
                        age_minutes = age.num_minutes(),
                        "stale snapshot, requesting refresh"
                    );
                    if let Err(e) = self.feed.request_refresh(&task.symbol, exception).await {
                        debug!(symbol = %task.symbol, error = %e, "refresh request failed");
                    }
                    return TaskOutcome::Requeued(task.requeued());
                }
                Err(e) => e,
            };

            if !error.is_retryable(&self.config.retryable_statuses) {
                return TaskOutcome::Failed { task, error };
            }

            task.attempts += 1;
            if task.attempts >= self.config.max_attempts {
                warn!(symbol = %task.symbol, "max retries reached");
                return TaskOutcome::Failed { task, error };
            }

            match error.retry_after() {
                Some(wait) => {
                    warn!(symbol = %task.symbol, %error, ?wait, "upstream asked to retry later");
                    self.gate.hold_for(wait);
                }
                None => {
                    let wait = self.config.backoff(task.attempts - 1);
                    warn!(symbol = %task.symbol, %error, ?wait, "retryable error, backing off");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

fn steady_limiter(rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(rps).allow_burst(nonzero!(1u32)))
}
