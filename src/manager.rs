//! Job manager: status classification and completion watching
//!
//! A [`JobManager`] answers two questions about a remote asynchronous job:
//! where it stands right now ([`has_job_completed`](JobManager::has_job_completed)),
//! and when it is over ([`wait_for_job_completion`](JobManager::wait_for_job_completion)).
//! The completion watch runs two concurrent activities against one scoped
//! cancellation token: a message drain that logs the job's feed as it grows,
//! and a status poll that dries the feed up the moment the job is done. A
//! fresh status check after both activities settle is the authority on the
//! job's outcome.

use crate::api::check_api_call;
use crate::concurrency::{check_cancelled, sleep_with_cancel};
use crate::config::WatcherConfig;
use crate::error::{Error, Result};
use crate::messages::{MessageLogger, MessageLoggerFactory};
use crate::pagination::{
    FirstPageFetcher, FutureStreamFetcher, NextPageFetcher, PaginatorFactory, StaticPageStream,
    StreamPaginator, to_stream,
};
use crate::retry::{BackoffPolicy, wait_until};
use crate::types::{AsynchronousJob, JobClient};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Watches remote asynchronous jobs and relays their messages
///
/// Cheap to clone; clones share the underlying client and factories.
#[derive(Clone)]
pub struct JobManager {
    client: Arc<dyn JobClient>,
    logger_factory: MessageLoggerFactory,
    paginator_factory: PaginatorFactory,
    backoff_period: Duration,
    state_backoff: BackoffPolicy,
    completion_timeout: Duration,
}

/// Human-readable job designation for error narration
fn describe(job: &dyn AsynchronousJob) -> Result<String> {
    Ok(format!("{} [{}]", job.job_type(), job.name()?))
}

impl JobManager {
    /// Create a manager over `client`, configured by `config`
    pub fn new(
        client: Arc<dyn JobClient>,
        logger_factory: MessageLoggerFactory,
        config: &WatcherConfig,
    ) -> Self {
        let next_client = client.clone();
        let fetch_next: NextPageFetcher = Arc::new(move |current| {
            let client = next_client.clone();
            Box::pin(async move { client.fetch_next_message_page(current).await })
        });
        let future_client = client.clone();
        let fetch_future: FutureStreamFetcher = Arc::new(move |current| {
            let client = future_client.clone();
            Box::pin(async move { client.fetch_future_message_stream(current).await })
        });
        let paginator_factory = PaginatorFactory::new(
            config.run_out_grace_period,
            config.backoff_period,
            fetch_next,
            fetch_future,
        );
        Self {
            client,
            logger_factory,
            paginator_factory,
            backoff_period: config.backoff_period,
            state_backoff: config.state_backoff.clone(),
            completion_timeout: config.completion_timeout,
        }
    }

    /// Fetch a fresh status snapshot of `job`
    pub async fn fetch_job_status(
        &self,
        cancel: &CancellationToken,
        job: &dyn AsynchronousJob,
    ) -> Result<Arc<dyn AsynchronousJob>> {
        check_cancelled(cancel, "job status fetch")?;
        let name = job.name()?;
        let context = format!("could not fetch {} [{}]'s status", job.job_type(), name);
        let outcome = self.client.fetch_job_status(&name).await;
        check_api_call(cancel, &context, outcome)
    }

    /// Whether `job` has completed, and how
    ///
    /// Fetches a fresh snapshot and classifies it by precedence: error over
    /// failure over success. A done snapshot carrying none of the three
    /// outcome flags is reported as unexpected. The boolean states the
    /// completion fact, independently of the outcome: a failed job is
    /// `(true, Err(Invalid))`.
    pub async fn has_job_completed(
        &self,
        cancel: &CancellationToken,
        job: &dyn AsynchronousJob,
    ) -> (bool, Result<()>) {
        let label = match describe(job) {
            Ok(label) => label,
            Err(error) => return (false, Err(error)),
        };
        let status = match self.fetch_job_status(cancel, job).await {
            Ok(status) => status,
            Err(error) => return (false, Err(error)),
        };
        let completed = status.is_done();
        if status.is_error() {
            return (
                completed,
                Err(Error::Unexpected(format!(
                    "{label} has errored: {}",
                    status.status()
                ))),
            );
        }
        if status.is_failure() {
            return (
                completed,
                Err(Error::Invalid(format!(
                    "{label} has failed: {}",
                    status.status()
                ))),
            );
        }
        if status.is_success() {
            return (completed, Ok(()));
        }
        if completed {
            return (
                true,
                Err(Error::Unexpected(format!(
                    "{label} has completed, but not successfully: {}",
                    status.status()
                ))),
            );
        }
        (false, Ok(()))
    }

    /// Whether `job` has left the queue
    ///
    /// The local snapshot can prove a start, never disprove one; only a
    /// still-queued snapshot warrants a remote check.
    pub async fn has_job_started(
        &self,
        cancel: &CancellationToken,
        job: &dyn AsynchronousJob,
    ) -> Result<bool> {
        if job.is_done() || !job.is_queued() {
            return Ok(true);
        }
        let status = self.fetch_job_status(cancel, job).await?;
        Ok(status.is_done() || !status.is_queued())
    }

    /// Fetch the first page of `job`'s message feed, if it has one
    pub async fn fetch_job_messages_first_page(
        &self,
        cancel: &CancellationToken,
        job: &dyn AsynchronousJob,
    ) -> Result<Option<Arc<dyn StaticPageStream>>> {
        self.first_message_page(cancel, &job.job_type(), &job.name()?)
            .await
    }

    async fn first_message_page(
        &self,
        cancel: &CancellationToken,
        kind: &str,
        name: &str,
    ) -> Result<Option<Arc<dyn StaticPageStream>>> {
        check_cancelled(cancel, "first message page fetch")?;
        let context = format!("could not fetch {kind} [{name}]'s messages first page");
        let outcome = self.client.fetch_first_message_page(name).await;
        let page = check_api_call(cancel, &context, outcome)?;
        Ok(to_stream(page))
    }

    /// Poll `job`'s status until `predicate` approves a snapshot
    ///
    /// Retries with the configured state backoff; the attempt budget and the
    /// hard deadline both derive from `timeout`. `description` names the
    /// awaited state for error narration.
    pub async fn wait_for_job_state<P>(
        &self,
        cancel: &CancellationToken,
        job: &dyn AsynchronousJob,
        description: &str,
        predicate: P,
        timeout: Duration,
    ) -> Result<()>
    where
        P: Fn(&dyn AsynchronousJob) -> bool + Send + Sync,
    {
        let predicate = &predicate;
        let check = move || async move {
            let status = self.fetch_job_status(cancel, job).await?;
            Ok(predicate(status.as_ref()))
        };
        let wait = wait_until(cancel, &self.state_backoff, timeout, description, check);
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(description.to_string())),
        }
    }

    /// Obtain a paginator over `job`'s message feed
    ///
    /// Waits for the job to leave the queue and for its feed to exist before
    /// fetching the first page; the waits and the fetch share one deadline.
    pub async fn get_message_paginator(
        &self,
        cancel: &CancellationToken,
        job: &Arc<dyn AsynchronousJob>,
        timeout: Duration,
    ) -> Result<StreamPaginator> {
        let label = describe(job.as_ref())?;
        let build = async {
            if !self.has_job_started(cancel, job.as_ref()).await? {
                self.wait_for_job_state(
                    cancel,
                    job.as_ref(),
                    &format!("{label} being started"),
                    |status| status.is_done() || !status.is_queued(),
                    timeout,
                )
                .await?;
            }
            if !job.has_messages() {
                self.wait_for_job_state(
                    cancel,
                    job.as_ref(),
                    &format!("{label} having messages"),
                    |status| status.has_messages(),
                    timeout,
                )
                .await?;
            }
            let manager = self.clone();
            let fetch_scope = cancel.clone();
            let kind = job.job_type();
            let name = job.name()?;
            let fetch_first: FirstPageFetcher = Arc::new(move || {
                let manager = manager.clone();
                let cancel = fetch_scope.clone();
                let kind = kind.clone();
                let name = name.clone();
                Box::pin(async move { manager.first_message_page(&cancel, &kind, &name).await })
            });
            self.paginator_factory.create(cancel, fetch_first).await
        };
        match tokio::time::timeout(timeout, build).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "obtaining {label}'s message paginator"
            ))),
        }
    }

    /// Watch `job` until it completes, relaying its messages
    ///
    /// Uses the configured default completion timeout.
    pub async fn wait_for_job_completion(
        &self,
        cancel: &CancellationToken,
        job: Arc<dyn AsynchronousJob>,
    ) -> Result<()> {
        self.wait_for_job_completion_with_timeout(cancel, job, self.completion_timeout)
            .await
    }

    /// Watch `job` until it completes or `timeout` elapses, relaying its
    /// messages
    ///
    /// Returns `Ok` only for a successful completion: a failed job yields
    /// `Invalid`, an errored or flag-less done job `Unexpected`, an
    /// exceeded deadline `Timeout`. Watch-internal problems are logged, not
    /// returned; the final fresh status check decides the outcome.
    pub async fn wait_for_job_completion_with_timeout(
        &self,
        cancel: &CancellationToken,
        job: Arc<dyn AsynchronousJob>,
        timeout: Duration,
    ) -> Result<()> {
        check_cancelled(cancel, "job completion watch")?;
        let label = describe(job.as_ref())?;
        let watch = cancel.child_token();
        let group_outcome = match tokio::time::timeout(timeout, self.watch_job(&watch, &job, timeout)).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                watch.cancel();
                Err(Error::Timeout(format!("waiting for {label} to complete")))
            }
        };
        if let Err(error) = &group_outcome {
            if error.is_cancellation() {
                tracing::debug!(job = %label, error = %error, "job watch interrupted");
            } else {
                tracing::warn!(job = %label, error = %error, "job watch ended with an error");
            }
        }
        // a fresh status check is the authority on the job's outcome
        let (completed, outcome) = self.has_job_completed(cancel, job.as_ref()).await;
        outcome?;
        if !completed {
            return group_outcome.and(Err(Error::Condition(format!(
                "{label} has not completed"
            ))));
        }
        Ok(())
    }

    /// Log everything `job`'s message feed currently holds, without waiting
    /// for the feed to grow
    pub async fn log_job_messages_until_now(
        &self,
        cancel: &CancellationToken,
        job: &Arc<dyn AsynchronousJob>,
        timeout: Duration,
    ) -> Result<()> {
        check_cancelled(cancel, "job message logging")?;
        let label = describe(job.as_ref())?;
        let scope = cancel.child_token();
        let drain = async {
            let paginator = self.get_message_paginator(&scope, job, timeout).await?;
            // only what the feed already holds; never wait for future pages
            paginator.dry_up()?;
            let logger = self.logger_factory.create();
            logger.set_source(&job.name()?);
            let result = logger.log_messages_collection(&scope, &paginator).await;
            paginator.close();
            logger.close().await;
            result
        };
        match tokio::time::timeout(timeout, drain).await {
            Ok(result) => result,
            Err(_) => {
                scope.cancel();
                Err(Error::Timeout(format!("logging {label}'s messages")))
            }
        }
    }

    async fn watch_job(
        &self,
        watch: &CancellationToken,
        job: &Arc<dyn AsynchronousJob>,
        timeout: Duration,
    ) -> Result<()> {
        let logger = Arc::new(self.logger_factory.create());
        logger.set_source(&job.name()?);
        let paginator = Arc::new(self.get_message_paginator(watch, job, timeout).await?);
        let result = self
            .run_watch_activities(watch, job, &logger, &paginator)
            .await;
        if let Err(error) = &result {
            logger.log_error(error, "job watch activities failed");
        }
        paginator.close();
        logger.close().await;
        result
    }

    /// Run the two watch activities to settlement
    ///
    /// Either activity failing cancels the shared watch scope, bringing the
    /// sibling down; the first non-cancellation error is the one reported.
    async fn run_watch_activities(
        &self,
        watch: &CancellationToken,
        job: &Arc<dyn AsynchronousJob>,
        logger: &Arc<MessageLogger>,
        paginator: &Arc<StreamPaginator>,
    ) -> Result<()> {
        let drain = {
            let token = watch.clone();
            let logger = logger.clone();
            let paginator = paginator.clone();
            tokio::spawn(async move {
                let result = logger.log_messages_collection(&token, &paginator).await;
                if result.is_err() {
                    token.cancel();
                }
                result
            })
        };
        let poll = {
            let token = watch.clone();
            let manager = self.clone();
            let job = job.clone();
            let paginator = paginator.clone();
            tokio::spawn(async move {
                let result = manager
                    .poll_for_completion(&token, job.as_ref(), &paginator)
                    .await;
                if result.is_err() {
                    token.cancel();
                }
                result
            })
        };
        let (drain_result, poll_result) = tokio::join!(drain, poll);
        let drain_result = drain_result
            .map_err(|e| Error::Unexpected(format!("message drain task aborted: {e}")))?;
        let poll_result = poll_result
            .map_err(|e| Error::Unexpected(format!("completion poll task aborted: {e}")))?;
        match (drain_result, poll_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(drain_error), Ok(())) => Err(drain_error),
            (Ok(()), Err(poll_error)) => Err(poll_error),
            (Err(drain_error), Err(poll_error)) => {
                if drain_error.is_cancellation() {
                    Err(poll_error)
                } else {
                    Err(drain_error)
                }
            }
        }
    }

    /// Poll `job`'s status until it completes, then dry the feed up
    ///
    /// Transient status problems (an unreachable endpoint, a reported
    /// failure that the final check will classify) are logged and polling
    /// continues; a missing job name and cancellation are fatal.
    async fn poll_for_completion(
        &self,
        cancel: &CancellationToken,
        job: &dyn AsynchronousJob,
        paginator: &StreamPaginator,
    ) -> Result<()> {
        loop {
            check_cancelled(cancel, "completion poll")?;
            let (completed, outcome) = self.has_job_completed(cancel, job).await;
            if let Err(error) = outcome {
                if matches!(error, Error::Undefined(_)) || error.is_cancellation() {
                    return Err(error);
                }
                tracing::warn!(error = %error, "completion poll reported an error");
            }
            if completed {
                return paginator.dry_up();
            }
            sleep_with_cancel(cancel, self.backoff_period, "completion poll").await?;
        }
    }
}
