//! Pull-based cursor over a paginated, possibly still-growing feed
//!
//! A [`StreamPaginator`] turns a sequence of pages, each reachable only by
//! following a link carried in the previous one, into a single cursor over
//! items. A live feed may promise more pages (`has_future`) without having
//! linked one yet; the paginator then waits up to a run-out grace period,
//! polling at a fixed back-off interval, before declaring the feed
//! exhausted. [`StreamPaginator::dry_up`] short-circuits that wait when the
//! caller independently knows nothing further will come (e.g. the job has
//! completed).

use crate::concurrency::check_cancelled;
use crate::error::{Error, Result};
use crate::pagination::adapter::{StaticPage, StaticPageStream};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default grace period granted to a live feed before it is declared exhausted
pub const DEFAULT_STREAM_EXHAUSTION_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Supplier of the first page of a feed
pub type FirstPageFetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Option<Arc<dyn StaticPageStream>>>> + Send + Sync>;

/// Follower of a page's next-page link
pub type NextPageFetcher = Arc<
    dyn Fn(Arc<dyn StaticPage>) -> BoxFuture<'static, Result<Option<Arc<dyn StaticPage>>>>
        + Send
        + Sync,
>;

/// Fetcher of a new stream page promised by `has_future`
pub type FutureStreamFetcher = Arc<
    dyn Fn(
            Arc<dyn StaticPageStream>,
        ) -> BoxFuture<'static, Result<Option<Arc<dyn StaticPageStream>>>>
        + Send
        + Sync,
>;

/// Cursor internals: the most recent stream page, the page currently being
/// drained, and the items buffered from it. All three empty/absent means the
/// cursor is exhausted.
struct Cursor {
    stream: Option<Arc<dyn StaticPageStream>>,
    page: Option<Arc<dyn StaticPage>>,
    items: VecDeque<Value>,
}

impl Cursor {
    fn exhausted() -> Self {
        Self {
            stream: None,
            page: None,
            items: VecDeque::new(),
        }
    }

    fn exhaust(&mut self) {
        self.stream = None;
        self.page = None;
        self.items.clear();
    }
}

/// Stateful cursor over a paginated message feed
///
/// Created per job-watch invocation and never shared across jobs. The cursor
/// state is mutated only by the draining task; the single designed point of
/// cross-task mutation is [`dry_up`](Self::dry_up), which is lock-free and
/// wakes any in-progress grace-period wait.
pub struct StreamPaginator {
    cursor: Mutex<Cursor>,
    dried_up: AtomicBool,
    dry_up_signal: Notify,
    cancel: CancellationToken,
    run_out_grace_period: Duration,
    backoff_period: Duration,
    fetch_next: NextPageFetcher,
    fetch_future: FutureStreamFetcher,
}

impl StreamPaginator {
    /// Create a paginator, eagerly fetching the first page
    ///
    /// A `None` first page is an immediately-exhausted stream, not an error.
    pub async fn new(
        cancel: &CancellationToken,
        run_out_grace_period: Duration,
        backoff_period: Duration,
        fetch_first: FirstPageFetcher,
        fetch_next: NextPageFetcher,
        fetch_future: FutureStreamFetcher,
    ) -> Result<Self> {
        check_cancelled(cancel, "message paginator creation")?;
        let cursor = match fetch_first().await? {
            None => Cursor::exhausted(),
            Some(stream) => {
                let items = stream.item_iterator()?.collect();
                Cursor {
                    page: Some(stream.clone() as Arc<dyn StaticPage>),
                    stream: Some(stream),
                    items,
                }
            }
        };
        Ok(Self {
            cursor: Mutex::new(cursor),
            dried_up: AtomicBool::new(false),
            dry_up_signal: Notify::new(),
            cancel: cancel.child_token(),
            run_out_grace_period,
            backoff_period,
            fetch_next,
            fetch_future,
        })
    }

    /// Whether an item may still be produced
    ///
    /// True while items are buffered, a next page is linked, or the feed
    /// still promises a future and has not been dried up. Performs no
    /// fetching and no waiting.
    pub async fn has_next(&self) -> bool {
        let cursor = self.cursor.lock().await;
        if !cursor.items.is_empty() {
            return true;
        }
        let Some(page) = &cursor.page else {
            return false;
        };
        if page.has_next() {
            return true;
        }
        !self.is_running_dry()
            && cursor
                .stream
                .as_ref()
                .is_some_and(|stream| stream.has_future())
    }

    /// Pull the next item, advancing the cursor
    ///
    /// Transparently follows next-page links, and waits out the run-out
    /// grace period for a promised future page. Returns `Ok(None)` once the
    /// feed is exhausted; a `None` next or future page is exhaustion, not an
    /// error.
    pub async fn next(&self) -> Result<Option<Value>> {
        loop {
            check_cancelled(&self.cancel, "message paginator")?;
            let mut cursor = self.cursor.lock().await;
            if let Some(item) = cursor.items.pop_front() {
                return Ok(Some(item));
            }
            let Some(page) = cursor.page.clone() else {
                return Ok(None);
            };
            if page.has_next() {
                match (self.fetch_next)(page).await? {
                    Some(next_page) => {
                        cursor.items = next_page.item_iterator()?.collect();
                        cursor.page = Some(next_page);
                    }
                    None => {
                        cursor.exhaust();
                        return Ok(None);
                    }
                }
                continue;
            }
            if self.is_running_dry() {
                cursor.exhaust();
                return Ok(None);
            }
            let Some(stream) = cursor.stream.clone() else {
                cursor.exhaust();
                return Ok(None);
            };
            if !stream.has_future() {
                cursor.exhaust();
                return Ok(None);
            }
            drop(cursor);
            if !self.await_future_page(stream).await? {
                self.cursor.lock().await.exhaust();
                return Ok(None);
            }
        }
    }

    /// Wait up to the run-out grace period for a promised future page
    ///
    /// Returns true when the cursor was advanced to a page with content.
    /// Returns false when the grace period elapsed, the feed was dried up,
    /// or an arrived stream can promise nothing further.
    async fn await_future_page(&self, stream: Arc<dyn StaticPageStream>) -> Result<bool> {
        let deadline = Instant::now() + self.run_out_grace_period;
        let mut current = stream;
        loop {
            if self.is_running_dry() {
                return Ok(false);
            }
            if let Some(future) = (self.fetch_future)(current.clone()).await? {
                let items: VecDeque<Value> = future.item_iterator()?.collect();
                let advanced = !items.is_empty() || future.has_next();
                let mut cursor = self.cursor.lock().await;
                cursor.page = Some(future.clone() as Arc<dyn StaticPage>);
                cursor.stream = Some(future.clone());
                if advanced {
                    cursor.items = items;
                    return Ok(true);
                }
                if !future.has_future() {
                    return Ok(false);
                }
                drop(cursor);
                current = future;
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let wait = self.backoff_period.min(deadline - now);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(Error::Cancelled("message paginator".to_string()));
                }
                _ = self.dry_up_signal.notified() => return Ok(false),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Declare that no further data should be expected from the feed
    ///
    /// Linked next pages and already-buffered items are still drained;
    /// only the wait for future pages stops. Idempotent, and safe to call
    /// from a different task than the draining one.
    pub fn dry_up(&self) -> Result<()> {
        self.dried_up.store(true, Ordering::Release);
        self.dry_up_signal.notify_waiters();
        Ok(())
    }

    /// Whether [`dry_up`](Self::dry_up) has been invoked
    pub fn is_running_dry(&self) -> bool {
        self.dried_up.load(Ordering::Acquire)
    }

    /// Release the paginator, unblocking any in-flight wait
    ///
    /// Safe to call more than once; subsequent [`next`](Self::next) calls
    /// fail with `Cancelled`.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Factory bundling the paging knobs and fetch functions of a message feed
///
/// One factory serves many watches: each [`create`](Self::create) call
/// produces an independent paginator for one job's feed.
#[derive(Clone)]
pub struct PaginatorFactory {
    run_out_grace_period: Duration,
    backoff_period: Duration,
    fetch_next: NextPageFetcher,
    fetch_future: FutureStreamFetcher,
}

impl PaginatorFactory {
    /// Create a factory from paging periods and page-fetch functions
    pub fn new(
        run_out_grace_period: Duration,
        backoff_period: Duration,
        fetch_next: NextPageFetcher,
        fetch_future: FutureStreamFetcher,
    ) -> Self {
        Self {
            run_out_grace_period,
            backoff_period,
            fetch_next,
            fetch_future,
        }
    }

    /// Replace the run-out grace period
    pub fn with_run_out_grace_period(mut self, period: Duration) -> Self {
        self.run_out_grace_period = period;
        self
    }

    /// Replace the back-off interval between future-page polls
    pub fn with_backoff_period(mut self, period: Duration) -> Self {
        self.backoff_period = period;
        self
    }

    /// Create a paginator over the feed whose first page `fetch_first` yields
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        fetch_first: FirstPageFetcher,
    ) -> Result<StreamPaginator> {
        StreamPaginator::new(
            cancel,
            self.run_out_grace_period,
            self.backoff_period,
            fetch_first,
            self.fetch_next.clone(),
            self.fetch_future.clone(),
        )
        .await
    }
}
