//! Shared test fixtures: mock jobs, scripted feeds, and collecting sinks
//!
//! Page-fetch bookkeeping (indices, poll counters) lives in closure captures
//! on the fixture, never in module statics.

use crate::api::{ApiOutcome, ApiResponse};
use crate::error::{Error, Result};
use crate::messages::MessageSink;
use crate::pagination::{
    ClientMessageStream, ClientPage, FirstPageFetcher, FutureStreamFetcher, NextPageFetcher,
    PageItems, StaticPage, StaticPageStream, StreamPaginator, to_page, to_stream, unwrap_page,
    unwrap_stream,
};
use crate::types::{AsynchronousJob, JobClient};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Mock asynchronous job with directly settable flags
#[derive(Debug, Clone)]
pub(crate) struct MockJob {
    pub name: Option<String>,
    pub kind: String,
    pub done: bool,
    pub error: bool,
    pub failure: bool,
    pub success: bool,
    pub queued: bool,
    pub messages: bool,
    pub artefacts: bool,
    pub state: String,
}

impl MockJob {
    fn base(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: "mock job".to_string(),
            done: false,
            error: false,
            failure: false,
            success: false,
            queued: false,
            messages: true,
            artefacts: false,
            state: "mock state".to_string(),
        }
    }

    pub fn queued(name: &str) -> Self {
        Self {
            queued: true,
            ..Self::base(name)
        }
    }

    pub fn started(name: &str) -> Self {
        Self::base(name)
    }

    pub fn succeeded(name: &str) -> Self {
        Self {
            done: true,
            success: true,
            ..Self::base(name)
        }
    }

    pub fn failed(name: &str) -> Self {
        Self {
            done: true,
            failure: true,
            ..Self::base(name)
        }
    }

    pub fn errored(name: &str) -> Self {
        Self {
            done: true,
            error: true,
            ..Self::base(name)
        }
    }

    pub fn done_without_outcome(name: &str) -> Self {
        Self {
            done: true,
            ..Self::base(name)
        }
    }

    pub fn nameless() -> Self {
        Self {
            name: None,
            ..Self::base("")
        }
    }

    pub fn with_flags(done: bool, error: bool, failure: bool, success: bool) -> Self {
        Self {
            done,
            error,
            failure,
            success,
            ..Self::base("flagged-job")
        }
    }
}

impl AsynchronousJob for MockJob {
    fn name(&self) -> Result<String> {
        self.name
            .clone()
            .ok_or_else(|| Error::Undefined("missing job name".to_string()))
    }
    fn title(&self) -> Option<String> {
        None
    }
    fn job_type(&self) -> String {
        self.kind.clone()
    }
    fn is_done(&self) -> bool {
        self.done
    }
    fn is_error(&self) -> bool {
        self.error
    }
    fn is_failure(&self) -> bool {
        self.failure
    }
    fn is_success(&self) -> bool {
        self.success
    }
    fn is_queued(&self) -> bool {
        self.queued
    }
    fn has_messages(&self) -> bool {
        self.messages
    }
    fn has_artefacts(&self) -> bool {
        self.artefacts
    }
    fn status(&self) -> String {
        self.state.clone()
    }
}

/// Concrete feed page for paginator and adapter tests
#[derive(Debug, Clone)]
pub(crate) struct FakePage {
    pub index: usize,
    pub items: Vec<Value>,
    pub next: bool,
    pub future: bool,
}

impl FakePage {
    pub fn with_messages(texts: &[&str]) -> Self {
        Self::with_items(texts.iter().map(|t| json!({ "message": t })).collect())
    }

    pub fn with_items(items: Vec<Value>) -> Self {
        Self {
            index: 0,
            items,
            next: false,
            future: false,
        }
    }

    /// Mark a next page as already linked
    pub fn linked(mut self) -> Self {
        self.next = true;
        self
    }

    /// Mark the feed as possibly still growing
    pub fn live(mut self) -> Self {
        self.future = true;
        self
    }

    pub fn as_page(&self) -> Arc<dyn StaticPage> {
        to_page(Some(Arc::new(self.clone()) as Arc<dyn ClientPage>)).expect("adapted page")
    }

    pub fn as_stream(&self) -> Arc<dyn StaticPageStream> {
        to_stream(Some(Arc::new(self.clone()) as Arc<dyn ClientMessageStream>))
            .expect("adapted stream")
    }
}

impl ClientPage for FakePage {
    fn has_next(&self) -> bool {
        self.next
    }
    fn item_iterator(&self) -> Result<PageItems> {
        Ok(PageItems::new(self.items.clone()))
    }
    fn item_count(&self) -> Result<i64> {
        Ok(self.items.len() as i64)
    }
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ClientMessageStream for FakePage {
    fn has_future(&self) -> bool {
        self.future
    }
}

/// A scripted sequence of feed pages, followable by index
///
/// The next-page follower recovers the concrete [`FakePage`] through the
/// adapter's unwrap escape hatch, exactly the way production followers read
/// a concrete page's next link.
#[derive(Clone)]
pub(crate) struct ScriptedFeed {
    pages: Arc<Vec<FakePage>>,
    future_polls_before_arrival: usize,
    future_polls: Arc<AtomicUsize>,
}

impl ScriptedFeed {
    pub fn new(pages: Vec<FakePage>) -> Self {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(index, mut page)| {
                page.index = index;
                page
            })
            .collect();
        Self {
            pages: Arc::new(pages),
            future_polls_before_arrival: 0,
            future_polls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Have the future-page fetch return nothing for the first `polls` polls
    pub fn with_future_delay(mut self, polls: usize) -> Self {
        self.future_polls_before_arrival = polls;
        self
    }

    pub fn first_stream(&self) -> Option<Arc<dyn ClientMessageStream>> {
        self.pages
            .first()
            .map(|page| Arc::new(page.clone()) as Arc<dyn ClientMessageStream>)
    }

    pub fn follow_next(
        &self,
        current: Arc<dyn StaticPage>,
    ) -> Result<Option<Arc<dyn StaticPage>>> {
        let page = unwrap_page(current)
            .downcast::<FakePage>()
            .map_err(|_| Error::Marshalling("unexpected page type".to_string()))?;
        Ok(self.pages.get(page.index + 1).map(|next| next.as_page()))
    }

    pub fn follow_future(
        &self,
        current: Arc<dyn StaticPageStream>,
    ) -> Result<Option<Arc<dyn StaticPageStream>>> {
        let page = unwrap_stream(current)
            .downcast::<FakePage>()
            .map_err(|_| Error::Marshalling("unexpected stream type".to_string()))?;
        let polls = self.future_polls.fetch_add(1, Ordering::SeqCst) + 1;
        if polls <= self.future_polls_before_arrival {
            return Ok(None);
        }
        Ok(self.pages.get(page.index + 1).map(|next| next.as_stream()))
    }

    pub fn fetchers(&self) -> (FirstPageFetcher, NextPageFetcher, FutureStreamFetcher) {
        let first_feed = self.clone();
        let first: FirstPageFetcher = Arc::new(move || {
            let feed = first_feed.clone();
            Box::pin(async move { Ok(to_stream(feed.first_stream())) })
        });
        let next_feed = self.clone();
        let next: NextPageFetcher = Arc::new(move |current| {
            let feed = next_feed.clone();
            Box::pin(async move { feed.follow_next(current) })
        });
        let future_feed = self.clone();
        let future: FutureStreamFetcher = Arc::new(move |current| {
            let feed = future_feed.clone();
            Box::pin(async move { feed.follow_future(current) })
        });
        (first, next, future)
    }

    pub async fn paginator(
        &self,
        cancel: &CancellationToken,
        run_out_grace_period: Duration,
        backoff_period: Duration,
    ) -> Result<StreamPaginator> {
        let (first, next, future) = self.fetchers();
        StreamPaginator::new(
            cancel,
            run_out_grace_period,
            backoff_period,
            first,
            next,
            future,
        )
        .await
    }
}

/// Scripted remote collaborator: a sequence of job status snapshots (the
/// last one repeats) plus a scripted message feed
pub(crate) struct ScriptedClient {
    statuses: Mutex<VecDeque<MockJob>>,
    current: Mutex<Option<MockJob>>,
    feed: ScriptedFeed,
    status_fetches: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(statuses: Vec<MockJob>, feed: ScriptedFeed) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            current: Mutex::new(None),
            feed,
            status_fetches: AtomicUsize::new(0),
        }
    }

    pub fn status_fetch_count(&self) -> usize {
        self.status_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobClient for ScriptedClient {
    async fn fetch_job_status(&self, _job_name: &str) -> ApiOutcome<Arc<dyn AsynchronousJob>> {
        self.status_fetches.fetch_add(1, Ordering::SeqCst);
        let popped = self.statuses.lock().expect("statuses lock").pop_front();
        let mut current = self.current.lock().expect("current lock");
        if let Some(next) = popped {
            *current = Some(next);
        }
        let job = current.clone().expect("script holds at least one status");
        Ok((
            Arc::new(job) as Arc<dyn AsynchronousJob>,
            ApiResponse::new(200),
        ))
    }

    async fn fetch_first_message_page(
        &self,
        _job_name: &str,
    ) -> ApiOutcome<Option<Arc<dyn ClientMessageStream>>> {
        Ok((self.feed.first_stream(), ApiResponse::new(200)))
    }

    async fn fetch_next_message_page(
        &self,
        current: Arc<dyn StaticPage>,
    ) -> Result<Option<Arc<dyn StaticPage>>> {
        self.feed.follow_next(current)
    }

    async fn fetch_future_message_stream(
        &self,
        current: Arc<dyn StaticPageStream>,
    ) -> Result<Option<Arc<dyn StaticPageStream>>> {
        self.feed.follow_future(current)
    }
}

/// Sink collecting written lines for assertions
#[derive(Default)]
pub(crate) struct CollectingSink {
    lines: Mutex<Vec<String>>,
    source: Mutex<Option<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("lines lock").clone()
    }

    pub fn source(&self) -> Option<String> {
        self.source.lock().expect("source lock").clone()
    }
}

impl MessageSink for CollectingSink {
    fn write_line(&self, line: &str) {
        self.lines.lock().expect("lines lock").push(line.to_string());
    }

    fn set_source(&self, source: &str) {
        *self.source.lock().expect("source lock") = Some(source.to_string());
    }
}
