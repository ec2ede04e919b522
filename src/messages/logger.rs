//! Message logger: drains a paginator and writes formatted lines to a sink
//!
//! Two orthogonal delivery axes are supported, all four combinations sharing
//! the same drain loop:
//! - **synchronous vs asynchronous** — asynchronous delivery buffers lines in
//!   a bounded queue serviced by a private delivery task, so producers never
//!   block on a slow sink (lines are dropped with a diagnostic when the
//!   queue overflows)
//! - **immediate vs periodic** — periodic delivery enforces a minimum
//!   spacing between writes by sleeping the remainder of the period

use crate::concurrency::check_cancelled;
use crate::error::{Error, Result};
use crate::messages::format::{FormatterOptions, MessageFormatter};
use crate::pagination::StreamPaginator;
use crate::types::{JobMessage, decode_stream_item};
use serde_json::Value;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default minimum spacing between message prints
pub const DEFAULT_PRINT_PERIOD: Duration = Duration::from_millis(100);

/// Default capacity of the asynchronous delivery queue
pub const DEFAULT_MESSAGE_BUFFER_SIZE: usize = 200;

/// Destination for formatted message lines
pub trait MessageSink: Send + Sync + 'static {
    /// Write one formatted line
    fn write_line(&self, line: &str);

    /// Label subsequent lines with a source identifier
    fn set_source(&self, source: &str);
}

/// Sink writing lines through `tracing`
#[derive(Default)]
pub struct TracingSink {
    source: StdMutex<Option<String>>,
}

impl TracingSink {
    /// Create a sink with no source label
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageSink for TracingSink {
    fn write_line(&self, line: &str) {
        let source = self.source.lock().ok().and_then(|s| s.clone());
        match source {
            Some(source) => tracing::info!(source = %source, "{line}"),
            None => tracing::info!("{line}"),
        }
    }

    fn set_source(&self, source: &str) {
        if let Ok(mut guard) = self.source.lock() {
            *guard = Some(source.to_string());
        }
    }
}

/// Delivery configuration for a message logger
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    /// Buffer writes in a queue serviced by a private delivery task
    pub asynchronous: bool,
    /// Minimum spacing between writes; `None` delivers immediately
    pub print_period: Option<Duration>,
    /// Capacity of the asynchronous delivery queue
    pub buffer_size: usize,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            asynchronous: true,
            print_period: Some(DEFAULT_PRINT_PERIOD),
            buffer_size: DEFAULT_MESSAGE_BUFFER_SIZE,
        }
    }
}

impl LoggerOptions {
    /// Synchronous, immediate delivery
    pub fn synchronous() -> Self {
        Self {
            asynchronous: false,
            print_period: None,
            buffer_size: DEFAULT_MESSAGE_BUFFER_SIZE,
        }
    }
}

/// The underlying line writer behind a [`MessageLogger`]
enum MessageWriter {
    /// Writes in the caller's task, optionally spacing writes out
    Direct {
        sink: Arc<dyn MessageSink>,
        print_period: Option<Duration>,
        last_write: Mutex<Option<Instant>>,
    },
    /// Hands lines to a private delivery task over a bounded queue
    Buffered {
        tx: StdMutex<Option<mpsc::Sender<String>>>,
        task: Mutex<Option<JoinHandle<()>>>,
    },
}

impl MessageWriter {
    fn new(sink: Arc<dyn MessageSink>, options: &LoggerOptions) -> Self {
        if !options.asynchronous {
            return MessageWriter::Direct {
                sink,
                print_period: options.print_period,
                last_write: Mutex::new(None),
            };
        }
        let (tx, mut rx) = mpsc::channel::<String>(options.buffer_size.max(1));
        let print_period = options.print_period;
        let task = tokio::spawn(async move {
            let mut last_write: Option<Instant> = None;
            while let Some(line) = rx.recv().await {
                if let Some(period) = print_period
                    && let Some(last) = last_write
                {
                    let elapsed = last.elapsed();
                    if elapsed < period {
                        tokio::time::sleep(period - elapsed).await;
                    }
                }
                sink.write_line(&line);
                last_write = Some(Instant::now());
            }
        });
        MessageWriter::Buffered {
            tx: StdMutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        }
    }

    async fn write(&self, line: String) {
        match self {
            MessageWriter::Direct {
                sink,
                print_period,
                last_write,
            } => {
                let mut last = last_write.lock().await;
                if let Some(period) = print_period
                    && let Some(previous) = *last
                {
                    let elapsed = previous.elapsed();
                    if elapsed < *period {
                        tokio::time::sleep(*period - elapsed).await;
                    }
                }
                sink.write_line(&line);
                *last = Some(Instant::now());
            }
            MessageWriter::Buffered { tx, .. } => {
                let sender = tx.lock().ok().and_then(|guard| guard.clone());
                let Some(sender) = sender else {
                    tracing::warn!("message writer already closed, dropping line");
                    return;
                };
                // diode semantics: a slow sink drops lines, it never blocks
                // the producer
                if let Err(e) = sender.try_send(line) {
                    tracing::warn!(error = %e, "message delivery queue full, dropping line");
                }
            }
        }
    }

    /// Flush and release the writer; safe to call once
    async fn close(&self) {
        if let MessageWriter::Buffered { tx, task } = self {
            if let Ok(mut guard) = tx.lock() {
                guard.take();
            }
            let handle = task.lock().await.take();
            if let Some(handle) = handle
                && let Err(e) = handle.await
            {
                tracing::warn!(error = %e, "message delivery task ended abnormally");
            }
        }
    }
}

/// Logger dedicated to printing job messages
///
/// Formatting and marshalling problems on individual messages are recovered
/// locally (logged as diagnostics) and never stop the drain loop; page-fetch
/// failures and cancellation propagate immediately.
pub struct MessageLogger {
    formatter: MessageFormatter,
    sink: Arc<dyn MessageSink>,
    writer: MessageWriter,
}

impl MessageLogger {
    /// Create a logger writing through `sink` with the given delivery options
    pub fn new(
        sink: Arc<dyn MessageSink>,
        formatter_options: FormatterOptions,
        options: LoggerOptions,
    ) -> Self {
        Self {
            formatter: MessageFormatter::new(formatter_options),
            writer: MessageWriter::new(sink.clone(), &options),
            sink,
        }
    }

    /// Label subsequent lines with a source identifier
    pub fn set_source(&self, source: &str) {
        self.sink.set_source(source);
    }

    /// Format and write one message
    pub async fn log_message(&self, msg: &dyn JobMessage) {
        let line = self.formatter.format(msg);
        self.writer.write(line).await;
    }

    /// Record that an empty/missing message was encountered in the stream
    pub fn log_empty_message_error(&self) {
        tracing::error!(error = %Error::Empty("message".to_string()), "empty message");
    }

    /// Record that a stream item could not be interpreted as a known
    /// message shape; an item with no content at all is reported as empty
    /// instead
    pub fn log_marshalling_error(&self, raw: &Value) {
        if raw.is_null() || raw.as_object().is_some_and(|o| o.is_empty()) {
            self.log_empty_message_error();
        } else {
            tracing::error!(item = %raw, "message could not be marshalled");
        }
    }

    /// Report an operation error through the raw diagnostic sink
    pub fn log_error(&self, error: &Error, context: &str) {
        tracing::error!(error = %error, "{context}");
    }

    /// Drain the paginator until exhaustion or cancellation, logging each item
    ///
    /// Cancellation is checked between items and propagates immediately;
    /// per-item decode problems are logged and skipped.
    pub async fn log_messages_collection(
        &self,
        cancel: &CancellationToken,
        paginator: &StreamPaginator,
    ) -> Result<()> {
        loop {
            check_cancelled(cancel, "message collection drain")?;
            let Some(item) = paginator.next().await? else {
                return Ok(());
            };
            match decode_stream_item(&item) {
                Ok(message) => self.log_message(&message).await,
                Err(Error::Empty(_)) => self.log_empty_message_error(),
                Err(Error::Marshalling(_)) => self.log_marshalling_error(&item),
                Err(other) => return Err(other),
            }
        }
    }

    /// Flush and release the underlying writer; safe to call once
    pub async fn close(&self) {
        self.writer.close().await;
    }
}

/// Factory producing one [`MessageLogger`] per watch invocation
#[derive(Clone)]
pub struct MessageLoggerFactory {
    sink: Arc<dyn MessageSink>,
    formatter_options: FormatterOptions,
    options: LoggerOptions,
}

impl MessageLoggerFactory {
    /// Create a factory writing through `sink`
    pub fn new(
        sink: Arc<dyn MessageSink>,
        formatter_options: FormatterOptions,
        options: LoggerOptions,
    ) -> Self {
        Self {
            sink,
            formatter_options,
            options,
        }
    }

    /// Create a logger (and its delivery task, when asynchronous)
    pub fn create(&self) -> MessageLogger {
        MessageLogger::new(
            self.sink.clone(),
            self.formatter_options,
            self.options.clone(),
        )
    }
}
