//! Message formatting and logging

mod format;
mod logger;

pub use format::{FormatterOptions, MessageFormatter, format_message};
pub use logger::{
    DEFAULT_MESSAGE_BUFFER_SIZE, DEFAULT_PRINT_PERIOD, LoggerOptions, MessageLogger,
    MessageLoggerFactory, MessageSink, TracingSink,
};
