//! Rendering of job messages into human-readable lines

use crate::types::JobMessage;

/// Which message fields the formatter includes
///
/// Selected at logger-construction time and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatterOptions {
    /// Include the message source as a `[source]` prefix
    pub source: bool,
    /// Include the creation time as a `(timestamp)` prefix
    pub timestamp: bool,
    /// Include the severity label
    pub severity: bool,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        Self {
            source: true,
            timestamp: true,
            severity: true,
        }
    }
}

impl FormatterOptions {
    /// Options with every segment disabled (text only)
    pub fn none() -> Self {
        Self {
            source: false,
            timestamp: false,
            severity: false,
        }
    }
}

/// Renders one message record into a single line
///
/// Layout, in order, each segment omitted when the field is absent or the
/// option disabled: `[source] (timestamp) SEVERITY: text`. When no prefix
/// segment is emitted the text stands alone, without the `": "` separator.
#[derive(Debug, Clone, Default)]
pub struct MessageFormatter {
    options: FormatterOptions,
}

impl MessageFormatter {
    /// Create a formatter with the given options
    pub fn new(options: FormatterOptions) -> Self {
        Self { options }
    }

    /// Render a message into a single line
    pub fn format(&self, msg: &dyn JobMessage) -> String {
        let mut prefix = String::new();
        if self.options.source
            && let Some(source) = msg.source()
        {
            prefix.push_str(&format!("[{source}] "));
        }
        if self.options.timestamp
            && let Some(ctime) = msg.ctime()
        {
            prefix.push_str(&format!("({}) ", ctime.to_rfc3339()));
        }
        if self.options.severity
            && let Some(severity) = msg.severity()
        {
            prefix.push_str(severity);
            prefix.push(' ');
        }

        let text = msg.text().unwrap_or_default();
        let mut line = prefix.trim_end().to_string();
        if line.is_empty() {
            line.push_str(text);
        } else if !text.is_empty() {
            line.push_str(": ");
            line.push_str(text);
        }
        line
    }
}

/// Format a message with all segments enabled
pub fn format_message(msg: &dyn JobMessage) -> String {
    MessageFormatter::default().format(msg)
}
