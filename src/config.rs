//! Configuration types for jobwatch

use crate::retry::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Watcher behavior configuration
///
/// Every knob has a sensible default; a zero-configuration watcher works
/// out of the box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Fixed delay between completion polls (default: 500ms)
    #[serde(default = "default_backoff_period", with = "duration_ms_serde")]
    pub backoff_period: Duration,

    /// How long a live feed is granted to produce a promised future page
    /// before being declared exhausted (default: 1 second)
    #[serde(default = "default_run_out_grace_period", with = "duration_ms_serde")]
    pub run_out_grace_period: Duration,

    /// Default deadline for watching a job to completion (default: 5 minutes)
    #[serde(default = "default_completion_timeout", with = "duration_ms_serde")]
    pub completion_timeout: Duration,

    /// Minimum spacing between message prints; `None` prints immediately
    /// (default: 100ms)
    #[serde(default = "default_print_period", with = "optional_duration_ms_serde")]
    pub message_print_period: Option<Duration>,

    /// Buffer message writes in a queue serviced by a private delivery task
    /// (default: true)
    #[serde(default = "default_true")]
    pub asynchronous_message_delivery: bool,

    /// Capacity of the asynchronous message delivery queue (default: 200)
    #[serde(default = "default_message_buffer_size")]
    pub message_buffer_size: usize,

    /// Backoff policy for state-wait retry loops
    #[serde(default)]
    pub state_backoff: BackoffPolicy,
}

fn default_backoff_period() -> Duration {
    Duration::from_millis(500)
}

fn default_run_out_grace_period() -> Duration {
    crate::pagination::DEFAULT_STREAM_EXHAUSTION_GRACE_PERIOD
}

fn default_completion_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_print_period() -> Option<Duration> {
    Some(crate::messages::DEFAULT_PRINT_PERIOD)
}

fn default_message_buffer_size() -> usize {
    crate::messages::DEFAULT_MESSAGE_BUFFER_SIZE
}

fn default_true() -> bool {
    true
}

impl WatcherConfig {
    /// Message delivery options derived from this configuration
    pub fn logger_options(&self) -> crate::messages::LoggerOptions {
        crate::messages::LoggerOptions {
            asynchronous: self.asynchronous_message_delivery,
            print_period: self.message_print_period,
            buffer_size: self.message_buffer_size,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backoff_period: default_backoff_period(),
            run_out_grace_period: default_run_out_grace_period(),
            completion_timeout: default_completion_timeout(),
            message_print_period: default_print_period(),
            asynchronous_message_delivery: true,
            message_buffer_size: default_message_buffer_size(),
            state_backoff: BackoffPolicy::default(),
        }
    }
}

// Duration serialization helpers (integer milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod optional_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
