//! Runtime configuration.
//!
//! Built once at startup and shared read-only. Every value has a default, so
//! an empty environment yields a working local configuration.
//!
//! # Environment
//!
//! | Variable | Default |
//! |---|---|
//! | `URL_REVIEW_WORKFLOW_DEFINITION` | unset (no workflows start) |
//! | `URL_REVIEW_ERROR_QUEUE` | `url-review-errors` |
//! | `URL_REVIEW_DEAD_LETTER_QUEUE` | `url-review-dlq` |
//! | `URL_REVIEW_VALIDATION_ERROR_QUEUE` | `url-review-validation-errors` |
//! | `URL_REVIEW_NOTIFICATION_TOPIC` | `url-review-status` |
//! | `URL_REVIEW_DEDUPE_VARIANT_URLS` | `true` |
//! | `URL_REVIEW_POLL_INTERVAL_MINS` | `15` |
//! | `URL_REVIEW_POLL_BATCH_SIZE` | `10` |
//! | `URL_REVIEW_LISTEN_ADDR` | `0.0.0.0:3000` |
//!
//! Unparseable values fall back to the default.

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::governor::RetryLimits;
use crate::types::{QueueName, WorkflowDefinition};

const ENV_PREFIX: &str = "URL_REVIEW_";

const DEFAULT_ERROR_QUEUE: &str = "url-review-errors";
const DEFAULT_DEAD_LETTER_QUEUE: &str = "url-review-dlq";
const DEFAULT_VALIDATION_ERROR_QUEUE: &str = "url-review-validation-errors";
const DEFAULT_NOTIFICATION_TOPIC: &str = "url-review-status";

/// Redrive polls run no more often than this.
const DEFAULT_POLL_INTERVAL_MINS: u64 = 15;

/// Messages received per poll.
const DEFAULT_POLL_BATCH_SIZE: usize = 10;

const DEFAULT_LISTEN_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3000);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Review workflow to start. Without one, START decisions are metered
    /// and skipped.
    pub workflow_definition: Option<WorkflowDefinition>,

    /// Where retryable failures are forwarded for redelivery.
    pub error_queue: QueueName,

    /// Redriven by the governor alongside `error_queue`.
    pub dead_letter_queue: QueueName,

    pub validation_error_queue: QueueName,

    pub notification_topic: String,

    /// Gates variant deduplication and the canonical-URL fallbacks on the
    /// submission and appeal pathways.
    pub dedupe_variant_urls: bool,

    pub retry_limits: RetryLimits,

    pub poll_interval: Duration,

    pub poll_batch_size: usize,

    pub listen_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk form. Missing fields take the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    workflow_definition: Option<String>,
    error_queue: Option<String>,
    dead_letter_queue: Option<String>,
    validation_error_queue: Option<String>,
    notification_topic: Option<String>,
    dedupe_variant_urls: Option<bool>,
    poll_interval_mins: Option<u64>,
    poll_batch_size: Option<usize>,
    listen_addr: Option<SocketAddr>,
}

impl Config {
    pub fn new() -> Self {
        Config {
            workflow_definition: None,
            error_queue: QueueName::new(DEFAULT_ERROR_QUEUE),
            dead_letter_queue: QueueName::new(DEFAULT_DEAD_LETTER_QUEUE),
            validation_error_queue: QueueName::new(DEFAULT_VALIDATION_ERROR_QUEUE),
            notification_topic: DEFAULT_NOTIFICATION_TOPIC.to_string(),
            dedupe_variant_urls: true,
            retry_limits: RetryLimits::FIXED,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_MINS * 60),
            poll_batch_size: DEFAULT_POLL_BATCH_SIZE,
            listen_addr: SocketAddr::from(DEFAULT_LISTEN_ADDR),
        }
    }

    /// Reads `URL_REVIEW_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source. `lookup` receives
    /// the full prefixed variable name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let defaults = Self::new();

        Config {
            workflow_definition: var("WORKFLOW_DEFINITION")
                .filter(|s| !s.trim().is_empty())
                .map(WorkflowDefinition::new),
            error_queue: var("ERROR_QUEUE").map_or(defaults.error_queue, QueueName::new),
            dead_letter_queue: var("DEAD_LETTER_QUEUE")
                .map_or(defaults.dead_letter_queue, QueueName::new),
            validation_error_queue: var("VALIDATION_ERROR_QUEUE")
                .map_or(defaults.validation_error_queue, QueueName::new),
            notification_topic: var("NOTIFICATION_TOPIC").unwrap_or(defaults.notification_topic),
            dedupe_variant_urls: var("DEDUPE_VARIANT_URLS")
                .and_then(|s| parse_trimmed(&s))
                .unwrap_or(defaults.dedupe_variant_urls),
            retry_limits: RetryLimits::FIXED,
            poll_interval: var("POLL_INTERVAL_MINS")
                .and_then(|s| parse_trimmed::<u64>(&s))
                .map_or(defaults.poll_interval, |mins| Duration::from_secs(mins * 60)),
            poll_batch_size: var("POLL_BATCH_SIZE")
                .and_then(|s| parse_trimmed::<usize>(&s))
                .filter(|n| *n > 0)
                .unwrap_or(defaults.poll_batch_size),
            listen_addr: var("LISTEN_ADDR")
                .and_then(|s| parse_trimmed(&s))
                .unwrap_or(defaults.listen_addr),
        }
    }

    /// Reads a JSON config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid config document.
    /// Unlike the environment, a bad file is an error rather than a silent
    /// fallback.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&contents)?;
        let defaults = Self::new();

        Ok(Config {
            workflow_definition: file.workflow_definition.map(WorkflowDefinition::new),
            error_queue: file.error_queue.map_or(defaults.error_queue, QueueName::new),
            dead_letter_queue: file
                .dead_letter_queue
                .map_or(defaults.dead_letter_queue, QueueName::new),
            validation_error_queue: file
                .validation_error_queue
                .map_or(defaults.validation_error_queue, QueueName::new),
            notification_topic: file
                .notification_topic
                .unwrap_or(defaults.notification_topic),
            dedupe_variant_urls: file
                .dedupe_variant_urls
                .unwrap_or(defaults.dedupe_variant_urls),
            retry_limits: RetryLimits::FIXED,
            poll_interval: file
                .poll_interval_mins
                .map_or(defaults.poll_interval, |mins| Duration::from_secs(mins * 60)),
            poll_batch_size: file
                .poll_batch_size
                .filter(|n| *n > 0)
                .unwrap_or(defaults.poll_batch_size),
            listen_addr: file.listen_addr.unwrap_or(defaults.listen_addr),
        })
    }

    /// The queues the governor redrives, in poll order.
    pub fn redrive_queues(&self) -> [&QueueName; 2] {
        [&self.error_queue, &self.dead_letter_queue]
    }
}

fn parse_trimmed<T: FromStr>(s: &str) -> Option<T> {
    s.trim().parse().ok()
}
