//! Configuration for queues and the console harness
//!
//! All structs deserialize from TOML with every field optional:
//!
//! ```toml
//! map_limit = 7
//! times_count = 1000
//!
//! [queue]
//! name = "ingest"
//! limit = 10
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SluiceError, SluiceResult};

fn default_queue_name() -> String {
    "job_queue".to_string()
}
fn default_limit() -> usize {
    4
}
fn default_event_capacity() -> usize {
    64
}

/// Settings for a single job queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Name used in log records
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Maximum number of jobs running at once
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Buffer size of the event stream; slow subscribers past this lag and lose events
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            limit: default_limit(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl QueueConfig {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn validate(&self) -> SluiceResult<()> {
        if self.limit == 0 {
            return Err(SluiceError::InvalidLimit { limit: self.limit });
        }
        if self.event_capacity == 0 {
            return Err(SluiceError::config("event_capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Settings for the demonstration scenarios run by the console harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub queue: QueueConfig,
    /// Number of jobs pushed through the queue scenario
    pub queue_jobs: usize,
    /// Length of the source sequence for the map scenario
    pub map_len: usize,
    pub map_limit: usize,
    pub times_count: usize,
    pub times_limit: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::new(10),
            queue_jobs: 50,
            map_len: 100,
            map_limit: 7,
            times_count: 1000,
            times_limit: 10,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> SluiceResult<()> {
        self.queue.validate()?;
        for limit in [self.map_limit, self.times_limit] {
            if limit == 0 {
                return Err(SluiceError::InvalidLimit { limit });
            }
        }
        Ok(())
    }
}

/// Load harness configuration from a TOML file.
///
/// Returns the defaults if the file doesn't exist.
pub fn load_from_file(path: &Path) -> SluiceResult<HarnessConfig> {
    if !path.exists() {
        return Ok(HarnessConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        SluiceError::config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let config: HarnessConfig = toml::from_str(&content).map_err(|e| {
        SluiceError::config(format!(
            "Failed to parse TOML config '{}': {}",
            path.display(),
            e
        ))
    })?;
    config.validate()?;

    Ok(config)
}
