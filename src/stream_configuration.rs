//! Configuration types for pipestream operations

use serde::{Deserialize, Serialize};

/// Configuration attached to a [`crate::pipeline::Pipeline`] handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    /// Log every stage as it is attached and when the pipeline drains
    pub log_stages: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-pipeline".to_string(),
            log_stages: false,
        }
    }
}

/// File configuration for the file sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    /// Cut the target down to the write cursor on normal close
    pub truncate_on_close: bool,
    /// Call `sync_all` before the handle is released
    pub sync_on_close: bool,
    /// Create the target when it does not exist yet
    pub create: bool,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            truncate_on_close: true,
            sync_on_close: false,
            create: true,
        }
    }
}

/// Queuing strategy for push sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of items a producer may enqueue before it has to wait
    pub high_water_mark: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { high_water_mark: 16 }
    }
}
