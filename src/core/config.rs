use serde::{Deserialize, Serialize};

use crate::core::errors::{PiplError, Result};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of channels waiting in the ready queue
    pub ready_queue_capacity: usize,
    /// Abort a run after this many synchronization steps (None = run until drained)
    pub max_steps: Option<u64>,
    /// Emit one log line per synchronization
    pub trace_synchronizations: bool,
    /// Drop finished replicas and recycle their reference cells
    pub reclaim_replicas: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ready_queue_capacity: 1_000_000,
            max_steps: None,
            trace_synchronizations: true,
            reclaim_replicas: true,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for EngineConfig
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Parse a YAML document; missing fields take their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ready_queue_capacity == 0 {
            return Err(PiplError::configuration(
                "ready_queue_capacity must be greater than 0",
            ));
        }
        if self.max_steps == Some(0) {
            return Err(PiplError::configuration(
                "max_steps must be greater than 0 when set",
            ));
        }
        Ok(())
    }

    /// Small limits that turn runaway graphs into errors quickly
    pub fn development() -> Self {
        Self {
            ready_queue_capacity: 10_000,
            max_steps: Some(100_000),
            ..Default::default()
        }
    }

    /// Default queue with a hard step guard
    pub fn bounded(max_steps: u64) -> Self {
        Self {
            max_steps: Some(max_steps),
            ..Default::default()
        }
    }
}

/// Builder for EngineConfig
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set ready queue capacity
    pub fn ready_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.ready_queue_capacity = capacity;
        self
    }

    /// Set the step guard
    pub fn max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    /// Enable/disable the per-synchronization log line
    pub fn trace_synchronizations(mut self, enabled: bool) -> Self {
        self.config.trace_synchronizations = enabled;
        self
    }

    /// Enable/disable replica reclamation
    pub fn reclaim_replicas(mut self, enabled: bool) -> Self {
        self.config.reclaim_replicas = enabled;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
