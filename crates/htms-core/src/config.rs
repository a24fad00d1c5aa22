//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// What the resolver stage does when a task cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Replace the task with one that fails, rendering an error chunk.
    #[default]
    Graceful,
    /// End the stream with the resolution error.
    Fatal,
}

/// Options for one pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Render error details in failed task chunks.
    #[serde(default)]
    pub debug: bool,

    /// Resolution failure policy.
    #[serde(default)]
    pub resolution: ResolutionPolicy,
}

impl PipelineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug output.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the resolution failure policy.
    pub fn with_resolution(mut self, resolution: ResolutionPolicy) -> Self {
        self.resolution = resolution;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new();
        assert!(!config.debug);
        assert_eq!(config.resolution, ResolutionPolicy::Graceful);
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::new()
            .with_debug(true)
            .with_resolution(ResolutionPolicy::Fatal);
        assert!(config.debug);
        assert_eq!(config.resolution, ResolutionPolicy::Fatal);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PipelineConfig = serde_json::from_str(r#"{"resolution": "fatal"}"#).unwrap();
        assert!(!config.debug);
        assert_eq!(config.resolution, ResolutionPolicy::Fatal);
    }
}
