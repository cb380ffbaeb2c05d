//! Execution environment and session options for ONNX Runtime.
//!
//! ONNX Runtime keeps a single environment per process. [`Environment`] commits it
//! the first time one is acquired; later acquisitions share it.

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::config::{OptimizationLevel, SessionConfig};
use crate::error::{PoseError, Result};

/// Name of the committed process-wide environment, if any.
static COMMITTED: Mutex<Option<String>> = Mutex::new(None);

/// Handle to the process-wide ONNX Runtime environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    name: String,
}

impl Environment {
    /// Commit the runtime environment under `name`, or join the one already committed.
    ///
    /// The first name wins. Acquiring with a different name afterwards returns a
    /// handle to the existing environment.
    pub fn acquire(name: &str) -> Result<Self> {
        let mut committed = COMMITTED
            .lock()
            .map_err(|_| PoseError::model_load("runtime environment lock poisoned"))?;

        if let Some(existing) = committed.as_ref() {
            if existing != name {
                debug!(
                    "Runtime environment '{}' already committed; ignoring '{}'",
                    existing, name
                );
            }
            return Ok(Self {
                name: existing.clone(),
            });
        }

        ort::init().with_name(name).commit()?;
        info!("Committed ONNX Runtime environment '{}'", name);
        *committed = Some(name.to_string());

        Ok(Self {
            name: name.to_string(),
        })
    }

    /// Name the environment was committed with.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Options applied to every session built from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    config: SessionConfig,
}

impl SessionOptions {
    /// Wrap a session configuration.
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// The configuration these options were built from.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session builder with these options applied.
    pub fn builder(&self) -> Result<SessionBuilder> {
        let mut builder = Session::builder()?
            .with_optimization_level(graph_optimization_level(self.config.optimization_level))?;

        if let Some(threads) = self.config.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        if let Some(threads) = self.config.inter_threads {
            builder = builder.with_inter_threads(threads)?;
        }

        Ok(builder)
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

fn graph_optimization_level(level: OptimizationLevel) -> GraphOptimizationLevel {
    match level {
        OptimizationLevel::Disable => GraphOptimizationLevel::Disable,
        OptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        OptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        OptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimization_level_mapping() {
        assert!(matches!(
            graph_optimization_level(OptimizationLevel::Disable),
            GraphOptimizationLevel::Disable
        ));
        assert!(matches!(
            graph_optimization_level(OptimizationLevel::Level3),
            GraphOptimizationLevel::Level3
        ));
    }

    #[test]
    fn test_default_options() {
        let options = SessionOptions::default();
        assert_eq!(options.config().optimization_level, OptimizationLevel::Level2);
        assert_eq!(options.config().intra_threads, None);
    }
}
