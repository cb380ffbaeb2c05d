//! Configuration types for openpose-onnx.

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Model configuration.
    #[serde(default)]
    pub model: ModelConfig,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Model configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ModelConfig {
    /// Path to the model directory or `.onnx` file.
    #[serde(default)]
    pub path: Option<String>,
}

/// Graph optimization level applied when the session is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    /// No graph rewrites.
    Disable,
    /// Basic, semantics-preserving rewrites.
    Level1,
    /// Extended rewrites.
    #[default]
    Level2,
    /// Everything, including layout optimizations.
    Level3,
}

/// Options used to build the ONNX Runtime environment and session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Name registered for the process-wide runtime environment.
    #[serde(default = "default_environment_name")]
    pub environment_name: String,

    /// Graph optimization level.
    #[serde(default)]
    pub optimization_level: OptimizationLevel,

    /// Threads used inside a single operator. `None` lets the runtime decide.
    #[serde(default)]
    pub intra_threads: Option<usize>,

    /// Threads used across independent operators. `None` lets the runtime decide.
    #[serde(default)]
    pub inter_threads: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            environment_name: default_environment_name(),
            optimization_level: OptimizationLevel::default(),
            intra_threads: None,
            inter_threads: None,
        }
    }
}

fn default_environment_name() -> String {
    "openpose-onnx".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> crate::error::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.session.environment_name.trim().is_empty() {
            return Err(crate::error::PoseError::config(
                "session.environment_name must not be empty",
            ));
        }
        if self.session.intra_threads == Some(0) || self.session.inter_threads == Some(0) {
            return Err(crate::error::PoseError::config(
                "thread counts must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoseError;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert!(config.model.path.is_none());
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.session.optimization_level, OptimizationLevel::Level2);
    }

    #[test]
    fn test_session_section() {
        let yaml = r#"
model:
  path: data/pose_estimation/lightweight_open_pose/optimized_model
session:
  optimization_level: level3
  intra_threads: 2
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.model.path.as_deref(),
            Some("data/pose_estimation/lightweight_open_pose/optimized_model")
        );
        assert_eq!(config.session.optimization_level, OptimizationLevel::Level3);
        assert_eq!(config.session.intra_threads, Some(2));
        assert_eq!(config.session.inter_threads, None);
        assert_eq!(config.session.environment_name, "openpose-onnx");
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pose.yaml");
        std::fs::write(
            &path,
            "model:\n  path: models/optimized_model\nsession:\n  inter_threads: 2\n",
        )
        .unwrap();

        let config = Config::from_yaml_file(&path).unwrap();
        assert_eq!(config.model.path.as_deref(), Some("models/optimized_model"));
        assert_eq!(config.session.inter_threads, Some(2));
    }

    #[test]
    fn test_from_yaml_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_yaml_file(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, PoseError::Io(_)));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = Config::from_yaml_str("session:\n  inter_threads: 0\n").unwrap_err();
        assert!(matches!(err, PoseError::Config(_)));
    }

    #[test]
    fn test_unknown_level_rejected() {
        let err = Config::from_yaml_str("session:\n  optimization_level: turbo\n").unwrap_err();
        assert!(matches!(err, PoseError::Yaml(_)));
    }
}
