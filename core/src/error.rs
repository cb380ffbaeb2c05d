//! Error types for openpose-onnx.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for openpose-onnx operations.
pub type Result<T> = std::result::Result<T, PoseError>;

/// Errors that can occur while loading or running a pose model.
#[derive(Debug, Error)]
pub enum PoseError {
    /// The runtime refused to build a session for the model.
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    /// A forward pass failed inside the runtime.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Invalid tensor.
    #[error("Invalid tensor: {0}")]
    Tensor(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The model descriptor is missing fields or describes an unsupported model.
    #[error("Invalid model metadata: {0}")]
    Metadata(String),

    /// An operation needed a loaded model but the handle holds none.
    #[error("Model is not loaded")]
    NotLoaded,

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by ONNX Runtime outside of session creation or a forward pass.
    #[error("ONNX Runtime error: {0}")]
    Runtime(#[from] ort::Error),

    /// File not found.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl PoseError {
    /// Create a model load error.
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create an inference error.
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a tensor error.
    pub fn tensor(msg: impl Into<String>) -> Self {
        Self::Tensor(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a metadata error.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }
}
