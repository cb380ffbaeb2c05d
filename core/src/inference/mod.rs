//! Model inference module.
//!
//! This module wraps ONNX Runtime sessions for pose models: the process-wide
//! environment, per-session options, model descriptors and the load/forward/free
//! lifecycle.

mod metadata;
mod model;
mod session;

pub use metadata::{InferenceParams, ModelMetadata};
pub use model::{ForwardSummary, LoadedModel, ModelHandle, ModelRunner};
pub use session::{Environment, SessionOptions};
