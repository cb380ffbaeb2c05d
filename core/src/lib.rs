//! openpose-onnx: load, run and release Lightweight OpenPose models exported to ONNX.
//!
//! All numerical work happens inside ONNX Runtime (through the `ort` crate). This
//! crate owns the lifecycle around it: building the runtime environment and
//! session options, opening a model directory, running forward passes into
//! caller-owned tensors, and releasing everything again.
//!
//! # Example
//!
//! ```ignore
//! use openpose_onnx::{ModelHandle, TensorVector};
//!
//! // A failed load is not an error: the handle is simply unloaded.
//! let mut model = ModelHandle::load("data/pose_estimation/lightweight_open_pose/optimized_model");
//! if !model.is_loaded() {
//!     return Ok(());
//! }
//!
//! let input = model.random_input(&mut rand::thread_rng())?;
//! let mut outputs = TensorVector::new();
//! let summary = model.forward(&input, &mut outputs)?;
//! println!("Got {} outputs in {:.2}ms", summary.num_outputs, summary.latency_ms);
//!
//! // Optional: dropping the handle does the same.
//! model.free();
//! ```
//!
//! # Model layout
//!
//! A model path is either an `.onnx` file or a directory `D` holding
//! `D/<name of D>.json`, whose `model_paths[0]` names the ONNX graph.
//!
//! ONNX Runtime binaries are fetched at build time by `ort`'s
//! `download-binaries` feature.

pub mod config;
pub mod error;
pub mod inference;
pub mod tensor;

// Re-export commonly used types
pub use config::{Config, OptimizationLevel, SessionConfig};
pub use error::{PoseError, Result};
pub use inference::{ForwardSummary, LoadedModel, ModelHandle, ModelRunner};
pub use tensor::{Tensor, TensorVector};
