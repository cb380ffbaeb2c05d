//! Loading, running and releasing pose models.
//!
//! [`LoadedModel`] owns a live session together with the environment and options it
//! was built from. [`ModelHandle`] is the soft-failing wrapper: a load that cannot
//! find or open the model yields [`ModelHandle::Unloaded`] instead of an error.

use ort::session::{Session, SessionInputs};
use ort::tensor::TensorElementType;
use ort::value::{TensorRef, ValueType};
use rand::Rng;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::metadata::ModelMetadata;
use super::session::{Environment, SessionOptions};
use crate::config::{Config, SessionConfig};
use crate::error::{PoseError, Result};
use crate::tensor::{Tensor, TensorVector};

/// Outcome of a single forward pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardSummary {
    /// Number of tensors written to the output vector.
    pub num_outputs: usize,
    /// Wall-clock time spent inside the runtime, in milliseconds.
    pub latency_ms: f64,
}

/// A model with a live inference session.
///
/// # Example
///
/// ```ignore
/// use openpose_onnx::{LoadedModel, SessionConfig, TensorVector};
///
/// let mut model = LoadedModel::load("data/optimized_model", &SessionConfig::default())?;
/// let input = model.random_input(&mut rand::thread_rng());
/// let mut outputs = TensorVector::new();
/// model.forward(&input, &mut outputs)?;
/// assert_eq!(outputs.len(), model.output_size());
/// ```
pub struct LoadedModel {
    session: Session,
    environment: Environment,
    options: SessionOptions,
    output_size: usize,
    input_name: String,
    output_names: Vec<String>,
    metadata: ModelMetadata,
    model_path: PathBuf,
}

impl LoadedModel {
    /// Load a model from a model directory or an `.onnx` file.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::FileNotFound`] when `path` (or the graph it points to)
    /// does not exist, [`PoseError::Metadata`] or [`PoseError::Json`] for a bad
    /// descriptor, and [`PoseError::ModelLoad`] when the runtime rejects the graph.
    pub fn load(path: impl AsRef<Path>, config: &SessionConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PoseError::FileNotFound(path.to_path_buf()));
        }

        let (metadata, model_path) = resolve_model(path)?;
        if !model_path.is_file() {
            return Err(PoseError::FileNotFound(model_path));
        }

        let environment = Environment::acquire(&config.environment_name)?;
        let options = SessionOptions::new(config.clone());
        let session = options.builder()?.commit_from_file(&model_path).map_err(|e| {
            PoseError::model_load(format!(
                "Failed to load {}: {}",
                model_path.display(),
                e
            ))
        })?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| PoseError::model_load("model declares no inputs"))?;
        if !is_f32_tensor(&input.input_type) {
            return Err(PoseError::model_load(format!(
                "input '{}' of {} is {:?}, expected an f32 tensor",
                input.name,
                model_path.display(),
                input.input_type
            )));
        }
        let input_name = input.name.clone();
        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();
        if output_names.is_empty() {
            return Err(PoseError::model_load("model declares no outputs"));
        }

        let output_size = output_names.len();
        if let Some(declared) = metadata.inference_params.output_size {
            if declared != output_size {
                warn!(
                    "Descriptor declares {} outputs but {} has {}; using the session count",
                    declared,
                    model_path.display(),
                    output_size
                );
            }
        }

        info!(
            "Loaded model {} ({} input '{}', {} outputs)",
            model_path.display(),
            session.inputs.len(),
            input_name,
            output_size
        );

        Ok(Self {
            session,
            environment,
            options,
            output_size,
            input_name,
            output_names,
            metadata,
            model_path,
        })
    }

    /// The inference session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The runtime environment the session was built in.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The options the session was built with.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Number of outputs each forward pass produces.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Name of the input the forward pass feeds.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Output names in the order they are written to the output vector.
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// The parsed model descriptor.
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Path of the ONNX graph the session was built from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Create a random input matching the descriptor's input geometry.
    pub fn random_input<R: Rng + ?Sized>(&self, rng: &mut R) -> Tensor {
        Tensor::random(&self.metadata.inference_params.input_shape(), rng)
    }

    /// Run one forward pass, replacing the contents of `output`.
    ///
    /// On error `output` is left empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, the runtime rejects it, or an output
    /// is not an `f32` tensor.
    pub fn forward(&mut self, input: &Tensor, output: &mut TensorVector) -> Result<ForwardSummary> {
        output.clear();
        let result = self.run_into(input, output);
        if result.is_err() {
            output.clear();
        }
        result
    }

    fn run_into(&mut self, input: &Tensor, output: &mut TensorVector) -> Result<ForwardSummary> {
        if input.is_empty() {
            return Err(PoseError::tensor("input tensor is empty"));
        }

        let dims: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        // Ensure data is contiguous
        let contiguous = input.data().as_standard_layout();
        let data = contiguous
            .as_slice()
            .ok_or_else(|| PoseError::tensor("input tensor is not contiguous"))?;
        let tensor_ref = TensorRef::from_array_view((dims, data))
            .map_err(|e| PoseError::tensor(format!("Failed to create input tensor: {}", e)))?;

        let inputs: SessionInputs<'_, '_, 0> = SessionInputs::ValueMap(vec![(
            Cow::Borrowed(self.input_name.as_str()),
            tensor_ref.into(),
        )]);

        let start = Instant::now();
        let outputs = self.session.run(inputs).map_err(|e| {
            PoseError::inference(format!(
                "input '{}' with shape {:?}: {}",
                self.input_name,
                input.shape(),
                e
            ))
        })?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        output.reserve(self.output_names.len());
        for name in &self.output_names {
            let (shape, values) = outputs[name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    PoseError::tensor(format!("Output '{}' is not an f32 tensor: {}", name, e))
                })?;
            let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
            output.push(Tensor::from_shape_vec(&shape, values.to_vec())?);
        }

        debug!(
            "Forward pass produced {} outputs in {:.2}ms",
            output.len(),
            latency_ms
        );

        Ok(ForwardSummary {
            num_outputs: output.len(),
            latency_ms,
        })
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("model_path", &self.model_path)
            .field("environment", &self.environment)
            .field("options", &self.options)
            .field("input_name", &self.input_name)
            .field("output_names", &self.output_names)
            .finish_non_exhaustive()
    }
}

/// Forward passes always feed `f32` data.
fn is_f32_tensor(value_type: &ValueType) -> bool {
    matches!(
        value_type,
        ValueType::Tensor {
            ty: TensorElementType::Float32,
            ..
        }
    )
}

/// Work out the descriptor and graph path for a model directory or `.onnx` file.
fn resolve_model(path: &Path) -> Result<(ModelMetadata, PathBuf)> {
    if path.is_dir() {
        let metadata = ModelMetadata::from_model_dir(path)?;
        let model_path = metadata.onnx_path(path)?;
        return Ok((metadata, model_path));
    }

    let is_onnx = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false);
    if is_onnx {
        Ok((ModelMetadata::for_onnx_file(path), path.to_path_buf()))
    } else {
        Err(PoseError::model_load(format!(
            "{} is neither a model directory nor an .onnx file",
            path.display()
        )))
    }
}

/// A model that may or may not have loaded.
///
/// Either every runtime resource is present ([`ModelHandle::Loaded`]) or none is
/// ([`ModelHandle::Unloaded`]). Dropping a loaded handle releases its resources.
#[derive(Debug, Default)]
pub enum ModelHandle {
    /// Session, environment and options are live.
    Loaded(Box<LoadedModel>),
    /// Nothing to release. Produced by a failed load or by [`ModelHandle::free`].
    #[default]
    Unloaded,
}

impl ModelHandle {
    /// Load with default session options. Failures are logged and yield `Unloaded`.
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::load_with(path, &SessionConfig::default())
    }

    /// Load with explicit session options. Failures are logged and yield `Unloaded`.
    pub fn load_with(path: impl AsRef<Path>, config: &SessionConfig) -> Self {
        let path = path.as_ref();
        match LoadedModel::load(path, config) {
            Ok(model) => Self::Loaded(Box::new(model)),
            Err(e) => {
                warn!("Could not load model {}: {}", path.display(), e);
                Self::Unloaded
            }
        }
    }

    /// Load the model named by `config.model.path`.
    pub fn from_config(config: &Config) -> Self {
        match config.model.path.as_deref() {
            Some(path) => Self::load_with(path, &config.session),
            None => {
                warn!("No model path configured");
                Self::Unloaded
            }
        }
    }

    /// Whether the session, environment and options are live.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// The loaded model, if any.
    pub fn loaded(&self) -> Option<&LoadedModel> {
        match self {
            Self::Loaded(model) => Some(model.as_ref()),
            Self::Unloaded => None,
        }
    }

    /// Mutable access to the loaded model, if any.
    pub fn loaded_mut(&mut self) -> Option<&mut LoadedModel> {
        match self {
            Self::Loaded(model) => Some(model.as_mut()),
            Self::Unloaded => None,
        }
    }

    /// The inference session, if loaded.
    pub fn session(&self) -> Option<&Session> {
        self.loaded().map(LoadedModel::session)
    }

    /// The runtime environment, if loaded.
    pub fn environment(&self) -> Option<&Environment> {
        self.loaded().map(LoadedModel::environment)
    }

    /// The session options, if loaded.
    pub fn options(&self) -> Option<&SessionOptions> {
        self.loaded().map(LoadedModel::options)
    }

    /// The model descriptor, if loaded.
    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.loaded().map(LoadedModel::metadata)
    }

    /// Number of outputs a forward pass produces; zero when unloaded.
    pub fn output_size(&self) -> usize {
        self.loaded().map_or(0, LoadedModel::output_size)
    }

    /// Create a random input matching the loaded model's input geometry.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::NotLoaded`] if the handle holds no model.
    pub fn random_input<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Tensor> {
        self.loaded()
            .map(|model| model.random_input(rng))
            .ok_or(PoseError::NotLoaded)
    }

    /// Run one forward pass, replacing the contents of `output`.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::NotLoaded`] if the handle holds no model, otherwise
    /// whatever [`LoadedModel::forward`] returns.
    pub fn forward(&mut self, input: &Tensor, output: &mut TensorVector) -> Result<ForwardSummary> {
        match self {
            Self::Loaded(model) => model.forward(input, output),
            Self::Unloaded => {
                output.clear();
                Err(PoseError::NotLoaded)
            }
        }
    }

    /// Release the session, environment and options. No-op when already unloaded.
    pub fn free(&mut self) {
        if let Self::Loaded(model) = std::mem::take(self) {
            info!("Released model {}", model.model_path().display());
        }
    }
}

/// Trait for types that can run a forward pass.
pub trait ModelRunner {
    /// Run one forward pass, replacing the contents of `output`.
    fn forward(&mut self, input: &Tensor, output: &mut TensorVector) -> Result<ForwardSummary>;

    /// Number of outputs a forward pass produces.
    fn output_size(&self) -> usize;
}

impl ModelRunner for LoadedModel {
    fn forward(&mut self, input: &Tensor, output: &mut TensorVector) -> Result<ForwardSummary> {
        LoadedModel::forward(self, input, output)
    }

    fn output_size(&self) -> usize {
        self.output_size
    }
}

impl ModelRunner for ModelHandle {
    fn forward(&mut self, input: &Tensor, output: &mut TensorVector) -> Result<ForwardSummary> {
        ModelHandle::forward(self, input, output)
    }

    fn output_size(&self) -> usize {
        ModelHandle::output_size(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_missing_path_is_not_found() {
        let err = LoadedModel::load(
            "data/optimized_model_not_existant",
            &SessionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PoseError::FileNotFound(_)));
    }

    #[test]
    fn test_wrong_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("weights.pth");
        std::fs::write(&file, b"not a model").unwrap();
        let err = LoadedModel::load(&file, &SessionConfig::default()).unwrap_err();
        assert!(matches!(err, PoseError::ModelLoad(_)));
    }

    #[test]
    fn test_descriptor_pointing_at_missing_graph() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("optimized_model");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(
            dir.join("optimized_model.json"),
            r#"{"model_paths": ["optimized_model.onnx"], "format": "onnx"}"#,
        )
        .unwrap();
        let err = LoadedModel::load(&dir, &SessionConfig::default()).unwrap_err();
        match err {
            PoseError::FileNotFound(path) => assert_eq!(path, dir.join("optimized_model.onnx")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unloaded_handle() {
        let mut handle = ModelHandle::default();
        assert!(!handle.is_loaded());
        assert!(handle.session().is_none());
        assert!(handle.environment().is_none());
        assert!(handle.options().is_none());
        assert_eq!(handle.output_size(), 0);

        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            handle.random_input(&mut rng),
            Err(PoseError::NotLoaded)
        ));

        let mut outputs = TensorVector::new();
        outputs.push(Tensor::new());
        let err = handle.forward(&Tensor::new(), &mut outputs).unwrap_err();
        assert!(matches!(err, PoseError::NotLoaded));
        assert!(outputs.is_empty());

        handle.free();
        handle.free();
        assert!(!handle.is_loaded());
    }

    #[test]
    fn test_from_config_without_path() {
        let handle = ModelHandle::from_config(&Config::default());
        assert!(!handle.is_loaded());
    }
}
