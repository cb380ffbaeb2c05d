//! Model descriptor read from `<dir>/<dir-name>.json`.
//!
//! An optimized model directory looks like:
//!
//! ```text
//! optimized_model/
//! ├── optimized_model.json
//! └── optimized_model.onnx
//! ```

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use crate::error::{PoseError, Result};

/// Parsed model descriptor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelMetadata {
    /// Model files relative to the model directory. The first entry is the ONNX graph.
    pub model_paths: Vec<String>,

    /// Training framework the model was exported from.
    #[serde(default)]
    pub framework: Option<String>,

    /// Serialized format. Only `onnx` can be loaded.
    pub format: String,

    /// Whether the model ships external data files.
    #[serde(default)]
    pub has_data: bool,

    /// Whether the graph went through an optimization pass.
    #[serde(default)]
    pub optimized: bool,

    /// Parameters needed to build inputs for the model.
    #[serde(default)]
    pub inference_params: InferenceParams,
}

/// Input geometry and preprocessing constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InferenceParams {
    /// Input width in pixels.
    #[serde(default = "default_side")]
    pub width: usize,

    /// Input height in pixels.
    #[serde(default = "default_side")]
    pub height: usize,

    /// Input channels.
    #[serde(default = "default_channels")]
    pub channels: usize,

    /// Images per forward pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-channel mean subtracted before scaling.
    #[serde(default = "default_mean")]
    pub mean: [f32; 3],

    /// Scale applied after mean subtraction.
    #[serde(default = "default_img_scale")]
    pub img_scale: f32,

    /// Value used to pad images up to a multiple of `stride`.
    #[serde(default)]
    pub pad_value: [f32; 3],

    /// Network output stride.
    #[serde(default = "default_stride")]
    pub stride: usize,

    /// Whether the graph expects half-precision inputs.
    #[serde(default)]
    pub half: bool,

    /// Declared number of outputs. The session's own count wins if they differ.
    #[serde(default)]
    pub output_size: Option<usize>,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            width: default_side(),
            height: default_side(),
            channels: default_channels(),
            batch_size: default_batch_size(),
            mean: default_mean(),
            img_scale: default_img_scale(),
            pad_value: [0.0; 3],
            stride: default_stride(),
            half: false,
            output_size: None,
        }
    }
}

impl InferenceParams {
    /// Input shape in NCHW order.
    pub fn input_shape(&self) -> [usize; 4] {
        [self.batch_size, self.channels, self.height, self.width]
    }
}

fn default_side() -> usize {
    256
}

fn default_channels() -> usize {
    3
}

fn default_batch_size() -> usize {
    1
}

fn default_mean() -> [f32; 3] {
    [128.0 / 256.0; 3]
}

fn default_img_scale() -> f32 {
    1.0 / 256.0
}

fn default_stride() -> usize {
    8
}

impl ModelMetadata {
    /// Metadata for a bare `.onnx` file with no descriptor next to it.
    pub fn for_onnx_file(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            model_paths: vec![file_name],
            framework: None,
            format: "onnx".to_string(),
            has_data: false,
            optimized: false,
            inference_params: InferenceParams::default(),
        }
    }

    /// Parse a descriptor from a JSON string and check it describes a loadable model.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let metadata: ModelMetadata = serde_json::from_str(json)?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Read the descriptor of the model directory `dir`.
    pub fn from_model_dir(dir: &Path) -> Result<Self> {
        let json_path = descriptor_path(dir)?;
        if !json_path.is_file() {
            return Err(PoseError::FileNotFound(json_path));
        }
        let content = std::fs::read_to_string(&json_path)?;
        Self::from_json_str(&content)
    }

    /// Path of the ONNX graph inside `dir`.
    pub fn onnx_path(&self, dir: &Path) -> Result<PathBuf> {
        let first = self
            .model_paths
            .first()
            .ok_or_else(|| PoseError::metadata("model_paths is empty"))?;
        check_relative(first)?;
        Ok(dir.join(first))
    }

    fn validate(&self) -> Result<()> {
        if !self.format.eq_ignore_ascii_case("onnx") {
            return Err(PoseError::metadata(format!(
                "unsupported model format '{}', expected 'onnx'",
                self.format
            )));
        }
        let first = self
            .model_paths
            .first()
            .ok_or_else(|| PoseError::metadata("model_paths is empty"))?;
        check_relative(first)?;
        let p = &self.inference_params;
        if p.width == 0 || p.height == 0 || p.channels == 0 || p.batch_size == 0 {
            return Err(PoseError::metadata(
                "inference_params dimensions must be non-zero",
            ));
        }
        if p.half {
            return Err(PoseError::metadata(
                "half-precision models are not supported, inputs are fed as f32",
            ));
        }
        Ok(())
    }
}

/// Model files must stay inside the model directory.
fn check_relative(entry: &str) -> Result<()> {
    let escapes = Path::new(entry)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if entry.is_empty() || escapes {
        return Err(PoseError::metadata(format!(
            "model path '{}' must be relative to the model directory",
            entry
        )));
    }
    Ok(())
}

/// `<dir>/<dir-name>.json`
fn descriptor_path(dir: &Path) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .ok_or_else(|| PoseError::metadata(format!("{} has no directory name", dir.display())))?;
    let mut file = name.to_os_string();
    file.push(".json");
    Ok(dir.join(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const DESCRIPTOR: &str = r#"{
        "model_paths": ["optimized_model.onnx"],
        "framework": "pytorch",
        "format": "onnx",
        "has_data": false,
        "inference_params": {"width": 32, "height": 24, "output_size": 4},
        "optimized": true,
        "optimizer_info": {}
    }"#;

    #[test]
    fn test_parse_descriptor() {
        let metadata = ModelMetadata::from_json_str(DESCRIPTOR).unwrap();
        assert_eq!(metadata.framework.as_deref(), Some("pytorch"));
        assert!(metadata.optimized);
        let params = &metadata.inference_params;
        assert_eq!(params.input_shape(), [1, 3, 24, 32]);
        assert_eq!(params.output_size, Some(4));
        assert_eq!(params.stride, 8);
        assert_abs_diff_eq!(params.img_scale, 0.00390625);
        assert_abs_diff_eq!(params.mean[0], 0.5);
    }

    #[test]
    fn test_missing_params_use_defaults() {
        let metadata =
            ModelMetadata::from_json_str(r#"{"model_paths": ["m.onnx"], "format": "ONNX"}"#)
                .unwrap();
        assert_eq!(metadata.inference_params, InferenceParams::default());
        assert_eq!(metadata.inference_params.input_shape(), [1, 3, 256, 256]);
    }

    #[test]
    fn test_rejects_other_formats() {
        let err =
            ModelMetadata::from_json_str(r#"{"model_paths": ["m.pth"], "format": "pytorch"}"#)
                .unwrap_err();
        assert!(matches!(err, PoseError::Metadata(_)));
    }

    #[test]
    fn test_rejects_empty_model_paths() {
        let err = ModelMetadata::from_json_str(r#"{"model_paths": [], "format": "onnx"}"#)
            .unwrap_err();
        assert!(matches!(err, PoseError::Metadata(_)));
    }

    #[test]
    fn test_rejects_half_precision() {
        let err = ModelMetadata::from_json_str(
            r#"{"model_paths": ["m.onnx"], "format": "onnx", "inference_params": {"half": true}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PoseError::Metadata(_)));
    }

    #[test]
    fn test_rejects_paths_outside_model_dir() {
        for entry in ["../other/m.onnx", "/models/m.onnx", "sub/../../m.onnx", ""] {
            let json = format!(r#"{{"model_paths": ["{}"], "format": "onnx"}}"#, entry);
            let err = ModelMetadata::from_json_str(&json).unwrap_err();
            assert!(matches!(err, PoseError::Metadata(_)), "accepted {entry:?}");
        }

        let metadata =
            ModelMetadata::from_json_str(r#"{"model_paths": ["./sub/m.onnx"], "format": "onnx"}"#)
                .unwrap();
        let dir = Path::new("/models/optimized_model");
        assert_eq!(metadata.onnx_path(dir).unwrap(), dir.join("./sub/m.onnx"));
    }

    #[test]
    fn test_malformed_json() {
        let err = ModelMetadata::from_json_str("{").unwrap_err();
        assert!(matches!(err, PoseError::Json(_)));
    }

    #[test]
    fn test_from_model_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("optimized_model");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("optimized_model.json"), DESCRIPTOR).unwrap();

        let metadata = ModelMetadata::from_model_dir(&dir).unwrap();
        assert_eq!(
            metadata.onnx_path(&dir).unwrap(),
            dir.join("optimized_model.onnx")
        );
    }

    #[test]
    fn test_from_model_dir_without_descriptor() {
        let root = tempfile::tempdir().unwrap();
        let err = ModelMetadata::from_model_dir(root.path()).unwrap_err();
        assert!(matches!(err, PoseError::FileNotFound(_)));
    }

    #[test]
    fn test_for_onnx_file() {
        let metadata = ModelMetadata::for_onnx_file(Path::new("/models/pose.onnx"));
        assert_eq!(metadata.model_paths, vec!["pose.onnx".to_string()]);
        assert_eq!(metadata.format, "onnx");
    }
}
