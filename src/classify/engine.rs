//! Frozen gesture classifier
//!
//! The engine is created once at startup and reused for every stroke. It is
//! read-only after construction, so one instance can be shared between the
//! controller and the background worker.

use anyhow::{Context, Result};
use std::path::Path;
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::Factoid;

use super::tensor::InputTensor;
use crate::config::GlyphConfig;
use crate::domain::{ClassificationResult, GestureLabel};

/// A model that maps one input tensor to one probability per vocabulary entry
pub trait GestureModel: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Spatial input dimension (the model takes (1, size, size, 3))
    fn input_size(&self) -> u32;

    /// Run one forward pass and return the output row
    fn forward(&self, input: &InputTensor) -> Result<Vec<f32>>;
}

/// ONNX backend using tract
pub struct OnnxModel {
    name: String,
    size: u32,
    plan: TypedRunnableModel<TypedModel>,
}

impl OnnxModel {
    /// Load and optimize an ONNX file for a fixed (1, size, size, 3) input
    ///
    /// The file's declared input must agree with `size` on every dimension it
    /// fixes. Only a symbolic batch dimension is pinned to 1.
    pub fn load(path: &Path, size: u32) -> Result<Self> {
        log::info!("Loading gesture classifier from {}", path.display());
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("Failed to read ONNX model: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_graph(name, model, size)
    }

    fn from_graph(name: String, model: InferenceModel, size: u32) -> Result<Self> {
        let declared = declared_input_dims(&model)?;
        check_declared_input(&declared, size)
            .with_context(|| format!("Classifier '{}' does not fit the canvas", name))?;

        let side = size as usize;
        let model = model
            .with_input_fact(0, f32::fact([1, side, side, InputTensor::CHANNELS]).into())?
            .into_optimized()
            .with_context(|| {
                format!(
                    "Model does not accept a (1, {}, {}, {}) input",
                    side,
                    side,
                    InputTensor::CHANNELS
                )
            })?;

        let output = model.output_fact(0)?;
        let outputs = output
            .shape
            .as_concrete()
            .map(|dims| dims.iter().product::<usize>())
            .context("Model output shape is not fixed")?;
        if outputs != GestureLabel::VOCABULARY.len() {
            anyhow::bail!(
                "Model produces {} outputs, expected {} ({})",
                outputs,
                GestureLabel::VOCABULARY.len(),
                GestureLabel::VOCABULARY.map(|l| l.as_str()).join(", ")
            );
        }

        let plan = model.into_runnable()?;
        Ok(Self { name, size, plan })
    }
}

/// Input dimensions as declared in the graph, None where symbolic or unset
fn declared_input_dims(model: &InferenceModel) -> Result<Vec<Option<i64>>> {
    let fact = model.input_fact(0).context("Model has no input")?;
    Ok(fact
        .shape
        .dims()
        .map(|dim| dim.concretize().and_then(|d| d.to_i64().ok()))
        .collect())
}

/// Check declared input dimensions against (1, size, size, 3)
///
/// An empty list means the graph leaves the rank open, which is accepted.
fn check_declared_input(dims: &[Option<i64>], size: u32) -> Result<()> {
    if dims.is_empty() {
        return Ok(());
    }
    let expected = [1, size as i64, size as i64, InputTensor::CHANNELS as i64];
    if dims.len() != expected.len() {
        anyhow::bail!(
            "Model input has rank {}, expected (1, {}, {}, {})",
            dims.len(),
            size,
            size,
            InputTensor::CHANNELS
        );
    }
    for (axis, (dim, want)) in dims.iter().zip(expected).enumerate() {
        if let Some(dim) = *dim
            && dim != want
        {
            anyhow::bail!(
                "Model input dimension {} is {}, expected {} for a {}x{} canvas",
                axis,
                dim,
                want,
                size,
                size
            );
        }
    }
    Ok(())
}

impl GestureModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> u32 {
        self.size
    }

    fn forward(&self, input: &InputTensor) -> Result<Vec<f32>> {
        let tensor = Tensor::from_shape(&input.shape(), input.as_slice())?;
        let outputs = self.plan.run(tvec!(tensor.into()))?;
        let probs = outputs[0].to_array_view::<f32>()?;
        Ok(probs.iter().copied().collect())
    }
}

/// Owns the loaded classifier for the lifetime of the process
pub struct ClassifierEngine {
    model: Box<dyn GestureModel>,
    size: u32,
}

impl ClassifierEngine {
    /// Load the configured model. Failure here is fatal for the pipeline.
    pub fn load(config: &GlyphConfig) -> Result<Self> {
        let model = OnnxModel::load(&config.model_path, config.canvas_size).with_context(|| {
            format!(
                "Failed to initialize gesture classifier from {}",
                config.model_path.display()
            )
        })?;
        Self::new(Box::new(model), config.canvas_size)
    }

    /// Wrap a model, checking that it matches the canvas size
    pub fn new(model: Box<dyn GestureModel>, canvas_size: u32) -> Result<Self> {
        if model.input_size() != canvas_size {
            anyhow::bail!(
                "Classifier '{}' expects {}x{} input but the canvas is {}x{}",
                model.name(),
                model.input_size(),
                model.input_size(),
                canvas_size,
                canvas_size
            );
        }
        log::info!("Classifier '{}' ready", model.name());
        Ok(Self {
            model,
            size: canvas_size,
        })
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// Input shape every tensor must have
    pub fn input_shape(&self) -> [usize; 4] {
        let side = self.size as usize;
        [1, side, side, InputTensor::CHANNELS]
    }

    /// Run one forward pass and pick the most probable label
    ///
    /// Ties go to the earliest label in vocabulary order.
    pub fn infer(&self, tensor: &InputTensor) -> Result<ClassificationResult> {
        if tensor.shape() != self.input_shape() {
            anyhow::bail!(
                "Input tensor shape {:?} does not match classifier shape {:?}",
                tensor.shape(),
                self.input_shape()
            );
        }

        let probs = self.model.forward(tensor)?;
        if probs.len() != GestureLabel::VOCABULARY.len() {
            anyhow::bail!(
                "Classifier returned {} scores, expected {}",
                probs.len(),
                GestureLabel::VOCABULARY.len()
            );
        }
        if let Some(bad) = probs.iter().find(|p| !p.is_finite()) {
            anyhow::bail!("Classifier returned non-finite score {}", bad);
        }

        let mut best = 0;
        for (i, &p) in probs.iter().enumerate().skip(1) {
            if p > probs[best] {
                best = i;
            }
        }
        let label = GestureLabel::from_index(best).context("Arg-max outside vocabulary")?;
        let result = ClassificationResult {
            label,
            confidence: probs[best],
        };
        log::debug!("Classifier scores {:?} -> {} ({:.3})", probs, label, result.confidence);
        Ok(result)
    }
}

impl Drop for ClassifierEngine {
    fn drop(&mut self) {
        log::info!("Releasing classifier '{}'", self.model.name());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classify::TensorBuilder;
    use crate::config::{CanvasColor, ChannelMode};
    use crate::render::RasterCanvas;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed scores and counts calls and drops
    pub(crate) struct FakeModel {
        pub size: u32,
        pub scores: Vec<f32>,
        pub calls: Arc<AtomicUsize>,
        pub drops: Arc<AtomicUsize>,
    }

    impl FakeModel {
        pub(crate) fn new(size: u32, scores: Vec<f32>) -> Self {
            Self {
                size,
                scores,
                calls: Arc::new(AtomicUsize::new(0)),
                drops: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl GestureModel for FakeModel {
        fn name(&self) -> &str {
            "fake"
        }

        fn input_size(&self) -> u32 {
            self.size
        }

        fn forward(&self, _input: &InputTensor) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.scores.clone())
        }
    }

    impl Drop for FakeModel {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Scores that depend on the input, to check determinism end to end
    struct InkModel;

    impl GestureModel for InkModel {
        fn name(&self) -> &str {
            "ink"
        }

        fn input_size(&self) -> u32 {
            8
        }

        fn forward(&self, input: &InputTensor) -> Result<Vec<f32>> {
            let ink: f32 = input.as_slice().iter().sum::<f32>() / input.as_slice().len() as f32;
            Ok(vec![0.1, ink, 0.2, 1.0 - ink, 0.05])
        }
    }

    fn blank_tensor(size: u32) -> InputTensor {
        let canvas = RasterCanvas::new(size, CanvasColor::BLACK);
        TensorBuilder::new(ChannelMode::Rgb, size).build(&canvas)
    }

    #[test]
    fn test_infer_picks_argmax() {
        let model = FakeModel::new(8, vec![0.1, 0.05, 0.6, 0.2, 0.05]);
        let engine = ClassifierEngine::new(Box::new(model), 8).unwrap();
        let result = engine.infer(&blank_tensor(8)).unwrap();
        assert_eq!(result.label, GestureLabel::S);
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn test_ties_resolve_to_first_label() {
        let model = FakeModel::new(8, vec![0.2, 0.4, 0.0, 0.4, 0.0]);
        let engine = ClassifierEngine::new(Box::new(model), 8).unwrap();
        assert_eq!(engine.infer(&blank_tensor(8)).unwrap().label, GestureLabel::Loop);
    }

    #[test]
    fn test_size_mismatch_is_rejected_at_startup() {
        let result = ClassifierEngine::new(Box::new(FakeModel::new(224, vec![0.2; 5])), 216);
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_tensor_shape_is_rejected() {
        let engine = ClassifierEngine::new(Box::new(FakeModel::new(8, vec![0.2; 5])), 8).unwrap();
        assert!(engine.infer(&blank_tensor(4)).is_err());
    }

    #[test]
    fn test_wrong_output_width_is_an_error() {
        let engine = ClassifierEngine::new(Box::new(FakeModel::new(8, vec![0.5; 6])), 8).unwrap();
        assert!(engine.infer(&blank_tensor(8)).is_err());
        let model = FakeModel::new(8, vec![f32::NAN; 5]);
        let engine = ClassifierEngine::new(Box::new(model), 8).unwrap();
        assert!(engine.infer(&blank_tensor(8)).is_err());
    }

    #[test]
    fn test_inference_is_deterministic() {
        let engine = ClassifierEngine::new(Box::new(InkModel), 8).unwrap();
        let mut canvas = RasterCanvas::new(8, CanvasColor::BLACK);
        canvas.with_pixmap(|pixmap| pixmap.fill(tiny_skia::Color::WHITE));
        let tensor = TensorBuilder::new(ChannelMode::Rgb, 8).build(&canvas);
        let first = engine.infer(&tensor).unwrap();
        for _ in 0..5 {
            assert_eq!(engine.infer(&tensor).unwrap(), first);
        }
        assert_eq!(first.label, GestureLabel::Loop);
    }

    #[test]
    fn test_model_released_once_on_drop() {
        let model = FakeModel::new(8, vec![0.2; 5]);
        let drops = model.drops.clone();
        let engine = ClassifierEngine::new(Box::new(model), 8).unwrap();
        engine.infer(&blank_tensor(8)).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(engine);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_model_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = GlyphConfig {
            model_path: dir.path().join("missing.onnx"),
            ..GlyphConfig::default()
        };
        let err = ClassifierEngine::load(&config).err().unwrap();
        assert!(format!("{:#}", err).contains("missing.onnx"));
    }

    mod onnx {
        use super::*;
        use tract_onnx::pb;
        use tract_onnx::pb::tensor_shape_proto::{Dimension, dimension};

        fn float_type(dims: &[Option<i64>]) -> pb::TypeProto {
            let dim = dims
                .iter()
                .map(|d| Dimension {
                    value: Some(match d {
                        Some(v) => dimension::Value::DimValue(*v),
                        None => dimension::Value::DimParam("N".to_string()),
                    }),
                    ..Default::default()
                })
                .collect();
            pb::TypeProto {
                value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
                    elem_type: pb::tensor_proto::DataType::Float as i32,
                    shape: Some(pb::TensorShapeProto { dim }),
                })),
                ..Default::default()
            }
        }

        fn initializer(name: &str, dims: &[i64], data: Vec<f32>) -> pb::TensorProto {
            pb::TensorProto {
                name: name.to_string(),
                dims: dims.to_vec(),
                data_type: pb::tensor_proto::DataType::Float as i32,
                float_data: data,
                ..Default::default()
            }
        }

        fn node(op: &str, inputs: &[&str], output: &str) -> pb::NodeProto {
            pb::NodeProto {
                op_type: op.to_string(),
                name: output.to_string(),
                input: inputs.iter().map(|i| i.to_string()).collect(),
                output: vec![output.to_string()],
                ..Default::default()
            }
        }

        /// Channel means through a linear layer: scores = mean(rgb) * W + B
        ///
        /// W only links the red mean to the last output, so a blank canvas
        /// scores the bias and a white canvas adds 2.0 to the last output.
        fn linear_model(input_dims: [Option<i64>; 4], outputs: usize) -> InferenceModel {
            let mut weights = vec![0.0; 3 * outputs];
            weights[outputs - 1] = 2.0;
            let mut bias = vec![0.0; outputs];
            bias[..5].copy_from_slice(&[0.1, 0.2, 0.9, 0.3, 0.0]);

            let mut mean = node("ReduceMean", &["input"], "means");
            mean.attribute = vec![
                pb::AttributeProto {
                    name: "axes".to_string(),
                    r#type: pb::attribute_proto::AttributeType::Ints as i32,
                    ints: vec![1, 2],
                    ..Default::default()
                },
                pb::AttributeProto {
                    name: "keepdims".to_string(),
                    r#type: pb::attribute_proto::AttributeType::Int as i32,
                    i: 0,
                    ..Default::default()
                },
            ];

            let graph = pb::GraphProto {
                name: "gesture".to_string(),
                node: vec![
                    mean,
                    node("MatMul", &["means", "weights"], "logits"),
                    node("Add", &["logits", "bias"], "scores"),
                ],
                initializer: vec![
                    initializer("weights", &[3, outputs as i64], weights),
                    initializer("bias", &[outputs as i64], bias),
                ],
                input: vec![pb::ValueInfoProto {
                    name: "input".to_string(),
                    r#type: Some(float_type(&input_dims)),
                    ..Default::default()
                }],
                output: vec![pb::ValueInfoProto {
                    name: "scores".to_string(),
                    r#type: Some(float_type(&[Some(1), Some(outputs as i64)])),
                    ..Default::default()
                }],
                ..Default::default()
            };
            let proto = pb::ModelProto {
                ir_version: 7,
                opset_import: vec![pb::OperatorSetIdProto {
                    domain: String::new(),
                    version: 13,
                }],
                graph: Some(graph),
                ..Default::default()
            };
            tract_onnx::onnx().model_for_proto_model(&proto).unwrap()
        }

        fn exported(outputs: usize) -> InferenceModel {
            linear_model([None, Some(216), Some(216), Some(3)], outputs)
        }

        #[test]
        fn test_onnx_model_classifies_canvas() {
            let model = OnnxModel::from_graph("linear".to_string(), exported(5), 216).unwrap();
            let engine = ClassifierEngine::new(Box::new(model), 216).unwrap();
            assert_eq!(engine.input_shape(), [1, 216, 216, 3]);

            let blank = engine.infer(&blank_tensor(216)).unwrap();
            assert_eq!(blank.label, GestureLabel::S);
            assert!((blank.confidence - 0.9).abs() < 1e-5);

            let mut canvas = RasterCanvas::new(216, CanvasColor::BLACK);
            canvas.with_pixmap(|pixmap| pixmap.fill(tiny_skia::Color::WHITE));
            let tensor = TensorBuilder::new(ChannelMode::Rgb, 216).build(&canvas);
            let white = engine.infer(&tensor).unwrap();
            assert_eq!(white.label, GestureLabel::W);
            assert!((white.confidence - 2.0).abs() < 1e-4);
        }

        #[test]
        fn test_onnx_output_width_must_match_vocabulary() {
            let result = OnnxModel::from_graph("wide".to_string(), exported(6), 216);
            assert!(result.is_err());
        }

        #[test]
        fn test_onnx_declared_input_must_match_canvas() {
            let err = OnnxModel::from_graph("linear".to_string(), exported(5), 128)
                .err()
                .unwrap();
            assert!(format!("{:#}", err).contains("128x128"));

            let small = linear_model([None, Some(128), Some(128), Some(3)], 5);
            assert!(OnnxModel::from_graph("small".to_string(), small, 216).is_err());

            let gray = linear_model([Some(1), Some(216), Some(216), Some(1)], 5);
            assert!(OnnxModel::from_graph("gray".to_string(), gray, 216).is_err());
        }

        #[test]
        fn test_declared_input_check() {
            assert!(check_declared_input(&[], 216).is_ok());
            assert!(check_declared_input(&[None, Some(216), Some(216), Some(3)], 216).is_ok());
            assert!(check_declared_input(&[Some(1), None, None, Some(3)], 216).is_ok());
            assert!(check_declared_input(&[None, Some(216), Some(216), Some(3)], 224).is_err());
            assert!(check_declared_input(&[Some(4), Some(216), Some(216), Some(3)], 216).is_err());
            assert!(check_declared_input(&[Some(216), Some(216), Some(3)], 216).is_err());
        }
    }
}
