use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::ValueType;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{ClassifierError, ConfigError};
use crate::types::{ClassProbabilities, FeatureWindow};

/// Opaque model mapping a flattened window to one score per class.
pub trait Classifier {
    /// Feature vector length the model expects, when it declares one.
    fn input_len(&self) -> Option<usize>;

    /// Number of classes the model outputs, when it declares one.
    fn output_len(&self) -> Option<usize>;

    fn predict(&mut self, window: &FeatureWindow) -> Result<ClassProbabilities, ClassifierError>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn input_len(&self) -> Option<usize> {
        (**self).input_len()
    }

    fn output_len(&self) -> Option<usize> {
        (**self).output_len()
    }

    fn predict(&mut self, window: &FeatureWindow) -> Result<ClassProbabilities, ClassifierError> {
        (**self).predict(window)
    }
}

/// Fails when the classifier's declared shapes disagree with the window
/// length or class count. Meant to run before any sampling starts.
pub fn check_shapes<C: Classifier + ?Sized>(
    classifier: &C,
    config: &PipelineConfig,
) -> Result<(), ConfigError> {
    if let Some(actual) = classifier.input_len() {
        if actual != config.feature_len() {
            return Err(ConfigError::ShapeMismatch {
                what: "classifier input",
                expected: config.feature_len(),
                actual,
            });
        }
    }
    if let Some(actual) = classifier.output_len() {
        if actual != config.num_classes {
            return Err(ConfigError::ShapeMismatch {
                what: "classifier output",
                expected: config.num_classes,
                actual,
            });
        }
    }
    Ok(())
}

/// Runs the classifier and rejects a result that is not one score per class.
///
/// Dynamic model dimensions declare no width, so this is the only check
/// those models get.
pub fn predict_checked<C: Classifier + ?Sized>(
    classifier: &mut C,
    window: &FeatureWindow,
    num_classes: usize,
) -> Result<ClassProbabilities, ClassifierError> {
    let probabilities = classifier.predict(window)?;
    if probabilities.len() != num_classes {
        return Err(ClassifierError::InvalidOutputSize {
            expected: num_classes,
            actual: probabilities.len(),
        });
    }
    Ok(probabilities)
}

/// Always answers with the same probabilities. Useful to check wiring
/// independent of any trained model.
#[derive(Debug, Clone)]
pub struct FixedClassifier {
    input_len: usize,
    probabilities: ClassProbabilities,
    calls: usize,
}

impl FixedClassifier {
    pub fn new(input_len: usize, probabilities: ClassProbabilities) -> Self {
        Self {
            input_len,
            probabilities,
            calls: 0,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Classifier for FixedClassifier {
    fn input_len(&self) -> Option<usize> {
        Some(self.input_len)
    }

    fn output_len(&self) -> Option<usize> {
        Some(self.probabilities.len())
    }

    fn predict(&mut self, window: &FeatureWindow) -> Result<ClassProbabilities, ClassifierError> {
        if window.len() != self.input_len {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: self.input_len,
                actual: window.len(),
            });
        }
        self.calls += 1;
        Ok(self.probabilities.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ClassesJson {
    index_to_class: HashMap<String, String>,
}

/// Reads `{"index_to_class": {"0": "IDLE", ...}}` into labels ordered by index.
pub fn load_classes(path: impl AsRef<Path>) -> Result<Vec<String>, ClassifierError> {
    let content = fs::read_to_string(path)?;
    let data: ClassesJson = serde_json::from_str(&content)?;

    let mut pairs: Vec<(usize, String)> = data
        .index_to_class
        .into_iter()
        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
        .collect();

    pairs.sort_by_key(|(idx, _)| *idx);
    Ok(pairs.into_iter().map(|(_, name)| name).collect())
}

/// Trailing dimension of a tensor type, if the model fixes it.
fn tensor_width(value_type: &ValueType) -> Option<usize> {
    match value_type {
        ValueType::Tensor { shape, .. } => shape
            .last()
            .copied()
            .filter(|d| *d > 0)
            .map(|d| d as usize),
        _ => None,
    }
}

/// Gesture model exported to ONNX, fed as a `[1, N * 6]` float tensor.
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    prob_output_name: String,
    input_len: Option<usize>,
    output_len: Option<usize>,
}

impl OnnxClassifier {
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        let session = Session::builder()?.commit_from_file(model_path)?;

        let input = session
            .inputs
            .get(0)
            .ok_or(ClassifierError::MissingIo { kind: "input" })?;
        let input_name = input.name.clone();
        let input_len = tensor_width(&input.input_type);

        let prob_output = session
            .outputs
            .iter()
            .find(|output| {
                matches!(
                    output.output_type,
                    ValueType::Tensor {
                        ty: TensorElementType::Float32,
                        ..
                    }
                )
            })
            .or_else(|| session.outputs.get(0))
            .ok_or(ClassifierError::MissingIo { kind: "output" })?;
        let prob_output_name = prob_output.name.clone();
        let output_len = tensor_width(&prob_output.output_type);

        info!(
            model = %model_path.display(),
            input = %input_name,
            output = %prob_output_name,
            ?input_len,
            ?output_len,
            "ONNX model loaded"
        );

        Ok(Self {
            session,
            input_name,
            prob_output_name,
            input_len,
            output_len,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn input_len(&self) -> Option<usize> {
        self.input_len
    }

    fn output_len(&self) -> Option<usize> {
        self.output_len
    }

    fn predict(&mut self, window: &FeatureWindow) -> Result<ClassProbabilities, ClassifierError> {
        if let Some(expected) = self.input_len {
            if window.len() != expected {
                return Err(ClassifierError::InvalidFeatureSize {
                    expected,
                    actual: window.len(),
                });
            }
        }

        // [1, N * 6]
        let shape_vec = vec![1_usize, window.len()];
        let input_value = ort::value::Value::from_array((shape_vec, window.clone()))?;

        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => &input_value,
        ])?;

        let (_prob_shape, prob_data) =
            outputs[self.prob_output_name.as_str()].try_extract_tensor::<f32>()?;

        if prob_data.is_empty() {
            return Err(ClassifierError::NoOutputTensor);
        }
        debug!(probabilities = ?prob_data, "inference done");

        Ok(prob_data.to_vec())
    }
}
