use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;

use crate::error::PredictionError;
use crate::models::{ClassLabel, ClassificationResult, CLASS_COUNT};
use crate::services::preprocessor::{NormalizedInput, INPUT_SIZE};

/// Anything that turns a normalized image into one raw score per class.
///
/// Implementations must not mutate themselves during inference; one instance
/// is shared by every request.
pub trait ScoreModel: Send + Sync {
    fn scores(&self, input: &NormalizedInput) -> Result<Vec<f32>, PredictionError>;
}

/// ONNX classifier executed with tract.
pub struct OnnxModel {
    plan: TypedRunnableModel<TypedModel>,
    fingerprint: String,
}

impl OnnxModel {
    /// Load and optimize the model artifact. When `expected_sha256` is given the
    /// artifact bytes must hash to it.
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read model artifact {}", path.display()))?;
        let fingerprint = hex::encode(Sha256::digest(&bytes));

        if let Some(expected) = expected_sha256 {
            if !expected.eq_ignore_ascii_case(&fingerprint) {
                anyhow::bail!(
                    "model artifact {} has sha256 {}, expected {}",
                    path.display(),
                    fingerprint,
                    expected
                );
            }
        }

        let size = INPUT_SIZE as usize;
        let plan = tract_onnx::onnx()
            .model_for_read(&mut bytes.as_slice())
            .with_context(|| format!("failed to parse ONNX model {}", path.display()))?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)))?
            .into_optimized()
            .context("failed to optimize model")?
            .into_runnable()
            .context("failed to build runnable model")?;

        Ok(Self { plan, fingerprint })
    }

    /// Hex SHA-256 of the loaded artifact.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl ScoreModel for OnnxModel {
    fn scores(&self, input: &NormalizedInput) -> Result<Vec<f32>, PredictionError> {
        log::debug!("🧮 Running model on input {:?}", input.shape());
        let tensor: Tensor = input.as_array().clone().into();
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| PredictionError::ModelInference(format!("{:#}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| PredictionError::ModelInference("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| PredictionError::ModelInference(format!("{:#}", e)))?;

        log::debug!("🧮 Model output shape: {:?}", view.shape());
        Ok(view.iter().copied().collect())
    }
}

/// Turns raw class scores into a prediction.
#[derive(Clone)]
pub struct ClassifierEngine {
    model: Arc<dyn ScoreModel>,
}

impl ClassifierEngine {
    pub fn new(model: Arc<dyn ScoreModel>) -> Self {
        Self { model }
    }

    pub fn classify(&self, input: &NormalizedInput) -> Result<ClassificationResult, PredictionError> {
        let scores = self.model.scores(input)?;

        if scores.len() != CLASS_COUNT {
            return Err(PredictionError::ModelInference(format!(
                "expected {} class scores, got {}",
                CLASS_COUNT,
                scores.len()
            )));
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(PredictionError::ModelInference(format!(
                "model produced a non-finite score: {}",
                bad
            )));
        }

        // First maximum wins on ties
        let mut class_id = 0;
        for (i, &score) in scores.iter().enumerate() {
            if score > scores[class_id] {
                class_id = i;
            }
        }

        let probabilities = softmax(&scores);
        let class_name = ClassLabel::from_index(class_id).ok_or_else(|| {
            PredictionError::ModelInference(format!("class index {} out of range", class_id))
        })?;

        Ok(ClassificationResult {
            class_id,
            class_name,
            confidence: probabilities[class_id] * 100.0,
            probabilities,
        })
    }
}

fn softmax(scores: &[f32]) -> [f64; CLASS_COUNT] {
    let max = scores.iter().fold(f64::NEG_INFINITY, |m, &s| m.max(s as f64));
    let mut probabilities = [0.0; CLASS_COUNT];
    for (p, &s) in probabilities.iter_mut().zip(scores) {
        *p = (s as f64 - max).exp();
    }
    let sum: f64 = probabilities.iter().sum();
    for p in probabilities.iter_mut() {
        *p /= sum;
    }
    probabilities
}

/// Stand-in model returning the same scores for every input.
#[cfg(test)]
pub struct FixedScores(pub Vec<f32>);

#[cfg(test)]
impl ScoreModel for FixedScores {
    fn scores(&self, _input: &NormalizedInput) -> Result<Vec<f32>, PredictionError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::preprocessor::ImagePreprocessor;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn sample_input() -> NormalizedInput {
        let img = RgbImage::from_pixel(30, 30, Rgb([180, 20, 20]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        ImagePreprocessor::new().normalize(buf.get_ref()).unwrap()
    }

    fn engine(scores: Vec<f32>) -> ClassifierEngine {
        ClassifierEngine::new(Arc::new(FixedScores(scores)))
    }

    /// Scores by input mean, so different images can give different classes.
    struct MeanScores;

    impl ScoreModel for MeanScores {
        fn scores(&self, input: &NormalizedInput) -> Result<Vec<f32>, PredictionError> {
            let mean = input.as_array().mean().unwrap_or(0.0);
            Ok((0..CLASS_COUNT).map(|i| mean * i as f32).collect())
        }
    }

    #[test]
    fn test_picks_highest_score() {
        let mut scores = vec![0.1; CLASS_COUNT];
        scores[8] = 4.0;
        let result = engine(scores).classify(&sample_input()).unwrap();

        assert_eq!(result.class_id, 8);
        assert_eq!(result.class_name, ClassLabel::Tomat);
        assert!(result.confidence > 50.0 && result.confidence <= 100.0);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let scores = vec![-3.0, 0.5, 2.0, 7.5, -1.0, 0.0, 3.3, 1.1, -9.0, 4.2];
        let result = engine(scores).classify(&sample_input()).unwrap();

        let sum: f64 = result.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((result.confidence - result.probabilities[3] * 100.0).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&result.confidence));
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let mut scores = vec![0.0; CLASS_COUNT];
        scores[2] = 5.0;
        scores[6] = 5.0;
        let result = engine(scores).classify(&sample_input()).unwrap();
        assert_eq!(result.class_id, 2);
        assert_eq!(result.class_name, ClassLabel::Bayam);

        let result = engine(vec![1.0; CLASS_COUNT]).classify(&sample_input()).unwrap();
        assert_eq!(result.class_id, 0);
        assert!((result.confidence - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_logits_stay_finite() {
        let mut scores = vec![-1000.0; CLASS_COUNT];
        scores[9] = 1000.0;
        let result = engine(scores).classify(&sample_input()).unwrap();

        assert_eq!(result.class_name, ClassLabel::Wortel);
        assert!((result.confidence - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let engine = ClassifierEngine::new(Arc::new(MeanScores));
        let input = sample_input();

        assert_eq!(engine.classify(&input).unwrap(), engine.classify(&input).unwrap());
    }

    #[test]
    fn test_rejects_wrong_score_count() {
        let err = engine(vec![1.0; 3]).classify(&sample_input()).unwrap_err();
        assert!(matches!(err, PredictionError::ModelInference(_)));
    }

    #[test]
    fn test_rejects_non_finite_scores() {
        let mut scores = vec![0.0; CLASS_COUNT];
        scores[4] = f32::NAN;
        let err = engine(scores).classify(&sample_input()).unwrap_err();
        assert!(matches!(err, PredictionError::ModelInference(_)));
    }

    fn varint(mut value: u64, out: &mut Vec<u8>) {
        while value >= 0x80 {
            out.push((value as u8) | 0x80);
            value >>= 7;
        }
        out.push(value as u8);
    }

    fn field_varint(out: &mut Vec<u8>, field: u64, value: u64) {
        varint(field << 3, out);
        varint(value, out);
    }

    fn field_bytes(out: &mut Vec<u8>, field: u64, data: &[u8]) {
        varint((field << 3) | 2, out);
        varint(data.len() as u64, out);
        out.extend_from_slice(data);
    }

    /// ValueInfoProto for a float tensor of fixed shape.
    fn value_info(name: &str, dims: &[u64]) -> Vec<u8> {
        let mut shape = Vec::new();
        for &d in dims {
            let mut dim = Vec::new();
            field_varint(&mut dim, 1, d);
            field_bytes(&mut shape, 1, &dim);
        }
        let mut tensor_type = Vec::new();
        field_varint(&mut tensor_type, 1, 1);
        field_bytes(&mut tensor_type, 2, &shape);
        let mut type_proto = Vec::new();
        field_bytes(&mut type_proto, 1, &tensor_type);

        let mut info = Vec::new();
        field_bytes(&mut info, 1, name.as_bytes());
        field_bytes(&mut info, 2, &type_proto);
        info
    }

    fn node(op_type: &str, inputs: &[&str], output: &str, attributes: &[Vec<u8>]) -> Vec<u8> {
        let mut node = Vec::new();
        for input in inputs {
            field_bytes(&mut node, 1, input.as_bytes());
        }
        field_bytes(&mut node, 2, output.as_bytes());
        field_bytes(&mut node, 3, output.as_bytes());
        field_bytes(&mut node, 4, op_type.as_bytes());
        for attribute in attributes {
            field_bytes(&mut node, 5, attribute);
        }
        node
    }

    /// Global average pool over H and W followed by a 3x10 MatMul. Only the
    /// red channel carries weight, rising with the class index.
    fn tiny_onnx_model() -> Vec<u8> {
        let mut axes = Vec::new();
        field_bytes(&mut axes, 1, b"axes");
        field_varint(&mut axes, 8, 2);
        field_varint(&mut axes, 8, 3);
        field_varint(&mut axes, 20, 7);
        let mut keepdims = Vec::new();
        field_bytes(&mut keepdims, 1, b"keepdims");
        field_varint(&mut keepdims, 3, 0);
        field_varint(&mut keepdims, 20, 2);

        let mut raw = Vec::new();
        for row in 0..3 {
            for k in 0..CLASS_COUNT {
                let w = if row == 0 { k as f32 * 0.1 } else { 0.0 };
                raw.extend_from_slice(&w.to_le_bytes());
            }
        }
        let mut weights = Vec::new();
        field_varint(&mut weights, 1, 3);
        field_varint(&mut weights, 1, CLASS_COUNT as u64);
        field_varint(&mut weights, 2, 1);
        field_bytes(&mut weights, 8, b"weights");
        field_bytes(&mut weights, 9, &raw);

        let size = INPUT_SIZE as u64;
        let mut graph = Vec::new();
        field_bytes(&mut graph, 1, &node("ReduceMean", &["input"], "pooled", &[axes, keepdims]));
        field_bytes(&mut graph, 1, &node("MatMul", &["pooled", "weights"], "logits", &[]));
        field_bytes(&mut graph, 2, b"tiny");
        field_bytes(&mut graph, 5, &weights);
        field_bytes(&mut graph, 11, &value_info("input", &[1, 3, size, size]));
        field_bytes(&mut graph, 12, &value_info("logits", &[1, CLASS_COUNT as u64]));

        let mut opset = Vec::new();
        field_varint(&mut opset, 2, 13);

        let mut model = Vec::new();
        field_varint(&mut model, 1, 7);
        field_bytes(&mut model, 7, &graph);
        field_bytes(&mut model, 8, &opset);
        model
    }

    fn write_temp_model(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.onnx", name, std::process::id()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_onnx_model_classifies() {
        let bytes = tiny_onnx_model();
        let path = write_temp_model("tiny-classifier", &bytes);
        let sha = hex::encode_upper(Sha256::digest(&bytes));

        let model = OnnxModel::load(&path, Some(&sha)).unwrap();
        assert_eq!(model.fingerprint(), sha.to_lowercase());

        let input = sample_input();
        assert_eq!(model.scores(&input).unwrap().len(), CLASS_COUNT);

        let result = ClassifierEngine::new(Arc::new(model)).classify(&input).unwrap();
        assert!(result.class_id < CLASS_COUNT);
        assert_eq!(result.class_id, 9);
        assert_eq!(result.class_name, ClassLabel::Wortel);
        assert!((result.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_model_fingerprint_mismatch() {
        let path = write_temp_model("tiny-mismatch", &tiny_onnx_model());
        let result = OnnxModel::load(&path, Some(&"0".repeat(64)));
        std::fs::remove_file(&path).ok();

        let err = result.err().unwrap();
        assert!(err.to_string().contains("expected"));
    }

    #[test]
    fn test_missing_model_artifact() {
        let result = OnnxModel::load(Path::new("/nonexistent/model.onnx"), None);
        assert!(result.is_err());
    }
}
