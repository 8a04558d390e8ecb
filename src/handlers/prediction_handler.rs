use axum::body::Bytes;
use std::sync::Arc;
use std::time::Instant;

use crate::error::PredictionError;
use crate::models::PredictionResponse;
use crate::services::{ClassifierEngine, ImagePreprocessor, NutritionRepository, ResponseAssembler};

/// Runs one uploaded image through preprocess → classify → lookup → assemble.
///
/// Steps run strictly in order and nothing is retried. Decoding and inference
/// happen on the blocking pool so the async workers stay free.
pub struct PredictionHandler {
    preprocessor: Arc<ImagePreprocessor>,
    classifier: Arc<ClassifierEngine>,
    repository: Arc<dyn NutritionRepository>,
    assembler: ResponseAssembler,
}

impl PredictionHandler {
    pub fn new(classifier: Arc<ClassifierEngine>, repository: Arc<dyn NutritionRepository>) -> Self {
        Self {
            preprocessor: Arc::new(ImagePreprocessor::new()),
            classifier,
            repository,
            assembler: ResponseAssembler::new(),
        }
    }

    pub async fn handle_image(&self, image: Bytes) -> Result<PredictionResponse, PredictionError> {
        let started = Instant::now();
        log::info!("📸 Prediction request: {} bytes", image.len());

        let preprocessor = self.preprocessor.clone();
        let classifier = self.classifier.clone();
        let result = tokio::task::spawn_blocking(move || {
            let input = preprocessor.normalize(&image)?;
            classifier.classify(&input)
        })
        .await??;

        log::info!(
            "🥕 Predicted {} (class_id={}, confidence={:.2}%)",
            result.class_name,
            result.class_id,
            result.confidence
        );
        log::debug!("Class probabilities: {:?}", result.probabilities);

        let profile = match self.repository.lookup(result.class_name).await? {
            Some(profile) => profile,
            None => {
                log::warn!("⚠️ No nutrition info for {}", result.class_name);
                return Err(PredictionError::NutritionNotFound);
            }
        };

        let response = self.assembler.assemble(&result, &profile);
        log::info!(
            "✅ Prediction done in {:?}: {} (highest AKG: {} = {})",
            started.elapsed(),
            response.class_name,
            response.highest_akg.name,
            response.highest_akg.value
        );

        Ok(response)
    }
}
