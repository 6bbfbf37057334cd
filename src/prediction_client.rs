use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{FeatureMap, FeatureValue, Prediction};

/// External income prediction service.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Predicts income for the given features, with optional per-feature weights.
    async fn predict(&self, features: &FeatureMap) -> Result<Prediction, AppError>;
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    model_version: &'a str,
    pipeline_version: &'a str,
    features: &'a FeatureMap,
    user_id: String,
}

/// HTTP client for the ML prediction service.
#[derive(Clone)]
pub struct MlClient {
    client: reqwest::Client,
    base_url: String,
    model_version: String,
    pipeline_version: String,
}

impl MlClient {
    /// Creates a new `MlClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the prediction service.
    /// * `timeout` - Per-request timeout.
    /// * `model_version` / `pipeline_version` - Forwarded with every prediction request.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        model_version: impl Into<String>,
        pipeline_version: impl Into<String>,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create ML client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_version: model_version.into(),
            pipeline_version: pipeline_version.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.ml_base_url.clone(),
            Duration::from_secs(config.ml_timeout_secs),
            config.ml_model_version.clone(),
            config.ml_pipeline_version.clone(),
        )
    }

    /// Checks that the prediction service answers `GET /health` with 200.
    pub async fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/health", self.base_url);
        tracing::debug!("Checking ML service health: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("ML service health check failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "ML service returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Predictor for MlClient {
    async fn predict(&self, features: &FeatureMap) -> Result<Prediction, AppError> {
        if features.is_empty() {
            return Err(AppError::BadRequest("features cannot be empty".to_string()));
        }

        let user_id = match features.get("user_id") {
            Some(FeatureValue::Text(id)) => id.clone(),
            _ => String::new(),
        };

        let url = format!("{}/predict", self.base_url);
        tracing::info!(
            "Requesting prediction for user '{}' ({} features, model {}, pipeline {})",
            user_id,
            features.len(),
            self.model_version,
            self.pipeline_version
        );

        let body = PredictRequest {
            model_version: &self.model_version,
            pipeline_version: &self.pipeline_version,
            features,
            user_id,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("ML request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("ML service returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "ML service returned status {}: {}",
                status, error_text
            )));
        }

        let prediction: Prediction = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse ML response: {}", e))
        })?;

        tracing::info!(
            "Prediction completed: {} (id: {})",
            prediction.prediction,
            prediction.id.as_deref().unwrap_or("-")
        );
        Ok(prediction)
    }
}
