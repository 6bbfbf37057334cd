//! Shared in-memory fakes for the service and HTTP tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use credit_scoring_api::client_store::{clamp_page, validate_id, ClientStore};
use credit_scoring_api::config::Config;
use credit_scoring_api::errors::AppError;
use credit_scoring_api::handlers::AppState;
use credit_scoring_api::import::ImportService;
use credit_scoring_api::models::{
    Client, ClientFilter, FeatureMap, NewClient, Prediction, MAX_PAGE_SIZE,
};
use credit_scoring_api::prediction_client::Predictor;
use credit_scoring_api::promo::{PromoCatalog, PromoProvider, StaticPromoProvider};
use credit_scoring_api::scoring::ScoringService;
use credit_scoring_api::services::ClientService;

pub fn test_config() -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        db_max_connections: 1,
        ml_base_url: "http://localhost:5000".to_string(),
        ml_timeout_secs: 5,
        ml_model_version: "v1".to_string(),
        ml_pipeline_version: "v1".to_string(),
        import_max_bytes: 1024 * 1024,
        request_timeout_secs: 30,
        rate_limit_per_second: 0,
        rate_limit_burst: 20,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn new_client(first: &str, last: &str, features: Option<serde_json::Value>) -> NewClient {
    NewClient {
        first_name: first.to_string(),
        last_name: last.to_string(),
        middle_name: None,
        birth_date: date(1990, 1, 15),
        features,
    }
}

/// In-memory `ClientStore` with switches for simulating failures.
#[derive(Default)]
pub struct InMemoryClientStore {
    clients: Mutex<BTreeMap<i64, Client>>,
    next_id: AtomicI64,
    fail_batches: AtomicBool,
    rejected_last_name: Mutex<Option<String>>,
    pub search_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl InMemoryClientStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every `batch_create` fail.
    pub fn fail_batches(&self) {
        self.fail_batches.store(true, Ordering::SeqCst);
    }

    /// Makes inserts of clients with this last name fail.
    pub fn reject_last_name(&self, last_name: &str) {
        *self.rejected_last_name.lock().unwrap() = Some(last_name.to_string());
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<Client> {
        self.clients.lock().unwrap().values().cloned().collect()
    }

    fn is_rejected(&self, client: &NewClient) -> bool {
        self.rejected_last_name.lock().unwrap().as_deref() == Some(client.last_name.as_str())
    }

    fn insert(&self, client: &NewClient) -> Client {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let stored = Client {
            id,
            first_name: client.first_name.clone(),
            last_name: client.last_name.clone(),
            middle_name: client.middle_name.clone(),
            birth_date: client.birth_date,
            features: client.features.clone(),
            created_at: now,
            updated_at: now,
        };
        self.clients.lock().unwrap().insert(id, stored.clone());
        stored
    }
}

fn contains_ci(value: Option<&str>, needle: &Option<String>) -> bool {
    match needle {
        Some(needle) => value
            .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        None => true,
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn create(&self, client: &NewClient) -> Result<Client, AppError> {
        if self.is_rejected(client) {
            return Err(AppError::InternalError("insert rejected".to_string()));
        }
        Ok(self.insert(client))
    }

    async fn batch_create(&self, clients: &[NewClient]) -> Result<usize, AppError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batches.load(Ordering::SeqCst) || clients.iter().any(|c| self.is_rejected(c))
        {
            return Err(AppError::InternalError("batch insert failed".to_string()));
        }
        for client in clients {
            self.insert(client);
        }
        Ok(clients.len())
    }

    async fn get_by_id(&self, id: i64) -> Result<Client, AppError> {
        validate_id(id)?;
        self.clients
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("client {} not found", id)))
    }

    async fn search(&self, filter: &ClientFilter) -> Result<Vec<Client>, AppError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .clients
            .lock()
            .unwrap()
            .values()
            .filter(|c| contains_ci(Some(&c.first_name), &filter.first_name))
            .filter(|c| contains_ci(Some(&c.last_name), &filter.last_name))
            .filter(|c| contains_ci(c.middle_name.as_deref(), &filter.middle_name))
            .filter(|c| filter.birth_date.map_or(true, |d| c.birth_date == d))
            .take(MAX_PAGE_SIZE as usize)
            .cloned()
            .collect())
    }

    async fn update(&self, client: &Client) -> Result<Client, AppError> {
        validate_id(client.id)?;
        let mut clients = self.clients.lock().unwrap();
        let stored = clients
            .get_mut(&client.id)
            .ok_or_else(|| AppError::NotFound(format!("client {} not found", client.id)))?;
        *stored = Client {
            updated_at: Utc::now(),
            created_at: stored.created_at,
            ..client.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        validate_id(id)?;
        self.clients
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("client {} not found", id)))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Client>, AppError> {
        let (limit, offset) = clamp_page(limit, offset);
        let mut clients: Vec<Client> = self.clients.lock().unwrap().values().cloned().collect();
        clients.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(clients
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

/// Predictor returning a fixed prediction and recording the features it saw.
pub struct StubPredictor {
    prediction: Prediction,
    pub last_features: Mutex<Option<FeatureMap>>,
}

impl StubPredictor {
    pub fn new(prediction: f64, explanation: &[(&str, f64)]) -> Arc<Self> {
        let explanation = (!explanation.is_empty()).then(|| {
            explanation
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect()
        });
        Arc::new(Self {
            prediction: Prediction {
                prediction,
                explanation,
                id: None,
            },
            last_features: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Predictor for StubPredictor {
    async fn predict(&self, features: &FeatureMap) -> Result<Prediction, AppError> {
        *self.last_features.lock().unwrap() = Some(features.clone());
        Ok(self.prediction.clone())
    }
}

pub struct FailingPredictor;

#[async_trait]
impl Predictor for FailingPredictor {
    async fn predict(&self, _features: &FeatureMap) -> Result<Prediction, AppError> {
        Err(AppError::ExternalApiError(
            "ML service returned status 500".to_string(),
        ))
    }
}

/// Predictor that never answers within a test-sized timeout.
pub struct SlowPredictor;

#[async_trait]
impl Predictor for SlowPredictor {
    async fn predict(&self, _features: &FeatureMap) -> Result<Prediction, AppError> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Err(AppError::ExternalApiError("ML service too slow".to_string()))
    }
}

pub struct FailingPromoProvider;

#[async_trait]
impl PromoProvider for FailingPromoProvider {
    async fn get_promos(&self, _income_band: i64, _raw_score: f64) -> Result<Vec<String>, AppError> {
        Err(AppError::InternalError("promo catalog unavailable".to_string()))
    }
}

pub fn standard_promos() -> Arc<StaticPromoProvider> {
    Arc::new(StaticPromoProvider::new(PromoCatalog::standard()))
}

pub fn app_state(
    store: Arc<InMemoryClientStore>,
    predictor: Arc<dyn Predictor>,
) -> Arc<AppState> {
    app_state_with_config(test_config(), store, predictor)
}

pub fn app_state_with_config(
    config: Config,
    store: Arc<InMemoryClientStore>,
    predictor: Arc<dyn Predictor>,
) -> Arc<AppState> {
    Arc::new(AppState {
        config,
        client_service: ClientService::new(store.clone()),
        scoring_service: ScoringService::new(store.clone(), predictor, standard_promos()),
        import_service: ImportService::new(store),
    })
}
