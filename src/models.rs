use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeMap;

use crate::errors::AppError;

/// Date format used on the HTTP surface and in the prediction payload (`DD-MM-YYYY`).
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Maximum page size for list endpoints.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Maximum length of the name fields.
pub const MAX_NAME_LENGTH: usize = 100;

// ============ Database Models ============

/// A persisted client record.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier for the client.
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    /// Date of birth (no time component).
    pub birth_date: NaiveDate,
    /// Opaque feature bag forwarded to the prediction service.
    pub features: Option<Value>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Timestamp of last update.
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// First and last name must be non-blank. The birth date is always
    /// present by type.
    pub fn is_valid(&self) -> bool {
        !self.first_name.trim().is_empty() && !self.last_name.trim().is_empty()
    }
}

/// A client that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub birth_date: NaiveDate,
    pub features: Option<Value>,
}

impl NewClient {
    /// Same name check as [`Client::is_valid`].
    pub fn is_valid(&self) -> bool {
        !self.first_name.trim().is_empty() && !self.last_name.trim().is_empty()
    }
}

// ============ Features ============

/// A single dynamically-typed feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view of the value; text reads as zero.
    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Number(n) if n.is_finite() => *n,
            _ => 0.0,
        }
    }

    /// Integer view of the value (truncating); text reads as zero.
    pub fn as_i64(&self) -> i64 {
        // `as` saturates and maps NaN to zero
        self.as_f64() as i64
    }

    /// Converts an arbitrary JSON value into a feature value.
    ///
    /// Booleans become `1.0`/`0.0`, `null` becomes `0.0`, nested arrays and
    /// objects are kept as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => FeatureValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => FeatureValue::Text(s.clone()),
            Value::Bool(b) => FeatureValue::Number(if *b { 1.0 } else { 0.0 }),
            Value::Null => FeatureValue::Number(0.0),
            other => FeatureValue::Text(other.to_string()),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

/// Feature name -> value, ordered by name.
pub type FeatureMap = BTreeMap<String, FeatureValue>;

/// Reads a numeric feature, defaulting to zero when absent.
pub fn feature_f64(features: &FeatureMap, key: &str) -> f64 {
    features.get(key).map(FeatureValue::as_f64).unwrap_or(0.0)
}

/// Reads an integer feature, defaulting to zero when absent.
pub fn feature_i64(features: &FeatureMap, key: &str) -> i64 {
    features.get(key).map(FeatureValue::as_i64).unwrap_or(0)
}

// ============ Scoring ============

/// Inputs of the affordability formula.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CreditLimitInput {
    /// Predicted monthly income.
    pub predicted_income: f64,
    /// Current maximum revolving-credit limit.
    pub active_cc_max_limit: f64,
    /// Outstanding balance.
    pub outstand_sum: f64,
    /// Overdue amount.
    pub overdue_sum: f64,
    /// 1 when the client is blacklisted.
    pub blacklist_flag: i64,
    /// Average monthly payment over the current credit lines.
    pub turn_cur_credit_avg: f64,
}

/// Outputs of the affordability formula.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CreditLimitResult {
    pub limit_legal: f64,
    pub recommendation_credit_limit: f64,
}

/// Response of the prediction service.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Prediction {
    pub prediction: f64,
    #[serde(default)]
    pub explanation: Option<BTreeMap<String, f64>>,
    #[serde(default, alias = "uid")]
    pub id: Option<String>,
}

/// Scoring outcome for a single client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub predict_income: f64,
    pub recommendations: Vec<String>,
    pub factors: BTreeMap<String, f64>,
    pub positive_factors: Vec<String>,
    pub negative_factors: Vec<String>,
    pub credit_limit: f64,
    pub max_credit_limit: f64,
}

// ============ Promotions ============

/// Promo string attached to a half-open income range `[min_income, max_income)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoAction {
    pub min_income: i64,
    pub max_income: i64,
    pub promo: String,
}

impl PromoAction {
    pub fn new(min_income: i64, max_income: i64, promo: &str) -> Self {
        Self {
            min_income,
            max_income,
            promo: promo.to_string(),
        }
    }

    pub fn contains(&self, income: i64) -> bool {
        income >= self.min_income && income < self.max_income
    }
}

// ============ API Request/Response Models ============

/// Request payload for creating a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateClientRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Birth date, `DD-MM-YYYY`.
    pub birth_date: String,
    #[serde(default)]
    pub features: Option<serde_json::Map<String, Value>>,
}

/// Request payload for a partial update. Absent or empty fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateClientRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub features: Option<serde_json::Map<String, Value>>,
}

/// Client as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub birth_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Value>,
}

impl From<Client> for ClientResponse {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            first_name: client.first_name,
            last_name: client.last_name,
            middle_name: client.middle_name.filter(|m| !m.is_empty()),
            birth_date: client.birth_date.format(DATE_FORMAT).to_string(),
            features: client.features,
        }
    }
}

/// Query parameters of `GET /api/clients/search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Birth date, `DD-MM-YYYY`.
    #[serde(default)]
    pub birth_date: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SearchParams {
    pub fn is_empty(&self) -> bool {
        non_empty(&self.first_name).is_none()
            && non_empty(&self.last_name).is_none()
            && non_empty(&self.middle_name).is_none()
            && non_empty(&self.birth_date).is_none()
    }

    /// Validates the parameters into a store filter.
    pub fn to_filter(&self) -> Result<ClientFilter, AppError> {
        if self.is_empty() {
            return Err(AppError::BadRequest(
                "at least one search parameter is required".to_string(),
            ));
        }

        let birth_date = non_empty(&self.birth_date)
            .map(parse_api_date)
            .transpose()?;

        Ok(ClientFilter {
            first_name: non_empty(&self.first_name).map(str::to_string),
            last_name: non_empty(&self.last_name).map(str::to_string),
            middle_name: non_empty(&self.middle_name).map(str::to_string),
            birth_date,
        })
    }
}

/// Validated search filter handed to the store. Name fields match as
/// case-insensitive substrings, the birth date matches exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Query parameters of `GET /api/clients`. Unparseable values fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
}

impl PaginationParams {
    /// Returns `(limit, offset)` clamped to the allowed range.
    pub fn resolve(&self) -> (i64, i64) {
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l > 0 && *l <= MAX_PAGE_SIZE)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = self
            .offset
            .as_deref()
            .and_then(|o| o.trim().parse::<i64>().ok())
            .filter(|o| *o >= 0)
            .unwrap_or(0);
        (limit, offset)
    }
}

/// Outcome of a CSV import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    pub success_count: usize,
    pub failure_count: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Standard JSON error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            code: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Generic success message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Parses a `DD-MM-YYYY` date from the API.
pub fn parse_api_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        AppError::BadRequest(format!(
            "invalid birth_date format: {} (expected DD-MM-YYYY)",
            value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_value_conversions_are_total() {
        assert_eq!(FeatureValue::Number(12.9).as_i64(), 12);
        assert_eq!(FeatureValue::Text("abc".into()).as_f64(), 0.0);
        assert_eq!(FeatureValue::Number(f64::NAN).as_f64(), 0.0);
        assert_eq!(FeatureValue::from_json(&json!(true)), FeatureValue::Number(1.0));
        assert_eq!(FeatureValue::from_json(&json!(null)), FeatureValue::Number(0.0));
        assert_eq!(
            FeatureValue::from_json(&json!([1, 2])),
            FeatureValue::Text("[1,2]".into())
        );
    }

    #[test]
    fn test_feature_value_serializes_untagged() {
        let mut map = FeatureMap::new();
        map.insert("a".into(), FeatureValue::Number(1.5));
        map.insert("b".into(), FeatureValue::Text("x".into()));
        assert_eq!(serde_json::to_value(&map).unwrap(), json!({"a": 1.5, "b": "x"}));
    }

    #[test]
    fn test_new_client_validity_checks_names_only() {
        let client = NewClient {
            first_name: "Ivan".into(),
            last_name: "Petrov".into(),
            middle_name: None,
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 15).unwrap(),
            features: None,
        };
        assert!(client.is_valid());
        assert!(!NewClient {
            last_name: "   ".into(),
            ..client.clone()
        }
        .is_valid());
        assert!(!NewClient {
            first_name: String::new(),
            ..client
        }
        .is_valid());
    }

    #[test]
    fn test_search_params_empty() {
        assert!(SearchParams::default().is_empty());
        let blank = SearchParams {
            first_name: Some("  ".into()),
            ..Default::default()
        };
        assert!(blank.is_empty());
        assert!(blank.to_filter().unwrap_err().is_bad_request());
    }

    #[test]
    fn test_search_params_rejects_malformed_date() {
        let params = SearchParams {
            birth_date: Some("1990-01-15".into()),
            ..Default::default()
        };
        assert!(params.to_filter().is_err());

        let params = SearchParams {
            last_name: Some("Ivanov".into()),
            birth_date: Some("15-01-1990".into()),
            ..Default::default()
        };
        let filter = params.to_filter().unwrap();
        assert_eq!(filter.last_name.as_deref(), Some("Ivanov"));
        assert_eq!(filter.birth_date, NaiveDate::from_ymd_opt(1990, 1, 15));
    }

    #[test]
    fn test_pagination_defaults_and_bounds() {
        assert_eq!(PaginationParams::default().resolve(), (100, 0));

        let params = PaginationParams {
            limit: Some("5000".into()),
            offset: Some("-3".into()),
        };
        assert_eq!(params.resolve(), (100, 0));

        let params = PaginationParams {
            limit: Some("25".into()),
            offset: Some("50".into()),
        };
        assert_eq!(params.resolve(), (25, 50));

        let params = PaginationParams {
            limit: Some("abc".into()),
            offset: None,
        };
        assert_eq!(params.resolve(), (100, 0));
    }
}
