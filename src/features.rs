use serde_json::Value;

use crate::errors::AppError;
use crate::models::{Client, FeatureMap, FeatureValue, DATE_FORMAT};

/// Builds the prediction feature map for a client.
///
/// Identity fields come first; the stored feature bag is merged on top of
/// them. A bag that is not a JSON object is ignored.
pub fn extract_features(client: &Client) -> Result<FeatureMap, AppError> {
    let mut features = FeatureMap::new();

    features.insert("user_id".to_string(), client.id.to_string().into());
    features.insert("first_name".to_string(), client.first_name.as_str().into());
    features.insert("last_name".to_string(), client.last_name.as_str().into());
    features.insert(
        "birth_date".to_string(),
        client.birth_date.format(DATE_FORMAT).to_string().into(),
    );

    match client.features.as_ref().and_then(feature_bag) {
        Some(bag) => {
            for (key, value) in bag {
                features.insert(key, FeatureValue::from_json(&value));
            }
        }
        None if client.features.is_some() => {
            tracing::debug!("Skipping unreadable feature bag for client {}", client.id);
        }
        None => {}
    }

    if features.is_empty() {
        return Err(AppError::BadRequest(format!(
            "no features available for client {}",
            client.id
        )));
    }

    Ok(features)
}

/// The stored bag as an object. JSON text holding an object is accepted too.
fn feature_bag(stored: &Value) -> Option<serde_json::Map<String, Value>> {
    match stored {
        Value::Object(map) => Some(map.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}
