use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client_store::ClientStore;
use crate::credit_limit;
use crate::errors::{AppError, ResultExt};
use crate::features::extract_features;
use crate::models::{
    feature_f64, feature_i64, CreditLimitInput, CreditLimitResult, FeatureMap, ScoringResult,
};
use crate::prediction_client::Predictor;
use crate::promo::PromoProvider;

/// Composes feature extraction, prediction, credit limits and promos into a
/// single scoring result.
#[derive(Clone)]
pub struct ScoringService {
    store: Arc<dyn ClientStore>,
    predictor: Arc<dyn Predictor>,
    promos: Arc<dyn PromoProvider>,
}

impl ScoringService {
    pub fn new(
        store: Arc<dyn ClientStore>,
        predictor: Arc<dyn Predictor>,
        promos: Arc<dyn PromoProvider>,
    ) -> Self {
        Self {
            store,
            predictor,
            promos,
        }
    }

    pub async fn calculate_scoring(&self, client_id: i64) -> Result<ScoringResult, AppError> {
        tracing::debug!("Calculating scoring for client {}", client_id);

        let client = self
            .store
            .get_by_id(client_id)
            .await
            .with_context(|| format!("failed to get client {} for scoring", client_id))?;

        let features = extract_features(&client).context("failed to extract features")?;
        tracing::debug!("Extracted {} features for client {}", features.len(), client_id);

        let prediction = self
            .predictor
            .predict(&features)
            .await
            .context("failed to predict scoring")?;

        let credit_limit = credit_limit::calculate(&credit_limit_input(
            &features,
            prediction.prediction,
        ));
        let recommendations = self.recommendations(prediction.prediction).await;
        let (positive, negative) =
            split_factors_by_sign(prediction.explanation.as_ref().unwrap_or(&BTreeMap::new()));

        let result = assemble(prediction.prediction, recommendations, credit_limit, positive, negative);

        tracing::info!(
            "Scoring calculated for client {}: income {:.2}, limit {:.2}",
            client_id,
            result.predict_income,
            result.credit_limit
        );
        Ok(result)
    }

    /// Promo lookup is best effort: a provider failure yields no recommendations.
    async fn recommendations(&self, prediction: f64) -> Vec<String> {
        let income_band = prediction as i64;
        match self.promos.get_promos(income_band, prediction).await {
            Ok(promos) => promos,
            Err(e) => {
                tracing::error!("Failed to get promos: {}", e);
                Vec::new()
            }
        }
    }
}

/// Reads the bureau/account fields the affordability formula needs.
pub fn credit_limit_input(features: &FeatureMap, predicted_income: f64) -> CreditLimitInput {
    CreditLimitInput {
        predicted_income,
        active_cc_max_limit: feature_f64(features, "hdb_bki_active_cc_max_limit"),
        outstand_sum: feature_f64(features, "hdb_outstand_sum"),
        overdue_sum: feature_f64(features, "ovrd_sum"),
        blacklist_flag: feature_i64(features, "blacklist_flag"),
        turn_cur_credit_avg: feature_f64(features, "turn_cur_cr_avg_v2"),
    }
}

/// Splits explanation weights into formatted positive and negative factors.
///
/// Zero weights are dropped. Positive factors are ordered strongest first,
/// negative factors most negative first; ties keep name order.
pub fn split_factors_by_sign(explanation: &BTreeMap<String, f64>) -> (Vec<String>, Vec<String>) {
    let mut positive: Vec<(&String, f64)> = explanation
        .iter()
        .filter(|(_, v)| **v > 0.0)
        .map(|(k, v)| (k, *v))
        .collect();
    let mut negative: Vec<(&String, f64)> = explanation
        .iter()
        .filter(|(_, v)| **v < 0.0)
        .map(|(k, v)| (k, *v))
        .collect();

    positive.sort_by(|a, b| b.1.total_cmp(&a.1));
    negative.sort_by(|a, b| a.1.total_cmp(&b.1));

    (format_factors(&positive), format_factors(&negative))
}

fn format_factors(factors: &[(&String, f64)]) -> Vec<String> {
    factors
        .iter()
        .map(|(name, value)| format!("{}: {:.2}", name, value))
        .collect()
}

fn assemble(
    prediction: f64,
    recommendations: Vec<String>,
    credit_limit: CreditLimitResult,
    positive_factors: Vec<String>,
    negative_factors: Vec<String>,
) -> ScoringResult {
    let mut factors = BTreeMap::new();
    factors.insert("predicted_income".to_string(), prediction);
    factors.insert(
        "credit_limit".to_string(),
        credit_limit.recommendation_credit_limit,
    );

    ScoringResult {
        predict_income: prediction,
        recommendations,
        factors,
        positive_factors,
        negative_factors,
        credit_limit: credit_limit.recommendation_credit_limit,
        max_credit_limit: credit_limit.limit_legal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureValue;

    #[test]
    fn test_split_factors_drops_zero_and_orders_by_weight() {
        let explanation: BTreeMap<String, f64> = [
            ("age".to_string(), 0.5),
            ("salary".to_string(), 1234.567),
            ("debt".to_string(), -200.0),
            ("overdue".to_string(), -1500.129),
            ("region".to_string(), 0.0),
        ]
        .into_iter()
        .collect();

        let (positive, negative) = split_factors_by_sign(&explanation);
        assert_eq!(positive, vec!["salary: 1234.57", "age: 0.50"]);
        assert_eq!(negative, vec!["overdue: -1500.13", "debt: -200.00"]);
    }

    #[test]
    fn test_credit_limit_input_defaults_missing_and_text_fields() {
        let mut features = FeatureMap::new();
        features.insert(
            "hdb_bki_active_cc_max_limit".into(),
            FeatureValue::Number(20_000.0),
        );
        features.insert("blacklist_flag".into(), FeatureValue::Number(1.0));
        features.insert("ovrd_sum".into(), FeatureValue::Text("n/a".into()));

        let input = credit_limit_input(&features, 75_000.0);
        assert_eq!(input.predicted_income, 75_000.0);
        assert_eq!(input.active_cc_max_limit, 20_000.0);
        assert_eq!(input.blacklist_flag, 1);
        assert_eq!(input.overdue_sum, 0.0);
        assert_eq!(input.outstand_sum, 0.0);
        assert_eq!(input.turn_cur_credit_avg, 0.0);
    }
}
