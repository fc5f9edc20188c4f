//! Weighted composite score.

use super::FactorScores;
use griev_core::config::WeightConfig;

/// Combine the factor scores into a composite percentage in [0.0, 100.0].
///
/// Factors are clamped to [0.0, 1.0] first so a misbehaving scorer can never
/// push the composite outside its domain, and the result is clamped again so
/// float rounding at the edges cannot either.
#[must_use]
pub fn composite_percent(factors: &FactorScores, weights: &WeightConfig) -> f64 {
    let text = factors.text.clamp(0.0, 1.0);
    let location = factors.location.clamp(0.0, 1.0);
    let category = factors.category.clamp(0.0, 1.0);

    let weighted = weights.text.mul_add(
        text,
        weights.location.mul_add(location, weights.category * category),
    );
    (weighted * 100.0).clamp(0.0, 100.0)
}
