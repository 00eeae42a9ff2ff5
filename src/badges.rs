use crate::models::Product;

pub const LOW_APR: &str = "Low APR";
pub const HIGH_CREDIT_SCORE: &str = "High Credit Score Requirement";
pub const FAST_DISBURSAL: &str = "Fast Disbursal";
pub const FLEXIBLE_TENURE: &str = "Flexible Tenure";

/// At most this many badges are shown per product.
pub const MAX_BADGES: usize = 3;

/// Derives display labels for a product.
///
/// Rules are checked in a fixed order and only the first three matches are
/// kept; a fourth matching rule is dropped.
pub fn get_badges(product: &Product) -> Vec<&'static str> {
    let rules = [
        (product.rate_apr < 10.0, LOW_APR),
        (product.min_credit_score >= 700, HIGH_CREDIT_SCORE),
        (product.disbursal_speed.is_quick(), FAST_DISBURSAL),
        (
            product.tenure_max_months - product.tenure_min_months > 24,
            FLEXIBLE_TENURE,
        ),
    ];

    rules
        .into_iter()
        .filter(|(matched, _)| *matched)
        .map(|(_, label)| label)
        .take(MAX_BADGES)
        .collect()
}
