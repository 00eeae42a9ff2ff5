//! Weighted match scoring between a borrower profile and catalog products.
//!
//! All terms are additive and a larger score means a better match:
//!
//! - APR: `(15 - rate_apr) * 2`, negative for APRs above 15.
//! - Income eligibility: `+10`.
//! - Credit score eligibility: `+10`.
//! - Loan type match: `+5`.
//! - Urgent profile and fast/instant disbursal: `+5`.

use crate::models::{Product, ScoredProduct, UserProfile};

const APR_PIVOT: f64 = 15.0;
const APR_WEIGHT: f64 = 2.0;
const INCOME_BONUS: f64 = 10.0;
const CREDIT_SCORE_BONUS: f64 = 10.0;
const LOAN_TYPE_BONUS: f64 = 5.0;
const URGENCY_BONUS: f64 = 5.0;

/// Number of matches returned when the caller does not ask for a count.
pub const DEFAULT_TOP_N: usize = 5;

/// Computes the match score of `product` for `user`.
pub fn score(product: &Product, user: &UserProfile) -> f64 {
    let mut score = (APR_PIVOT - product.rate_apr) * APR_WEIGHT;

    if user.income >= product.min_income {
        score += INCOME_BONUS;
    }

    if user.credit_score >= product.min_credit_score {
        score += CREDIT_SCORE_BONUS;
    }

    if user.loan_type == product.loan_type.as_str() {
        score += LOAN_TYPE_BONUS;
    }

    if user.urgency == "high" && product.disbursal_speed.is_quick() {
        score += URGENCY_BONUS;
    }

    score
}

/// Returns the `n` best matches, highest score first.
///
/// The sort is stable, so products with equal scores keep their catalog order.
/// The input slice is left untouched.
pub fn top_matches(products: &[Product], user: &UserProfile, n: usize) -> Vec<ScoredProduct> {
    let mut scored: Vec<ScoredProduct> = products
        .iter()
        .map(|product| ScoredProduct {
            score: score(product, user),
            product: product.clone(),
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(n);

    tracing::debug!(
        "Ranked {} products for loan_type={}, returning {}",
        products.len(),
        user.loan_type,
        scored.len()
    );

    scored
}
