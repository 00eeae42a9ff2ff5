//! Grounded prompt construction for the product chat assistant.
//!
//! The model is restricted to a JSON snapshot of a single product. When the
//! snapshot cannot answer a question the model must reply with
//! [`FALLBACK_ANSWER`] verbatim, which lets callers detect "no answer"
//! deterministically via [`is_fallback`].

use crate::models::{ChatTurn, FaqItem, Product};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Canonical "no grounded answer" reply. Also substituted when the
/// inference call fails.
pub const FALLBACK_ANSWER: &str = "I'm sorry, but this information is not available for this product. You can ask about APR, eligibility, income requirements, credit score, documentation needs, fees, or tenure details.";

/// Fields the model may see, in the order they are serialized.
#[derive(Debug, Serialize)]
struct ProductSnapshot<'a> {
    id: &'a Uuid,
    name: &'a str,
    bank: &'a str,
    loan_type: &'static str,
    rate_apr: f64,
    min_income: f64,
    min_credit_score: i32,
    tenure_min_months: i32,
    tenure_max_months: i32,
    processing_fee_pct: f64,
    prepayment_allowed: bool,
    disbursal_speed: &'static str,
    docs_level: &'static str,
    limited_offer: bool,
    summary: Option<&'a str>,
    faq: &'a [FaqItem],
    terms: &'a Map<String, Value>,
}

impl<'a> From<&'a Product> for ProductSnapshot<'a> {
    fn from(product: &'a Product) -> Self {
        Self {
            id: &product.id,
            name: &product.name,
            bank: &product.bank,
            loan_type: product.loan_type.as_str(),
            rate_apr: product.rate_apr,
            min_income: product.min_income,
            min_credit_score: product.min_credit_score,
            tenure_min_months: product.tenure_min_months,
            tenure_max_months: product.tenure_max_months,
            processing_fee_pct: product.processing_fee_pct,
            prepayment_allowed: product.prepayment_allowed,
            disbursal_speed: product.disbursal_speed.as_str(),
            docs_level: product.docs_level.as_str(),
            limited_offer: product.limited_offer,
            summary: product.summary.as_deref(),
            faq: &product.faq,
            terms: &product.terms,
        }
    }
}

/// A prompt for one grounded question/answer turn.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundedPrompt {
    /// Fixed rules for the model.
    pub system: String,
    /// JSON snapshot of the product.
    pub product_data: String,
    /// Prior turns as `ROLE: content` lines, oldest first.
    pub history: String,
    pub user_message: String,
}

impl GroundedPrompt {
    /// Product data, history and user message, without the system rules.
    ///
    /// Used as the user turn by engines that take the rules on a separate
    /// system channel.
    pub fn body(&self) -> String {
        format!(
            "### PRODUCT DATA\n{}\n\n### CHAT HISTORY\n{}\n\n### USER MESSAGE\n{}\n",
            self.product_data, self.history, self.user_message
        )
    }

    /// Full single-text prompt for engines without a system channel.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.system, self.body())
    }
}

fn system_instruction() -> String {
    format!(
        r#"You are a financial product assistant.

GENERAL RULES:
- You MUST answer ONLY using the PRODUCT DATA block below.
- PRODUCT DATA is the single source of truth.
- DO NOT use external banking knowledge or assumptions.
- If CHAT HISTORY contradicts PRODUCT DATA, ignore the history.
- Be concise, factual, and friendly.

FALLBACK RULE:
If the answer is not available in PRODUCT DATA, reply with exactly this text and nothing else:
{}

STRICT PROHIBITIONS:
DO NOT:
- invent numbers or facts
- add missing benefits or features
- speculate on approval chances or risk scoring
- use generic financial assumptions
- mention anything outside this product

CITATIONS:
When you use a field from PRODUCT DATA, cite it by its exact key in square brackets, e.g. [rate_apr]."#,
        FALLBACK_ANSWER
    )
}

/// Renders prior turns as `ROLE: content` lines in the order given.
pub fn render_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str().to_uppercase(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the grounded prompt for `user_message` about `product`.
pub fn build_prompt(product: &Product, user_message: &str, history: &[ChatTurn]) -> GroundedPrompt {
    let product_data = match serde_json::to_string(&ProductSnapshot::from(product)) {
        Ok(json) => json,
        Err(e) => {
            // Only reachable with non-serializable terms; the model then has
            // nothing to ground on and falls back.
            tracing::warn!("Failed to serialize product {} for prompt: {}", product.id, e);
            "{}".to_string()
        }
    };

    GroundedPrompt {
        system: system_instruction(),
        product_data,
        history: render_history(history),
        user_message: user_message.to_string(),
    }
}

/// True when `answer` is the canonical fallback reply.
pub fn is_fallback(answer: &str) -> bool {
    answer.trim() == FALLBACK_ANSWER
}
