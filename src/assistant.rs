/// Grounded product assistant
///
/// Answers one chat question about one product:
/// 1. Build the grounded prompt (product snapshot + history + question)
/// 2. Call the inference API under a timeout and circuit breaker
/// 3. Substitute the fallback answer on any upstream failure
/// 4. Flag fallback answers and extract field citations
use crate::circuit_breaker::{create_inference_circuit_breaker, InferenceBreaker};
use crate::citations::extract_citations;
use crate::errors::AppError;
use crate::gemini_client::GeminiClient;
use crate::models::{AskResponse, ChatTurn, Product};
use crate::prompt::{build_prompt, is_fallback, FALLBACK_ANSWER};
use failsafe::futures::CircuitBreaker;
use std::time::Duration;

pub struct GroundedAssistant {
    client: GeminiClient,
    breaker: InferenceBreaker,
    timeout: Duration,
}

impl GroundedAssistant {
    pub fn new(client: GeminiClient, timeout: Duration) -> Self {
        Self {
            client,
            breaker: create_inference_circuit_breaker(),
            timeout,
        }
    }

    /// Answers `message` about `product`. Never fails: upstream problems
    /// produce the fallback answer with `fallback = true`.
    pub async fn ask(&self, product: &Product, message: &str, history: &[ChatTurn]) -> AskResponse {
        let prompt = build_prompt(product, message, history);

        let answer = match self.generate(&prompt.system, &prompt.body()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(
                    "Inference failed for product {}, using fallback: {}",
                    product.id,
                    e
                );
                FALLBACK_ANSWER.to_string()
            }
        };

        let fallback = is_fallback(&answer);
        if fallback {
            tracing::info!("No grounded answer for product {}", product.id);
            return AskResponse {
                answer: FALLBACK_ANSWER.to_string(),
                citations: Vec::new(),
                fallback,
            };
        }

        let citations = extract_citations(&answer, product);
        tracing::debug!(
            "Answer for product {} cites {} field(s)",
            product.id,
            citations.len()
        );

        AskResponse {
            answer,
            citations,
            fallback,
        }
    }

    async fn generate(&self, system: &str, body: &str) -> Result<String, AppError> {
        let timeout = self.timeout;
        let call = async {
            tokio::time::timeout(timeout, self.client.generate_content(Some(system), body))
                .await
                .map_err(|_| {
                    AppError::ExternalApiError(format!(
                        "Gemini call timed out after {}s",
                        timeout.as_secs_f64()
                    ))
                })?
        };

        match self.breaker.call(call).await {
            Ok(text) => Ok(text),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(AppError::ExternalApiError(
                "Inference circuit breaker is open".to_string(),
            )),
        }
    }
}
