use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

/// Circuit breaker guarding calls to the inference API.
pub type InferenceBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for the inference API so an outage fails fast.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures (errors or timeouts) opens the circuit.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// While the circuit is open, chat requests get the fallback answer without
/// waiting on the upstream timeout.
pub fn create_inference_circuit_breaker() -> InferenceBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::futures::CircuitBreaker;
    use failsafe::Error;

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let cb = create_inference_circuit_breaker();

        for _ in 0..5 {
            let result = cb.call(async { Err::<(), &str>("upstream 503") }).await;
            assert!(result.is_err());
        }

        let result = cb.call(async { Ok::<(), &str>(()) }).await;
        match result {
            Err(Error::Rejected) => {}
            _ => panic!("Expected circuit to be open and reject requests"),
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_allows_success() {
        let cb = create_inference_circuit_breaker();

        let result = cb.call(async { Ok::<&str, &str>("answer") }).await;

        assert_eq!(result.unwrap(), "answer");
    }
}
