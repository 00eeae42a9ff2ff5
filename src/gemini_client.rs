use crate::errors::AppError;
use crate::models::ChatRole;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One turn of a `generateContent` conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.into()),
            }],
            role: role.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, if any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Gemini's name for a chat role. Assistant turns are `model` turns.
pub fn gemini_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "model",
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Creates a new `GeminiClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API host, e.g. `https://generativelanguage.googleapis.com`.
    /// * `api_key` - The API key sent as the `key` query parameter.
    /// * `model` - Model name, e.g. `gemini-2.5-flash`.
    /// * `timeout` - Transport-level timeout for a single request.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Gemini client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one prompt and returns the model's text.
    ///
    /// # Arguments
    ///
    /// * `system` - Rules sent on the `systemInstruction` channel.
    /// * `user_text` - The single user turn.
    ///
    /// # Returns
    ///
    /// * `Result<String, AppError>` - The answer text, or an error for transport
    ///   failures, non-2xx statuses, unparsable bodies and empty candidates.
    pub async fn generate_content(
        &self,
        system: Option<&str>,
        user_text: &str,
    ) -> Result<String, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ),
            &[("key", self.api_key.as_str())],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        let body = GenerateContentRequest {
            contents: vec![Content::text(Some(gemini_role(ChatRole::User)), user_text)],
            system_instruction: system.map(|s| Content::text(None, s)),
        };

        tracing::info!("Calling Gemini model {}", self.model);
        // Redact key from logs to prevent credential exposure
        tracing::debug!(
            "Gemini URL: {}/v1beta/models/{}:generateContent?key=[REDACTED]",
            self.base_url,
            self.model
        );

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Gemini returned {}: {}",
                status, error_text
            )));
        }

        let data: GenerateContentResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Gemini response: {}", e))
        })?;

        data.text().ok_or_else(|| {
            AppError::ExternalApiError("Gemini response contained no text".to_string())
        })
    }
}
