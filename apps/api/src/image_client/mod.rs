//! Image provider client, the single point of entry for text-to-image calls.
//!
//! No other module may call the provider API directly; everything goes through
//! the `ImageProvider` trait so the generation client can be tested offline.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
/// The model used for all illustrations.
pub const MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";
const IMAGE_QUALITY: &str = "standard";
const IMAGE_STYLE: &str = "vivid";
const MAX_RETRIES: u32 = 3;

const CODE_RATE_LIMIT: &str = "rate_limit_exceeded";
const CODE_BILLING_LIMIT: &str = "billing_hard_limit_reached";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Image provider rate limit reached")]
    RateLimited,

    #[error("Image provider billing limit reached")]
    BillingLimit,

    #[error("Image provider error (status {status}, code {code:?}): {message}")]
    Other {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Image provider returned no image URL")]
    EmptyImage,
}

impl ProviderError {
    /// Billing and rate limits are recoverable with a fallback illustration.
    pub fn is_quota(&self) -> bool {
        matches!(self, ProviderError::RateLimited | ProviderError::BillingLimit)
    }

    /// Short machine-readable kind for attempt tables and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::RateLimited => "rate_limited",
            ProviderError::BillingLimit => "billing_limited",
            ProviderError::Other { .. } => "provider_error",
            ProviderError::Http(_) => "http_error",
            ProviderError::Parse(_) => "parse_error",
            ProviderError::EmptyImage => "empty_image",
        }
    }
}

/// Text-to-image capability: one square image per call, returned as a short-lived URL.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    quality: &'a str,
    style: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
    code: Option<String>,
}

/// Maps a non-success response to a provider error.
///
/// The error `code` wins over the status so a 429 carrying
/// `billing_hard_limit_reached` is classified as a billing limit.
pub fn classify_error(status: u16, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<OpenAiError>(body).ok();
    let code = parsed.as_ref().and_then(|e| e.error.code.clone());

    match code.as_deref() {
        Some(CODE_BILLING_LIMIT) => ProviderError::BillingLimit,
        Some(CODE_RATE_LIMIT) => ProviderError::RateLimited,
        _ if status == 429 => ProviderError::RateLimited,
        _ => ProviderError::Other {
            status,
            code,
            message: parsed.map(|e| e.error.message).unwrap_or_else(|| body.to_string()),
        },
    }
}

/// OpenAI Images API client.
/// Retries transport failures and 5xx with exponential backoff; quota errors
/// are returned immediately so the caller can fall back.
#[derive(Clone)]
pub struct OpenAiImageProvider {
    client: Client,
    api_key: String,
}

impl OpenAiImageProvider {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
        })
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request_body = ImageRequest {
            model: MODEL,
            prompt,
            n: 1,
            size: IMAGE_SIZE,
            quality: IMAGE_QUALITY,
            style: IMAGE_STYLE,
        };

        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Image call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(OPENAI_IMAGES_URL)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ProviderError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Image API returned {}: {}", status, body);
                last_error = Some(classify_error(status.as_u16(), &body));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(classify_error(status.as_u16(), &body));
            }

            let body: ImageResponse = response.json().await?;
            let url = body
                .data
                .into_iter()
                .find_map(|d| d.url)
                .ok_or(ProviderError::EmptyImage)?;

            debug!("Image call succeeded on attempt {}", attempt + 1);
            return Ok(url);
        }

        Err(last_error.unwrap_or(ProviderError::EmptyImage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_billing_code() {
        let body = r#"{"error":{"message":"Billing hard limit has been reached","code":"billing_hard_limit_reached"}}"#;
        assert!(matches!(
            classify_error(400, body),
            ProviderError::BillingLimit
        ));
    }

    #[test]
    fn test_classify_rate_limit_code_and_status() {
        let body = r#"{"error":{"message":"slow down","code":"rate_limit_exceeded"}}"#;
        assert!(matches!(classify_error(429, body), ProviderError::RateLimited));
        assert!(matches!(classify_error(429, "not json"), ProviderError::RateLimited));
    }

    #[test]
    fn test_classify_other_keeps_message() {
        let body = r#"{"error":{"message":"Your request was rejected","code":"content_policy_violation"}}"#;
        match classify_error(400, body) {
            ProviderError::Other {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("content_policy_violation"));
                assert_eq!(message, "Your request was rejected");
            }
            other => panic!("expected Other, got {other:?}"),
        }
    }

    #[test]
    fn test_quota_errors_are_recoverable() {
        assert!(ProviderError::RateLimited.is_quota());
        assert!(ProviderError::BillingLimit.is_quota());
        assert!(!ProviderError::EmptyImage.is_quota());
    }
}
