//! Analysis model client
//!
//! [`Analyzer`] is what the processor talks to. [`LlmAnalyzer`] calls an
//! OpenAI-compatible `/chat/completions` endpoint, throttled with a
//! token-bucket limiter so a backlog cannot exceed the configured requests
//! per minute.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WorkerError, WorkerResult};
use crate::prompt::Prompt;

const USER_AGENT: &str = concat!("bizval-worker/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Send the prompt and return the model's raw reply text
    async fn complete(&self, prompt: &Prompt) -> WorkerResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatTurn<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
pub struct LlmAnalyzer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl LlmAnalyzer {
    pub fn new(
        api_url: &str,
        api_key: String,
        model: String,
        timeout_secs: u64,
        requests_per_minute: u32,
    ) -> WorkerResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WorkerError::Permanent(format!("HTTP client: {}", e)))?;

        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_url)
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn complete(&self, prompt: &Prompt) -> WorkerResult<String> {
        self.rate_limiter.until_ready().await;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatTurn {
                    role: "system",
                    content: &prompt.system,
                },
                ChatTurn {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat { kind: "json_object" },
        };

        tracing::debug!(model = %self.model, "Requesting analysis from model");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::Transient(format!("Model request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = format!("Model API returned {}: {}", status.as_u16(), error_text);
            // Throttling and server faults clear up; other client errors do not
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                WorkerError::Transient(message)
            } else {
                WorkerError::Permanent(message)
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::Transient(format!("Unreadable model response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| WorkerError::Transient("Model returned an empty reply".to_string()))
    }
}

/// Extract the JSON object from a model reply
///
/// Tolerates markdown code fences and text around the object.
pub fn parse_json_reply(reply: &str) -> WorkerResult<Value> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let candidate = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(WorkerError::Transient(
                "Model reply contains no JSON object".to_string(),
            ))
        }
    };
    serde_json::from_str(candidate)
        .map_err(|e| WorkerError::Transient(format!("Model reply is not valid JSON: {}", e)))
}
