/// LLM client: the single point of entry for text generation.
///
/// Two backends are supported, chosen by `GENERATION_BACKEND`: any
/// OpenAI-compatible chat completions endpoint, and Cohere chat. No other
/// module talks to a provider directly.
use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

pub mod prompts;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const COHERE_CHAT_URL: &str = "https://api.cohere.ai/v1/chat";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    OpenAi { base_url: String },
    Cohere,
}

// ─── Wire formats ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    message: &'a str,
    preamble: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    text: Option<String>,
}

/// Generation parameters; fall back to the configured defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    provider: Provider,
    api_key: String,
    model: String,
    default_max_tokens: u32,
    default_temperature: f32,
    input_max_characters: Option<usize>,
}

impl LlmClient {
    /// Builds the client for the configured backend. Returns `Ok(None)` when
    /// the backend has no API key or no model id, so callers degrade to
    /// their non-LLM fallbacks.
    pub fn from_config(config: &Config) -> Result<Option<Self>, LlmError> {
        if !config.llm_enabled() {
            warn!(
                "LLM backend {} is not configured, generation disabled",
                config.generation_backend
            );
            return Ok(None);
        }

        let (provider, api_key) = match config.generation_backend.to_ascii_uppercase().as_str() {
            "COHERE" => (Provider::Cohere, config.cohere_api_key.clone()),
            _ => (
                Provider::OpenAi {
                    base_url: config
                        .openai_api_url
                        .clone()
                        .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string())
                        .trim_end_matches('/')
                        .to_string(),
                },
                config.openai_api_key.clone(),
            ),
        };

        let api_key = api_key.unwrap_or_default();
        let model = config.generation_model_id.clone().unwrap_or_default();

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        info!("LLM client initialized ({provider:?}, model: {model})");
        Ok(Some(Self {
            client,
            provider,
            api_key,
            model,
            default_max_tokens: config.generation_max_tokens,
            default_temperature: config.generation_temperature,
            input_max_characters: config.input_max_characters,
        }))
    }

    /// Sends one prompt and returns the generated text.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn generate_text(
        &self,
        system: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, LlmError> {
        let prompt = truncate_chars(prompt, self.input_max_characters);
        let max_tokens = params.max_tokens.unwrap_or(self.default_max_tokens);
        let temperature = params.temperature.unwrap_or(self.default_temperature);

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let request = match &self.provider {
                Provider::OpenAi { base_url } => self
                    .client
                    .post(format!("{base_url}/chat/completions"))
                    .json(&OpenAiRequest {
                        model: &self.model,
                        messages: vec![
                            ChatMessage {
                                role: "system",
                                content: system,
                            },
                            ChatMessage {
                                role: "user",
                                content: prompt,
                            },
                        ],
                        max_tokens,
                        temperature,
                    }),
                Provider::Cohere => self.client.post(COHERE_CHAT_URL).json(&CohereRequest {
                    model: &self.model,
                    message: prompt,
                    preamble: system,
                    max_tokens,
                    temperature,
                }),
            };

            let response = match request.bearer_auth(&self.api_key).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let text = match &self.provider {
                Provider::OpenAi { .. } => response
                    .json::<OpenAiResponse>()
                    .await?
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content),
                Provider::Cohere => response.json::<CohereResponse>().await?.text,
            };

            let text = text
                .filter(|t| !t.trim().is_empty())
                .ok_or(LlmError::EmptyContent)?;
            debug!("LLM call succeeded: {} chars generated", text.len());
            return Ok(text);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Calls the LLM and deserializes the answer as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<T, LlmError> {
        let text = self.generate_text(system, prompt, params).await?;
        serde_json::from_str(strip_json_fences(&text)).map_err(LlmError::Parse)
    }
}

/// Cuts `text` to at most `limit` characters, on a char boundary.
fn truncate_chars(text: &str, limit: Option<usize>) -> &str {
    match limit {
        Some(limit) => match text.char_indices().nth(limit) {
            Some((idx, _)) => &text[..idx],
            None => text,
        },
        None => text,
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(|s| s.trim())
                .unwrap_or(stripped)
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_unterminated() {
        let input = "```json\n{\"key\": 1}";
        assert_eq!(strip_json_fences(input), "{\"key\": 1}");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("évaluation", Some(3)), "éva");
        assert_eq!(truncate_chars("abc", Some(10)), "abc");
        assert_eq!(truncate_chars("abc", None), "abc");
    }

    #[test]
    fn test_client_absent_without_credentials() {
        let config = Config::for_tests();
        assert!(LlmClient::from_config(&config).unwrap().is_none());

        let mut config = Config::for_tests();
        config.openai_api_key = Some("sk-test".to_string());
        assert!(LlmClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_provider_selection() {
        let mut config = Config::for_tests();
        config.generation_model_id = Some("gpt-4o-mini".to_string());
        config.openai_api_key = Some("sk-test".to_string());
        config.openai_api_url = Some("http://localhost:11434/v1/".to_string());
        let client = LlmClient::from_config(&config).unwrap().unwrap();
        assert_eq!(
            client.provider,
            Provider::OpenAi {
                base_url: "http://localhost:11434/v1".to_string()
            }
        );

        config.generation_backend = "cohere".to_string();
        assert!(LlmClient::from_config(&config).unwrap().is_none());
        config.cohere_api_key = Some("co-test".to_string());
        let client = LlmClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.provider, Provider::Cohere);
    }

    #[test]
    fn test_openai_request_shape() {
        let body = serde_json::to_value(OpenAiRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 10,
            temperature: 0.5,
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 10);
    }
}
