use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::LLMConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";

const MOCK_RESPONSE: &str = r#"{"explanation":"Mock explanation generated offline.","keyPoints":["Mock key point"]}"#;

#[derive(Debug, Clone)]
pub struct LlmProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

impl LlmProvider {
    pub fn new(config: &LLMConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config: config.clone(),
            client,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// 真实调用模式下必须配置 API key。
    pub fn validate_config(config: &LLMConfig) -> Result<(), LlmError> {
        if config.enabled && !config.mock && config.api_key.trim().is_empty() {
            return Err(LlmError::ApiError {
                status: 401,
                message: "API key not configured".to_string(),
            });
        }
        Ok(())
    }

    /// key 走请求头而不是查询串：reqwest 的错误信息会带上完整 URL。
    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model,
        )
    }

    /// 单轮文本生成，返回第一个候选的文本。
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }
        if self.config.mock {
            return Ok(MOCK_RESPONSE.to_string());
        }

        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                max_output_tokens: 1024,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let payload: Value = response.json().await.map_err(LlmError::from_transport)?;
        extract_text(&payload)
    }
}

fn extract_text(payload: &Value) -> Result<String, LlmError> {
    if let Some(reason) = payload
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(LlmError::Blocked(reason.to_string()));
    }
    if payload.pointer("/candidates/0/finishReason").and_then(Value::as_str) == Some("SAFETY") {
        return Err(LlmError::Blocked("SAFETY".to_string()));
    }

    let text = payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm is disabled")]
    Disabled,
    #[error("llm request timed out")]
    Timeout,
    #[error("llm network error: {0}")]
    Network(String),
    #[error("llm api error: status={status}, message={message}")]
    ApiError { status: u16, message: String },
    #[error("llm response blocked by safety filter: {0}")]
    Blocked(String),
    #[error("llm returned an empty response")]
    EmptyResponse,
}

impl LlmError {
    fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(error.without_url().to_string())
        }
    }
}
