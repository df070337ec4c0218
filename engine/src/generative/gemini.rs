//! Gemini generateContent client
//!
//! HTTP implementation of `GenerativeClient` against the Gemini API. The
//! API key is read from the environment variable named in config so it
//! never lands in the config file itself.

use super::{GenerativeClient, GenerativeError, GenerativeRequest};
use crate::config::GenerativeConfig;
use async_trait::async_trait;
use serde_json::json;

pub struct GeminiClient {
    config: GenerativeConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GenerativeConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> super::Result<String> {
        std::env::var(&self.config.api_key_env).map_err(|_| {
            GenerativeError::AuthenticationFailed(format!(
                "environment variable {} is not set",
                self.config.api_key_env
            ))
        })
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerativeRequest) -> super::Result<String> {
        let api_key = self.api_key()?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, api_key
        );

        let contents = vec![json!({
            "role": "user",
            "parts": [{"text": request.prompt}]
        })];

        let mut payload = serde_json::Map::new();
        payload.insert("contents".to_string(), json!(contents));

        if let Some(system) = &request.system {
            payload.insert(
                "systemInstruction".to_string(),
                json!({"parts": [{"text": system}]}),
            );
        }

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenerativeError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                400 | 404 => GenerativeError::InvalidRequest(text),
                429 => GenerativeError::RateLimited,
                401 | 403 => GenerativeError::AuthenticationFailed(text),
                _ => GenerativeError::Unavailable(format!(
                    "Gemini API error ({}): {}",
                    status, text
                )),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerativeError::Parse(e.to_string()))?;

        let candidate = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| GenerativeError::Parse("No candidates in response".to_string()))?;

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| GenerativeError::Parse("No parts in candidate content".to_string()))?;

        let mut full_text = String::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                full_text.push_str(text);
            }
        }

        if full_text.is_empty() {
            return Err(GenerativeError::Parse(
                "Candidate contained no text parts".to_string(),
            ));
        }

        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_env() {
        let config = GenerativeConfig {
            base_url: "http://localhost".to_string(),
            model: "test-model".to_string(),
            api_key_env: "FLOWR_TEST_KEY_THAT_DOES_NOT_EXIST".to_string(),
        };
        let client = GeminiClient::new(config);
        assert!(matches!(
            client.api_key(),
            Err(GenerativeError::AuthenticationFailed(_))
        ));
    }
}
