//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{GenerateRequest, GenerateResponse, LlmClient, LlmError};
use crate::config::Config;

/// Header carrying the API key, so it never appears in URLs or request logs.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for a single Gemini model.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    /// Create a client for `model` against `base_url`.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        Self::new(
            config.api_key.clone(),
            config.gemini_base_url.clone(),
            config.default_model.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Decode a response body, mapping non-success statuses to [`LlmError::Api`].
pub(crate) fn parse_response(status: u16, body: &str) -> Result<GenerateResponse, LlmError> {
    if !(200..300).contains(&status) {
        return Err(LlmError::Api {
            status,
            body: body.to_string(),
        });
    }
    serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        tracing::debug!(
            model = %self.model,
            turns = request.contents.len(),
            tools = request.tools.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Gemini API error");
        }
        parse_response(status.as_u16(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Content, ToolDeclarations};
    use serde_json::json;

    #[test]
    fn endpoint_has_no_key_in_url() {
        let client = GeminiClient::new(
            "secret",
            "https://example.test/v1beta/",
            "gemini-3-pro-preview",
            Duration::from_secs(5),
        )
        .unwrap();
        let url = client.endpoint();
        assert_eq!(
            url,
            "https://example.test/v1beta/models/gemini-3-pro-preview:generateContent"
        );
        assert!(!url.contains("secret"));
    }

    #[test]
    fn request_body_has_contents_and_tools() {
        let request = GenerateRequest {
            contents: vec![Content::user("hi")],
            tools: vec![ToolDeclarations {
                function_declarations: vec![],
            }],
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
                "tools": [{"functionDeclarations": []}]
            })
        );

        let untooled = GenerateRequest {
            contents: vec![Content::user("hi")],
            tools: vec![],
        };
        assert!(serde_json::to_value(&untooled).unwrap().get("tools").is_none());
    }

    #[test]
    fn parses_function_call_response() {
        let body = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "get_list", "args": {"doctype": "CRM Lead"}}}]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 10}
        })
        .to_string();

        let response = parse_response(200, &body).unwrap();
        let content = response.first_candidate().unwrap().content.as_ref().unwrap();
        let calls = content.function_calls();
        assert_eq!(calls[0].name, "get_list");
        assert_eq!(calls[0].args["doctype"], "CRM Lead");
    }

    #[test]
    fn error_status_keeps_body() {
        let err = parse_response(403, "{\"error\": \"denied\"}").unwrap_err();
        assert_eq!(err.to_string(), "403 - {\"error\": \"denied\"}");

        let err = parse_response(200, "not json").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn empty_candidates_decode() {
        let response = parse_response(200, "{}").unwrap();
        assert!(response.first_candidate().is_none());
    }
}
