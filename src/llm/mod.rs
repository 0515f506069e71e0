//! LLM client module.
//!
//! The assistant talks to a Gemini-style `generateContent` endpoint. The
//! request and response types below mirror that wire format closely so model
//! turns can be appended back into the context verbatim (function-call parts
//! carry opaque thought signatures the endpoint expects to see again).

mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use gemini::GeminiClient;

/// Errors from a single model call. None of these are retried.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request never produced an HTTP response.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("{status} - {body}")]
    Api { status: u16, body: String },

    /// The endpoint answered 2xx with a body we could not decode.
    #[error("Invalid response from model endpoint: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

/// Conversation role of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Function,
}

/// One turn of the model context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::User),
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Model),
            parts: vec![Part::text(text)],
        }
    }

    /// Function-role turn carrying tool results.
    pub fn function_responses(responses: Vec<FunctionResponse>) -> Self {
        Self {
            role: Some(Role::Function),
            parts: responses
                .into_iter()
                .map(|r| Part {
                    function_response: Some(r),
                    ..Part::default()
                })
                .collect(),
        }
    }

    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts.iter().filter_map(|p| p.function_call.as_ref()).collect()
    }

    /// Concatenated visible text, skipping thought parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A part is text, a function call, or a function response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// The result of a tool invocation, sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

/// Tool declaration as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Group of function declarations (the `tools` array element).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclarations {
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// Body of a `generateContent` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclarations>,
}

/// Decoded `generateContent` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl GenerateResponse {
    /// Content of the first candidate, if any candidate was returned.
    pub fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

/// A model endpoint the agent can call.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one `generateContent` request. Exactly one attempt is made.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted model for driving the agent loop in tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    pub(crate) fn text_response(text: &str) -> GenerateResponse {
        GenerateResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(text)),
                finish_reason: Some("STOP".to_string()),
            }],
        }
    }

    pub(crate) fn call_response(name: &str, args: Value) -> GenerateResponse {
        GenerateResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some(Role::Model),
                    parts: vec![Part {
                        function_call: Some(FunctionCall {
                            id: None,
                            name: name.to_string(),
                            args,
                        }),
                        thought_signature: Some("sig".to_string()),
                        ..Part::default()
                    }],
                }),
                finish_reason: Some("STOP".to_string()),
            }],
        }
    }

    /// Returns queued responses in order, then `fallback` forever.
    #[derive(Default)]
    pub(crate) struct ScriptedLlm {
        script: Mutex<VecDeque<Result<GenerateResponse, LlmError>>>,
        fallback: Option<GenerateResponse>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedLlm {
        pub(crate) fn new(script: Vec<Result<GenerateResponse, LlmError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }

        pub(crate) fn repeating(response: GenerateResponse) -> Self {
            Self {
                fallback: Some(response),
                ..Self::default()
            }
        }

        pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
            self.requests.lock().unwrap().clone()
        }

        /// Requests that advertised the tool manifest (agent turns, not title requests).
        pub(crate) fn agent_requests(&self) -> Vec<GenerateRequest> {
            self.requests()
                .into_iter()
                .filter(|r| !r.tools.is_empty())
                .collect()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                return next;
            }
            self.fallback
                .clone()
                .ok_or_else(|| LlmError::Transport("script exhausted".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parts_use_wire_field_names() {
        let content = Content::function_responses(vec![FunctionResponse {
            id: None,
            name: "get_list".into(),
            response: json!({"result": "[]"}),
        }]);
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "function",
                "parts": [{"functionResponse": {"name": "get_list", "response": {"result": "[]"}}}]
            })
        );
    }

    #[test]
    fn model_turn_round_trips_thought_signature() {
        let raw = json!({
            "role": "model",
            "parts": [{
                "functionCall": {"name": "get_doc", "args": {"doctype": "CRM Lead", "name": "X"}},
                "thoughtSignature": "abc"
            }]
        });
        let content: Content = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(content.function_calls().len(), 1);
        assert_eq!(serde_json::to_value(&content).unwrap(), raw);
    }

    #[test]
    fn text_skips_thoughts() {
        let content = Content {
            role: Some(Role::Model),
            parts: vec![
                Part {
                    text: Some("thinking...".into()),
                    thought: Some(true),
                    ..Part::default()
                },
                Part::text("Hello "),
                Part::text("there"),
            ],
        };
        assert_eq!(content.text(), "Hello there");
    }
}
