//! Core agent loop implementation.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{Content, FunctionResponse, GenerateRequest, LlmClient, LlmError, Role};
use crate::records::RecordStore;
use crate::session::{ChatMessage, MessageRole, SessionError, SessionStore};
use crate::tools::{manifest, ToolExecutor};

use super::prompt::{
    build_system_prompt, clean_title, current_datetime, provisional_title, title_prompt, MODEL_ACK,
};

const NO_CANDIDATES: &str = "I couldn't generate a response.";
/// Also answers a text reply whose only text is blank or marked as thought.
const EMPTY_RESPONSE: &str = "Empty response from AI.";
const BUDGET_EXHAUSTED: &str = "I reached the maximum number of steps without a final answer.";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Message must not be empty")]
    EmptyMessage,

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model answered in text.
    Answer,
    /// The response carried no candidates.
    NoCandidates,
    /// The first candidate carried no parts, or no visible text.
    EmptyResponse,
    /// The model call failed.
    ProviderError,
    /// Every iteration requested tool calls.
    BudgetExhausted,
}

/// How a new session gets its generated title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleMode {
    /// Detached task; the chat answer does not wait for it.
    Background,
    /// Awaited before `chat` returns.
    Inline,
}

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    /// Session the turn was stored in. `None` if a new session could not be created.
    pub chat_id: Option<Uuid>,
    pub stop: StopReason,
}

/// The CRM assistant.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    sessions: Arc<dyn SessionStore>,
    tools: ToolExecutor,
    max_iterations: usize,
    title_mode: TitleMode,
}

impl Agent {
    /// Create an agent with the configured loop budget and tool policy.
    pub fn new(
        config: &Config,
        llm: Arc<dyn LlmClient>,
        sessions: Arc<dyn SessionStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            llm,
            sessions,
            tools: ToolExecutor::new(records, config.tool_policy.clone()),
            max_iterations: config.max_iterations,
            title_mode: TitleMode::Background,
        }
    }

    pub fn with_title_mode(mut self, mode: TitleMode) -> Self {
        self.title_mode = mode;
        self
    }

    /// Run one chat turn for `owner`.
    ///
    /// `history` seeds a new session's transcript and is ignored when `chat_id`
    /// names an existing session. A `chat_id` that does not exist starts a new
    /// session; one owned by someone else fails with `NotAuthorized`.
    pub async fn chat(
        &self,
        owner: &str,
        message: &str,
        history: Option<Vec<ChatMessage>>,
        chat_id: Option<Uuid>,
    ) -> Result<ChatOutcome, AgentError> {
        if message.trim().is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        let existing = match chat_id {
            Some(id) => match self.sessions.get_owned(id, owner).await {
                Ok(session) => Some(session),
                Err(SessionError::NotFound(_)) => {
                    tracing::warn!(chat_id = %id, "Chat session not found, starting a new one");
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let prior = match &existing {
            Some(session) => session.messages.clone(),
            None => history.unwrap_or_default(),
        };

        let contents = build_context(&current_datetime(), &prior, message);
        let (response, stop) = self.run_loop(contents).await;
        tracing::debug!(?stop, "Agent loop finished");

        let turn = [ChatMessage::user(message), ChatMessage::assistant(response.clone())];
        let chat_id = match existing {
            Some(session) => {
                if let Err(e) = self.sessions.append_messages(session.id, &turn).await {
                    tracing::warn!(chat_id = %session.id, error = %e, "Failed to save chat turn");
                }
                Some(session.id)
            }
            None => {
                let mut transcript = prior;
                transcript.extend(turn);
                match self
                    .sessions
                    .create(owner, &provisional_title(message), &transcript)
                    .await
                {
                    Ok(session) => {
                        tracing::info!(chat_id = %session.id, owner = %owner, "Created chat session");
                        self.generate_title(session.id, message).await;
                        Some(session.id)
                    }
                    Err(e) => {
                        tracing::error!(owner = %owner, error = %e, "Failed to create chat session");
                        None
                    }
                }
            }
        };

        Ok(ChatOutcome {
            response,
            chat_id,
            stop,
        })
    }

    /// Call the model until it answers in text, fails, or the budget runs out.
    async fn run_loop(&self, contents: Vec<Content>) -> (String, StopReason) {
        let mut request = GenerateRequest {
            contents,
            tools: manifest(),
        };

        for iteration in 0..self.max_iterations {
            tracing::debug!("Agent iteration {}", iteration + 1);

            let response = match self.llm.generate(&request).await {
                Ok(response) => response,
                Err(LlmError::Api { status, body }) => {
                    tracing::error!(status, body = %body, "Model endpoint returned an error");
                    return (
                        format!("Error from AI provider: {} - {}", status, body),
                        StopReason::ProviderError,
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Model call failed");
                    return (format!("Error: {}", e), StopReason::ProviderError);
                }
            };

            let Some(candidate) = response.candidates.into_iter().next() else {
                return (NO_CANDIDATES.to_string(), StopReason::NoCandidates);
            };
            let mut content = match candidate.content {
                Some(content) if !content.parts.is_empty() => content,
                _ => return (EMPTY_RESPONSE.to_string(), StopReason::EmptyResponse),
            };

            let calls: Vec<_> = content.function_calls().into_iter().cloned().collect();
            if calls.is_empty() {
                let text = content.text();
                if text.trim().is_empty() {
                    return (EMPTY_RESPONSE.to_string(), StopReason::EmptyResponse);
                }
                return (text, StopReason::Answer);
            }

            // Echo the model turn unchanged apart from a missing role.
            if content.role.is_none() {
                content.role = Some(Role::Model);
            }
            request.contents.push(content);

            let mut responses = Vec::with_capacity(calls.len());
            for call in &calls {
                tracing::debug!(tool = %call.name, args = %call.args, "Calling tool");
                let result = self.tools.execute(call).await;
                tracing::debug!(tool = %call.name, result = %truncate_for_log(&result, 1000), "Tool result");
                responses.push(FunctionResponse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    response: json!({ "result": result }),
                });
            }
            request.contents.push(Content::function_responses(responses));
        }

        tracing::warn!(max_iterations = self.max_iterations, "Agent loop budget exhausted");
        (BUDGET_EXHAUSTED.to_string(), StopReason::BudgetExhausted)
    }

    async fn generate_title(&self, id: Uuid, message: &str) {
        match self.title_mode {
            TitleMode::Inline => {
                title_session(self.llm.as_ref(), self.sessions.as_ref(), id, message).await
            }
            TitleMode::Background => {
                let llm = Arc::clone(&self.llm);
                let sessions = Arc::clone(&self.sessions);
                let message = message.to_string();
                tokio::spawn(async move {
                    title_session(llm.as_ref(), sessions.as_ref(), id, &message).await;
                });
            }
        }
    }
}

/// Model context for one turn: priming, prior transcript, then the new message.
fn build_context(current_datetime: &str, prior: &[ChatMessage], message: &str) -> Vec<Content> {
    let mut contents = Vec::with_capacity(prior.len() + 3);
    contents.push(Content::user(build_system_prompt(current_datetime)));
    contents.push(Content::model(MODEL_ACK));
    contents.extend(prior.iter().map(|m| match m.role {
        MessageRole::User => Content::user(m.content.clone()),
        MessageRole::Assistant => Content::model(m.content.clone()),
    }));
    contents.push(Content::user(message));
    contents
}

/// Ask the model for a short title and store it. Failures keep the provisional title.
async fn title_session(llm: &dyn LlmClient, sessions: &dyn SessionStore, id: Uuid, message: &str) {
    let request = GenerateRequest {
        contents: vec![Content::user(title_prompt(message))],
        tools: Vec::new(),
    };
    let response = match llm.generate(&request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(chat_id = %id, error = %e, "Title generation failed");
            return;
        }
    };

    let title = response
        .first_candidate()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| clean_title(&c.text()));
    let Some(title) = title else {
        tracing::debug!(chat_id = %id, "Model returned no usable title");
        return;
    };

    if let Err(e) = sessions.update_title(id, &title).await {
        tracing::warn!(chat_id = %id, error = %e, "Failed to save generated title");
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let end = (0..=max_len).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
        format!("{}... [truncated]", &s[..end])
    }
}
