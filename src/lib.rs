//! # CRM Assistant
//!
//! A chat assistant that reads and edits CRM records on a user's behalf.
//!
//! This library provides:
//! - An HTTP API for chatting and managing chat sessions
//! - A bounded tool-calling loop against a Gemini `generateContent` endpoint
//! - A SQLite record store with the built-in CRM record types
//! - Owner-scoped chat session storage
//!
//! ## Architecture
//!
//! Each chat turn:
//! 1. Loads the caller's transcript and primes the model with the CRM glossary
//! 2. Calls the model with the record tools (`get_list`, `get_doc`, ...)
//! 3. Executes requested tool calls and feeds the results back
//! 4. Stops on a text answer and appends the turn to the session
//!
//! ## Example
//!
//! ```rust,ignore
//! use crm_assistant::{agent::Agent, config::Config, llm::GeminiClient};
//!
//! let config = Config::from_env()?;
//! let llm = Arc::new(GeminiClient::from_config(&config)?);
//! let agent = Agent::new(&config, llm, sessions, records);
//! let outcome = agent.chat("Administrator", "List all leads with status Nurture", None, None).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod records;
pub mod session;
pub mod tools;

pub use config::Config;
