//! Agent module - the CRM assistant's tool-calling loop.
//!
//! Each chat turn:
//! 1. Loads the caller's session transcript (or starts a new one)
//! 2. Primes the model with the system instruction and the transcript
//! 3. Calls the model with the CRM tool manifest
//! 4. Executes requested tool calls and feeds the results back
//! 5. Stops on a text answer, a failed model call, or the iteration budget
//! 6. Appends the turn to the session

mod agent_loop;
mod prompt;

pub use agent_loop::{Agent, AgentError, ChatOutcome, StopReason, TitleMode};
pub use prompt::build_system_prompt;
