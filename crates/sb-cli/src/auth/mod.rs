//! Authentication: token lifecycle, prompts and the 401 retry policy

mod gateway;
mod prompt;
mod retry;

pub use gateway::AuthGateway;
pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};
pub use retry::{Reauthenticate, RetryPolicy};

#[cfg(test)]
pub(crate) use gateway::tests::{token, unauthorized, ScriptedApi};
