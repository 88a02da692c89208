//! Credential prompts
//!
//! Prompts are written to stderr so stdout stays clean for command output.

use std::collections::VecDeque;
use std::io::{BufRead, IsTerminal, Write};
use std::sync::Mutex;

use sb_core::AuthError;

/// Source of interactive answers
pub trait Prompter: Send + Sync {
    /// Read a visible line
    fn input(&self, label: &str) -> Result<String, AuthError>;

    /// Read a masked line
    fn password(&self, label: &str) -> Result<String, AuthError>;
}

/// Prompter reading from the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

fn prompt_error(err: std::io::Error) -> AuthError {
    AuthError::Prompt(err.to_string())
}

fn write_label(label: &str) -> Result<(), AuthError> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{} ", label).map_err(prompt_error)?;
    stderr.flush().map_err(prompt_error)
}

fn read_line() -> Result<String, AuthError> {
    read_answer(std::io::stdin().lock())
}

/// One answer line without its line ending; EOF is an error
fn read_answer(mut reader: impl BufRead) -> Result<String, AuthError> {
    let mut line = String::new();
    let read = reader.read_line(&mut line).map_err(prompt_error)?;
    if read == 0 {
        return Err(AuthError::Prompt("input closed".to_string()));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

impl Prompter for TerminalPrompter {
    fn input(&self, label: &str) -> Result<String, AuthError> {
        write_label(label)?;
        read_line()
    }

    fn password(&self, label: &str) -> Result<String, AuthError> {
        // Piped input has no echo to suppress
        if !std::io::stdin().is_terminal() {
            write_label(label)?;
            return read_line();
        }
        rpassword::prompt_password(format!("{} ", label)).map_err(prompt_error)
    }
}

/// Prompter answering from a fixed script, for non-interactive use and tests
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Labels of every prompt shown so far
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_default()
    }

    fn next(&self, label: &str) -> Result<String, AuthError> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(label.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .ok_or_else(|| AuthError::Prompt(format!("no answer scripted for {:?}", label)))
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, label: &str) -> Result<String, AuthError> {
        self.next(label)
    }

    fn password(&self, label: &str) -> Result<String, AuthError> {
        self.next(label)
    }
}
