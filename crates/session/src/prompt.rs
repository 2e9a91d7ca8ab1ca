// Interactive input used in the middle of a command (credentials, yes/no gates).

use std::collections::VecDeque;

/// Blocking line input. Returning `None` means input was closed.
pub trait Prompter: Send {
    fn ask(&mut self, prompt: &str) -> Option<String>;

    /// Like [`Prompter::ask`] but for passwords. Interactive implementations
    /// override this to read without echo.
    fn ask_secret(&mut self, prompt: &str) -> Option<String> {
        self.ask(prompt)
    }

    /// Strict yes/no question; anything but `y`/`yes` is a no.
    fn confirm(&mut self, question: &str) -> bool {
        self.ask(&format!("{question} [y/n]: "))
            .map(|answer| matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }
}

/// Replays canned answers in order. Used by tests and non-interactive runs.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { answers: answers.into_iter().map(Into::into).collect(), asked: Vec::new() }
    }

    pub fn push(&mut self, answer: impl Into<String>) {
        self.answers.push_back(answer.into());
    }

    /// Prompts shown so far, in order.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, prompt: &str) -> Option<String> {
        self.asked.push(prompt.to_string());
        self.answers.pop_front()
    }
}
