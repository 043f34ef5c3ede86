//! Operator prompts
//!
//! Several checks need a person at the printer: pull the paper tray, open a
//! cover, look at a printout. Suites ask through a [`Prompter`] so runs can be
//! scripted in tests.

use async_trait::async_trait;
use logocert_core::{CertError, Result};
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::Mutex;

#[async_trait]
pub trait Prompter: Send + Sync {
    /// Show an instruction and wait until the operator acknowledges it
    async fn pause(&self, message: &str) -> Result<()>;

    /// Ask a yes/no question
    async fn confirm(&self, question: &str) -> Result<bool>;
}

/// Interpret a yes/no answer
pub fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Prompts on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl StdinPrompter {
    async fn ask(prompt: String) -> Result<String> {
        tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stdout = std::io::stdout();
            write!(stdout, "{}", prompt)?;
            stdout.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| CertError::Other(format!("Prompt task failed: {}", e)))?
        .map_err(CertError::from)
    }
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn pause(&self, message: &str) -> Result<()> {
        Self::ask(format!("\n>>> {}\n    Press Enter to continue...", message)).await?;
        Ok(())
    }

    async fn confirm(&self, question: &str) -> Result<bool> {
        loop {
            let answer = Self::ask(format!("\n>>> {} [y/n] ", question)).await?;
            if let Some(yes) = parse_answer(&answer) {
                return Ok(yes);
            }
            println!("    Please answer y or n.");
        }
    }
}

/// Replays canned answers and records every prompt
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every pause message and question seen so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn note(&self, message: &str) {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(message.to_string());
        }
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn pause(&self, message: &str) -> Result<()> {
        self.note(message);
        Ok(())
    }

    async fn confirm(&self, question: &str) -> Result<bool> {
        self.note(question);
        self.answers
            .lock()
            .map_err(|_| CertError::Other("scripted answers poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| CertError::Other(format!("No scripted answer for: {}", question)))
    }
}
