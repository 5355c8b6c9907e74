//! Yes/no confirmation prompts that gate every money-moving round.

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

/// Asks the operator a yes/no question and blocks for the answer.
pub trait ConfirmationPrompt {
    fn ask_yes_no(&self, question: &str) -> bool;
}

/// Parse a single answer line. `None` means "ask again".
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Prompt reading answers line by line from a reader (stdin in production).
///
/// Unrecognized answers repeat the question. End of input counts as "no",
/// so a closed stdin can never authorize a transfer.
pub struct ConsolePrompt<R = io::StdinLock<'static>> {
    input: Mutex<R>,
}

impl ConsolePrompt {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> ConsolePrompt<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }
}

impl<R: BufRead> ConfirmationPrompt for ConsolePrompt<R> {
    fn ask_yes_no(&self, question: &str) -> bool {
        let mut input = match self.input.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tracing::info!("{question} (y/n)");
        loop {
            print!("> ");
            let _ = io::stdout().flush();

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => return false,
                Ok(_) => {}
            }
            if let Some(answer) = parse_answer(&line) {
                tracing::debug!(answer, "operator answered");
                return answer;
            }
        }
    }
}
