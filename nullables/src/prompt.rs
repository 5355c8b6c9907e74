//! Nullable prompt: scripted operator answers.

use std::cell::RefCell;
use std::collections::VecDeque;

use payout_utils::ConfirmationPrompt;

/// Answers questions from a script. Once the script runs out every answer
/// is "no", so a test can never loop forever.
#[derive(Default)]
pub struct NullPrompt {
    answers: RefCell<VecDeque<bool>>,
    asked: RefCell<Vec<String>>,
}

impl NullPrompt {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    /// Always answer "yes" `n` times, then "no".
    pub fn yes_times(n: usize) -> Self {
        Self::new(std::iter::repeat(true).take(n))
    }

    /// Questions asked so far (for assertions).
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

impl ConfirmationPrompt for NullPrompt {
    fn ask_yes_no(&self, question: &str) -> bool {
        self.asked.borrow_mut().push(question.to_string());
        self.answers.borrow_mut().pop_front().unwrap_or(false)
    }
}
