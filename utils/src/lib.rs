//! Shared utilities for the payout tool.

pub mod logging;
pub mod prompt;
pub mod time;

pub use logging::{init_logging, LogFormat};
pub use prompt::{ConfirmationPrompt, ConsolePrompt};
pub use time::{format_duration, utc_date_stamp, Delay, TokioDelay};
