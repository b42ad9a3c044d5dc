//! Interactive prompts with bounded attempts.
//!
//! [`Confirm`] is the only interface the provisioning core depends on; the
//! string prompts are used by the CLI configuration wizard.

use std::io::{BufRead, Write};

use thiserror::Error;

use crate::init_config::format_value;

/// Failure to obtain an answer from the user.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Every attempt produced something other than a clear answer.
    #[error("no valid y/n input was provided after {attempts} attempt(s)")]
    NoValidAnswer {
        /// Attempts that were made.
        attempts: u32,
    },

    /// Reading from or writing to the terminal failed.
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A yes/no question.
#[derive(Debug, Clone, Copy)]
pub struct YesNo<'a> {
    /// Question shown to the user.
    pub message: &'a str,
    /// Answer used for empty input, if any.
    pub default: Option<bool>,
    /// Attempts before giving up.
    pub max_attempts: u32,
}

impl YesNo<'_> {
    fn choices(&self) -> &'static str {
        match self.default {
            None => "y/n",
            Some(true) => "Y/n",
            Some(false) => "y/N",
        }
    }
}

/// Source of yes/no decisions.
pub trait Confirm {
    /// Asks a yes/no question.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::NoValidAnswer`] when the attempts run out
    /// without a clear answer, which callers must distinguish from "no".
    fn ask_yes_no(&mut self, question: &YesNo<'_>) -> Result<bool, PromptError>;
}

/// Line-based prompt over any reader/writer pair (stdin/stdout in the CLI).
#[derive(Debug)]
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    /// Creates a prompt reading answers from `input` and writing to `output`.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Gives mutable access to the output for free-form messages.
    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Reads one trimmed, unquoted line. End of input reads as empty.
    fn read_answer(&mut self) -> Result<String, PromptError> {
        let mut line = String::new();
        let _ = self.input.read_line(&mut line)?;
        Ok(format_value(&line))
    }

    /// Asks for a single value, re-prompting while `validate` rejects it.
    ///
    /// Empty input returns `Some("")` when `allow_empty` is set. Returns
    /// `None` once `max_attempts` answers have been rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if terminal I/O fails.
    pub fn ask_string(
        &mut self,
        message: &str,
        retry_hint: &str,
        allow_empty: bool,
        max_attempts: u32,
        mut validate: impl FnMut(&str) -> Result<(), String>,
    ) -> Result<Option<String>, PromptError> {
        for remaining in (1..=max_attempts).rev() {
            write!(self.output, "{message}: ")?;
            self.output.flush()?;
            let answer = self.read_answer()?;
            if answer.is_empty() {
                if allow_empty {
                    return Ok(Some(answer));
                }
            } else {
                match validate(&answer) {
                    Ok(()) => return Ok(Some(answer)),
                    Err(reason) => writeln!(self.output, "{reason}")?,
                }
            }
            if !retry_hint.is_empty() && remaining > 1 {
                writeln!(self.output, "{retry_hint}")?;
            }
        }
        writeln!(self.output, "<value not provided>")?;
        Ok(None)
    }

    /// Collects validated values until an empty line is entered.
    /// Invalid values are reported and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if terminal I/O fails.
    pub fn ask_until_empty(
        &mut self,
        message: &str,
        mut validate: impl FnMut(&str) -> Result<(), String>,
    ) -> Result<Vec<String>, PromptError> {
        let mut values = Vec::new();
        loop {
            write!(self.output, "{message}: ")?;
            self.output.flush()?;
            let answer = self.read_answer()?;
            if answer.is_empty() {
                return Ok(values);
            }
            match validate(&answer) {
                Ok(()) => values.push(answer),
                Err(reason) => writeln!(self.output, "{reason}")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalPrompt<R, W> {
    fn ask_yes_no(&mut self, question: &YesNo<'_>) -> Result<bool, PromptError> {
        for _ in 0..question.max_attempts {
            write!(self.output, "{} ({}) ", question.message, question.choices())?;
            self.output.flush()?;
            let answer = self.read_answer()?.to_lowercase();
            match (answer.as_str(), question.default) {
                ("", Some(default)) => return Ok(default),
                ("y" | "yes", _) => return Ok(true),
                ("n" | "no", _) => return Ok(false),
                _ => {}
            }
        }
        writeln!(self.output)?;
        Err(PromptError::NoValidAnswer {
            attempts: question.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn prompt(input: &str) -> TerminalPrompt<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    const fn question(default: Option<bool>) -> YesNo<'static> {
        YesNo {
            message: "Proceed?",
            default,
            max_attempts: 3,
        }
    }

    #[test]
    fn yes_and_no_are_case_insensitive() {
        assert!(prompt("YES\n").ask_yes_no(&question(None)).expect("answer"));
        assert!(!prompt("No\n").ask_yes_no(&question(None)).expect("answer"));
    }

    #[test]
    fn empty_answer_uses_default() {
        assert!(prompt("\n").ask_yes_no(&question(Some(true))).expect("answer"));
        assert!(!prompt("\n").ask_yes_no(&question(Some(false))).expect("answer"));
    }

    #[test]
    fn invalid_answers_are_retried() {
        assert!(prompt("maybe\n\ny\n").ask_yes_no(&question(None)).expect("answer"));
    }

    #[test]
    fn exhausted_attempts_are_an_error_not_a_no() {
        let err = prompt("maybe\nperhaps\n\n")
            .ask_yes_no(&question(None))
            .expect_err("no clear answer");
        assert!(matches!(err, PromptError::NoValidAnswer { attempts: 3 }));
    }

    #[test]
    fn choices_reflect_default() {
        let mut p = prompt("y\n");
        let _ = p.ask_yes_no(&question(Some(false))).expect("answer");
        let shown = String::from_utf8(p.output.clone()).expect("utf8");
        assert!(shown.contains("(y/N)"));
    }

    #[test]
    fn ask_string_retries_until_valid() {
        let mut p = prompt("bad\ngood\n");
        let value = p
            .ask_string("Value", "try again", false, 3, |v| {
                if v == "good" { Ok(()) } else { Err(format!("{v} rejected")) }
            })
            .expect("io");
        assert_eq!(value.as_deref(), Some("good"));
        let shown = String::from_utf8(p.output.clone()).expect("utf8");
        assert!(shown.contains("bad rejected"));
        assert!(shown.contains("try again"));
    }

    #[test]
    fn ask_string_gives_up_after_max_attempts() {
        let value = prompt("\n\n")
            .ask_string("Value", "", false, 2, |_| Ok(()))
            .expect("io");
        assert_eq!(value, None);
    }

    #[test]
    fn ask_string_may_return_empty() {
        let value = prompt("\n")
            .ask_string("Value", "", true, 2, |_| Err("unused".into()))
            .expect("io");
        assert_eq!(value.as_deref(), Some(""));
    }

    #[test]
    fn ask_until_empty_collects_valid_values() {
        let values = prompt("10.0.0.1\nnope\n10.0.0.2\n\n")
            .ask_until_empty("Address", |v| {
                if crate::init_config::is_valid_ip_address(v) {
                    Ok(())
                } else {
                    Err("invalid".into())
                }
            })
            .expect("io");
        assert_eq!(values, vec!["10.0.0.1".to_owned(), "10.0.0.2".to_owned()]);
    }
}
