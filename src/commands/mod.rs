//! Command handlers for the CLI
//!
//! Handlers render progress and summaries to stdout and return a process
//! exit status. They drive the engine in [`crate::workspace`],
//! [`crate::resolver`], and [`crate::repair`] and never touch session files
//! or databases themselves.

use crate::error::{Result, RepairError};
use crate::workspace::Workspace;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub mod list;
pub mod repair;

/// Exit status for a successful command
pub const EXIT_OK: u8 = 0;

/// Exit status for an aborted or failed command
pub const EXIT_FAILURE: u8 = 1;

/// Asks the operator yes/no questions
pub trait Confirmer {
    /// Returns true when the operator answered yes
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Reads answers from the terminal
///
/// Ctrl-C and Ctrl-D count as "no".
#[derive(Debug, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let mut rl = DefaultEditor::new().map_err(|e| RepairError::Prompt(e.to_string()))?;
        match rl.readline(&format!("{} (yes/no): ", question)) {
            Ok(line) => Ok(is_affirmative(&line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(false),
            Err(e) => Err(RepairError::Prompt(e.to_string()).into()),
        }
    }
}

/// `yes` or `y`, any case, surrounding whitespace ignored
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "yes" | "y")
}

fn print_header(title: &str) {
    let rule = "=".repeat(70);
    println!();
    println!("{}", rule);
    println!("{}", title.bold());
    println!("{}", rule);
    println!();
}

fn print_aborted(reason: &str) {
    println!();
    println!("{} {}", "Aborted.".red().bold(), reason);
}

/// Ask `question`; a "no" prints `hint` and fails with [`RepairError::Aborted`]
fn require_confirmation(confirmer: &mut dyn Confirmer, question: &str, hint: &str) -> Result<()> {
    if confirmer.confirm(question)? {
        println!();
        Ok(())
    } else {
        print_aborted(hint);
        Err(RepairError::Aborted.into())
    }
}

/// True when `error` is an operator abort rather than a failure
fn is_aborted(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<RepairError>(), Some(RepairError::Aborted))
}

/// Ask the operator to confirm the editor is closed
fn confirm_editor_closed(confirmer: &mut dyn Confirmer) -> Result<()> {
    println!(
        "{}",
        "IMPORTANT: Close the editor completely before continuing!"
            .yellow()
            .bold()
    );
    println!();
    require_confirmation(
        confirmer,
        "Have you closed the editor?",
        "Close the editor and run this command again.",
    )
}

fn print_workspace_details(ws: &Workspace, indent: &str) {
    if ws.folder.is_none() && ws.workspace_file.is_none() {
        println!("{}ID: {}", indent, ws.id);
    }
    if let Some(folder) = &ws.folder {
        println!("{}Folder: {}", indent, folder);
    } else if let Some(file) = &ws.workspace_file {
        println!("{}Workspace file: {}", indent, file);
    }
    println!("{}Sessions on disk: {}", indent, ws.sessions_on_disk.len());
    println!("{}Sessions in index: {}", indent, ws.sessions_in_index.len());
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Confirmer;
    use crate::error::Result;
    use std::collections::VecDeque;

    /// Replays canned answers and records the questions asked.
    #[derive(Debug, Default)]
    pub struct ScriptedConfirmer {
        pub answers: VecDeque<bool>,
        pub questions: Vec<String>,
    }

    impl ScriptedConfirmer {
        pub fn new(answers: &[bool]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                questions: Vec::new(),
            }
        }
    }

    impl Confirmer for ScriptedConfirmer {
        fn confirm(&mut self, question: &str) -> Result<bool> {
            self.questions.push(question.to_string());
            Ok(self.answers.pop_front().unwrap_or(false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative(" Y \n"));
        assert!(is_affirmative("YES"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("yess"));
    }

    #[test]
    fn test_declined_confirmation_is_an_abort() {
        let mut confirmer = test_support::ScriptedConfirmer::new(&[true, false]);
        assert!(require_confirmation(&mut confirmer, "first?", "").is_ok());
        let err = require_confirmation(&mut confirmer, "second?", "").unwrap_err();
        assert!(is_aborted(&err));
        assert!(!is_aborted(&RepairError::Storage("x".into()).into()));
    }
}
