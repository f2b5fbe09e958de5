//! Command line parsing for the captured child.

use std::fmt;

use tailcast_core::ProcessError;
use tokio::process::Command;

/// Program and arguments to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    /// Tokenize a command line with shell quoting rules.
    ///
    /// No shell is involved: pipes, globs and variables are passed through
    /// literally as arguments.
    pub fn parse(command_line: &str) -> Result<Self, ProcessError> {
        let words = shell_words::split(command_line)
            .map_err(|e| ProcessError::InvalidCommand(e.to_string()))?;
        Self::from_args(words)
    }

    /// Build from already-split words (e.g. trailing CLI arguments).
    pub fn from_args<I, S>(words: I) -> Result<Self, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words = words.into_iter().map(Into::into);
        let program = words
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ProcessError::EmptyCommand)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}
