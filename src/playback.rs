//! Playback of produced MIDI files through an external player.
//!
//! The compiler never plays audio itself. A [`Player`] receives the path of
//! a finished file and blocks until playback ends.

use crate::error::ComposeError;
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Something that can play a MIDI file to completion.
pub trait Player {
    /// Play the file, returning once playback has finished.
    ///
    /// Failures (missing player, no audio device) are returned, never ignored.
    fn play(&self, path: &Path) -> Result<(), ComposeError>;
}

/// Plays files by running an external program such as `timidity` or `fluidsynth`.
///
/// The file path is appended as the last argument.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self::new("timidity")
    }
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Parse a command line like `"fluidsynth -a alsa -i font.sf2"`.
    ///
    /// Returns `None` for an empty command.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts))
    }

    /// Append arguments passed before the file path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Player for CommandPlayer {
    fn play(&self, path: &Path) -> Result<(), ComposeError> {
        info!(player = %self.program, file = %path.display(), "starting playback");

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .map_err(|e| ComposeError::Playback(format!("could not start '{}': {}", self.program, e)))?;

        if !status.success() {
            return Err(ComposeError::Playback(format!(
                "'{}' exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}
