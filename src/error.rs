//! # Error Types
//!
//! This module defines all error types for the pseudocode compiler.
//!
//! Line-level errors carry the original line text so callers can point the
//! user at the exact input that failed. Every error is terminal for the
//! conversion that raised it: no partial file is ever produced.
//!
//! ## Error Types
//! - `MalformedNote` - A note token that is not `<letter>[#|b]<octave>`
//! - `UnknownShorthand` - A chord shorthand missing from the chord table
//! - `InvalidLine` - A line matching none of the event shapes
//! - `NoActiveTrack` - An event line before the first `T<n>` marker
//! - `PitchOutOfRange` - A resolved pitch outside 0-127
//! - `EncodingError` - A value the MIDI container cannot represent
//! - `MetadataError` - Invalid YAML frontmatter or option values
//!
//! ## Usage
//! ```rust
//! use pseudomidi::{parse, ComposeError};
//!
//! match parse("C4 0.5") {
//!     Err(ComposeError::NoActiveTrack { line_number, line }) => {
//!         eprintln!("line {} ('{}') needs a track marker first", line_number, line);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//!     Ok(_) => unreachable!(),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    /// A note token did not match `<letter A-G>[#|b]<octave digit>`.
    ///
    /// # Example
    /// ```
    /// # use pseudomidi::ComposeError;
    /// let err = ComposeError::MalformedNote {
    ///     token: "H4".to_string(),
    ///     line: "H4 0.5".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Malformed note 'H4' in line 'H4 0.5'");
    /// ```
    #[error("Malformed note '{token}' in line '{line}'")]
    MalformedNote { token: String, line: String },

    /// A chord shorthand (the part after `-`) is not in the chord table.
    #[error("Unknown chord shorthand '{shorthand}' in line '{line}'")]
    UnknownShorthand { shorthand: String, line: String },

    /// The line matched none of the note, rest, shorthand chord or custom chord shapes.
    ///
    /// `line_number` is 1-based, or 0 when the line was parsed on its own.
    #[error("Invalid line {line_number}: '{line}'")]
    InvalidLine { line_number: usize, line: String },

    /// An event line appeared before the first track marker.
    #[error("Line {line_number} ('{line}') appears before any track marker")]
    NoActiveTrack { line_number: usize, line: String },

    /// A resolved pitch (note, chord root plus interval) fell outside 0-127.
    #[error("Pitch {pitch} is out of range 0-127 in line '{line}'")]
    PitchOutOfRange { pitch: i32, line: String },

    /// A value cannot be represented in the Standard MIDI File layout.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Invalid frontmatter or option value.
    ///
    /// # Example
    /// ```
    /// # use pseudomidi::ComposeError;
    /// let err = ComposeError::MetadataError("ticks-per-beat must be positive".to_string());
    /// assert_eq!(err.to_string(), "Invalid metadata: ticks-per-beat must be positive");
    /// ```
    #[error("Invalid metadata: {0}")]
    MetadataError(String),

    /// The external player could not be started or exited unsuccessfully.
    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposeError {
    /// Attach the text of the line being parsed to a line-level error.
    ///
    /// Errors raised while resolving a single token only know the token; the
    /// line parser calls this so the caller sees the whole offending line.
    pub(crate) fn in_line(self, text: &str) -> Self {
        match self {
            ComposeError::MalformedNote { token, .. } => ComposeError::MalformedNote {
                token,
                line: text.to_string(),
            },
            ComposeError::UnknownShorthand { shorthand, .. } => ComposeError::UnknownShorthand {
                shorthand,
                line: text.to_string(),
            },
            ComposeError::PitchOutOfRange { pitch, .. } => ComposeError::PitchOutOfRange {
                pitch,
                line: text.to_string(),
            },
            ComposeError::InvalidLine { line_number, .. } => ComposeError::InvalidLine {
                line_number,
                line: text.to_string(),
            },
            other => other,
        }
    }

    /// Record the 1-based source line number on errors that carry one.
    pub(crate) fn at_line_number(self, number: usize) -> Self {
        match self {
            ComposeError::InvalidLine { line, .. } => ComposeError::InvalidLine {
                line_number: number,
                line,
            },
            other => other,
        }
    }
}
