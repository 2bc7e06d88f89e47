//! # Public API
//!
//! This module contains the main entry points for the pseudocode compiler.
//!
//! ## Compilation Functions
//!
//! - [`compile()`] - Pseudocode to MIDI bytes with default options
//! - [`compile_with_options()`] - Custom tempo, resolution, instruments
//! - [`compile_to_writer()`] - Write the MIDI file straight into a sink
//!
//! ## Typical Usage
//!
//! ```rust
//! use pseudomidi::compile;
//!
//! let source = r#"---
//! title: Two Voices
//! instruments: [0, 32]
//! ---
//! T0
//! C4 0.5 D4 0.5 E4 1
//! T1
//! C3-M 2
//! "#;
//!
//! let midi = compile(source)?;
//! assert_eq!(&midi[0..4], b"MThd");
//! # Ok::<(), pseudomidi::ComposeError>(())
//! ```
//!
//! Parsing finishes before encoding starts, and encoding finishes before
//! anything reaches the sink, so a malformed score never yields a partial file.

use crate::{parse_with_options, ComposeError, ComposeOptions, FileEncoder};
use std::io::Write;

/// Compile pseudocode to a Standard MIDI File with default options.
///
/// # Pipeline
/// 1. Extract frontmatter and split the text into tracks
/// 2. Parse every event line
/// 3. Encode each track with a time cursor
/// 4. Serialize the tracks into a format 1 MIDI file
///
/// # Errors
/// Returns the first [`ComposeError`] raised by parsing or encoding.
pub fn compile(source: &str) -> Result<Vec<u8>, ComposeError> {
    compile_with_options(source, &ComposeOptions::default())
}

/// Compile with explicit options. Frontmatter values override `options`.
///
/// # Example
/// ```rust
/// use pseudomidi::{compile_with_options, ComposeOptions};
///
/// let options = ComposeOptions {
///     tempo_bpm: 96.0,
///     ticks_per_beat: 96,
///     ..ComposeOptions::default()
/// };
/// let midi = compile_with_options("T0\nC4 E4 G4", &options)?;
/// // Division field of the header
/// assert_eq!(&midi[12..14], &[0x00, 0x60]);
/// # Ok::<(), pseudomidi::ComposeError>(())
/// ```
pub fn compile_with_options(source: &str, options: &ComposeOptions) -> Result<Vec<u8>, ComposeError> {
    options.validate()?;
    let score = parse_with_options(source, options)?;
    FileEncoder::new(options.clone()).to_bytes(&score)
}

/// Compile and write the MIDI file to `sink`.
pub fn compile_to_writer<W: Write>(source: &str, options: &ComposeOptions, sink: W) -> Result<(), ComposeError> {
    options.validate()?;
    let score = parse_with_options(source, options)?;
    FileEncoder::new(options.clone()).write(&score, sink)
}
