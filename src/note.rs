//! Note name resolution
//!
//! Converts note tokens such as `C4`, `f#3` or `Bb2` into MIDI note numbers.

use crate::ast::Pitch;
use crate::error::ComposeError;

/// Semitone offset of a note letter from C, case-insensitive
fn pitch_class(letter: char) -> Option<i32> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Resolve a note token to a MIDI pitch.
///
/// The token is a letter `A-G` (either case), an optional `#` or `b`, and a
/// single octave digit. Whitespace is not allowed anywhere in the token.
///
/// # Examples
/// ```
/// use pseudomidi::resolve;
///
/// assert_eq!(resolve("C4").unwrap(), 60);
/// assert_eq!(resolve("A0").unwrap(), 21);
/// assert_eq!(resolve("C#4").unwrap(), 61);
/// assert_eq!(resolve("Db4").unwrap(), 61);
/// ```
///
/// # Errors
/// - [`ComposeError::MalformedNote`] if the token does not have that shape
/// - [`ComposeError::PitchOutOfRange`] for notes above G9 (e.g. `B9`)
pub fn resolve(token: &str) -> Result<Pitch, ComposeError> {
    let malformed = || ComposeError::MalformedNote {
        token: token.to_string(),
        line: token.to_string(),
    };

    let mut chars = token.chars();
    let class = chars.next().and_then(pitch_class).ok_or_else(malformed)?;

    let rest: Vec<char> = chars.collect();
    let (accidental, octave_char) = match rest.as_slice() {
        [digit] => (0, *digit),
        ['#', digit] => (1, *digit),
        ['b', digit] => (-1, *digit),
        _ => return Err(malformed()),
    };
    let octave = octave_char.to_digit(10).ok_or_else(malformed)? as i32;

    let value = 12 * (octave + 1) + class + accidental;
    checked_pitch(value, token)
}

/// Validate that a computed pitch fits the MIDI range.
pub(crate) fn checked_pitch(value: i32, context: &str) -> Result<Pitch, ComposeError> {
    Pitch::try_from(value)
        .ok()
        .filter(|p| *p <= 127)
        .ok_or_else(|| ComposeError::PitchOutOfRange {
            pitch: value,
            line: context.to_string(),
        })
}
