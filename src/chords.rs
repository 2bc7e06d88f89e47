//! Chord shorthand table
//!
//! Maps chord-quality shorthands (`M`, `m7`, `dim`, ...) to semitone offsets
//! from the root, and builds chords from a root note token.

use crate::ast::Pitch;
use crate::error::ComposeError;
use crate::note::{checked_pitch, resolve};

/// Semitone offsets for a chord shorthand, always starting with the root (0).
///
/// # Supported Shorthands
/// - **Major**: `M` → root, major 3rd, perfect 5th
/// - **Minor**: `m` → root, minor 3rd, perfect 5th
/// - **Dominant 7th**: `7` → major triad + minor 7th
/// - **Major 7th**: `M7` → major triad + major 7th
/// - **Minor 7th**: `m7` → minor triad + minor 7th
/// - **Diminished**: `dim` → root, minor 3rd, diminished 5th
/// - **Augmented**: `aug` → root, major 3rd, augmented 5th
/// - **Sus2 / Sus4**: `sus2`, `sus4`
/// - **Sixths**: `6`, `m6`
///
/// # Errors
/// [`ComposeError::UnknownShorthand`] for anything else. Shorthands are case
/// sensitive: `M` and `m` are different chords.
pub fn intervals_for(shorthand: &str) -> Result<&'static [u8], ComposeError> {
    let intervals: &'static [u8] = match shorthand {
        "M" => &[0, 4, 7],
        "m" => &[0, 3, 7],
        "7" => &[0, 4, 7, 10],
        "M7" => &[0, 4, 7, 11],
        "m7" => &[0, 3, 7, 10],
        "dim" => &[0, 3, 6],
        "aug" => &[0, 4, 8],
        "sus2" => &[0, 2, 7],
        "sus4" => &[0, 5, 7],
        "6" => &[0, 4, 7, 9],
        "m6" => &[0, 3, 7, 9],
        _ => {
            return Err(ComposeError::UnknownShorthand {
                shorthand: shorthand.to_string(),
                line: shorthand.to_string(),
            })
        }
    };
    Ok(intervals)
}

/// Stack semitone offsets on a root pitch, rejecting results above 127.
pub(crate) fn stack(root: Pitch, offsets: &[u32], context: &str) -> Result<Vec<Pitch>, ComposeError> {
    offsets
        .iter()
        .map(|&offset| {
            let value = i32::try_from(offset)
                .ok()
                .and_then(|o| o.checked_add(root as i32))
                .unwrap_or(i32::MAX);
            checked_pitch(value, context)
        })
        .collect()
}

/// Build a chord from a root note token and a shorthand.
///
/// # Examples
/// ```
/// use pseudomidi::chord_to_notes;
///
/// assert_eq!(chord_to_notes("C4", "M").unwrap(), vec![60, 64, 67]);
/// assert_eq!(chord_to_notes("E4", "6").unwrap(), vec![64, 68, 71, 73]);
/// ```
pub fn chord_to_notes(root: &str, shorthand: &str) -> Result<Vec<Pitch>, ComposeError> {
    let root_pitch = resolve(root)?;
    let intervals: Vec<u32> = intervals_for(shorthand)?.iter().map(|&i| i as u32).collect();
    stack(root_pitch, &intervals, root)
}
