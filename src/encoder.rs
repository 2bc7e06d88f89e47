//! Track encoding
//!
//! Walks one track's events with a time cursor and produces the
//! note-on / note-off / advance instructions the MIDI writer serializes.
//!
//! ## Tick Rounding
//! The cursor accumulates beats exactly as written. Each instruction sits at
//! `trunc(cursor * ticks_per_beat)` and its delta is the distance from the
//! previous instruction, so truncation error never accumulates past one
//! tick no matter how many short events a track holds. Three thirds of a
//! beat at 100 ticks per beat encode as 33, 33 and 34 ticks.
//!
//! A positive duration shorter than one tick can truncate to nothing:
//! `C4 0.0001` at 480 ticks per beat puts its note-on and note-off on the
//! same tick. Such notes are kept, not dropped or stretched to one tick.

use crate::ast::{Event, Pitch};
use tracing::debug;

/// Tolerance absorbing float noise such as `0.1 + 0.2` landing just below a tick.
const TICK_EPSILON: f64 = 1e-6;

/// One encoder-level step. `delta` is in ticks since the previous
/// instruction of the same track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Start sounding every pitch in the set simultaneously
    NoteOn { delta: u64, pitches: Vec<Pitch> },
    /// Stop sounding every pitch in the set simultaneously
    NoteOff { delta: u64, pitches: Vec<Pitch> },
    /// Let time pass with nothing sounding
    Advance { delta: u64 },
}

impl Instruction {
    pub fn delta(&self) -> u64 {
        match self {
            Instruction::NoteOn { delta, .. }
            | Instruction::NoteOff { delta, .. }
            | Instruction::Advance { delta } => *delta,
        }
    }
}

/// Converts event sequences to instruction sequences at a fixed resolution.
#[derive(Debug, Clone, Copy)]
pub struct TrackEncoder {
    ticks_per_beat: u16,
}

impl TrackEncoder {
    pub fn new(ticks_per_beat: u16) -> Self {
        Self { ticks_per_beat }
    }

    /// Absolute tick of a beat position
    fn tick_at(&self, beats: f64) -> u64 {
        let ticks = beats * f64::from(self.ticks_per_beat) + TICK_EPSILON;
        // Float-to-int casts saturate, so absurd durations surface as
        // oversized deltas and fail in the MIDI writer.
        ticks.trunc() as u64
    }

    /// Encode one track.
    ///
    /// # Examples
    /// ```
    /// use pseudomidi::{Event, Instruction, TrackEncoder};
    ///
    /// let track = vec![Event::Note { pitch: 60, duration: 0.5 }];
    /// let instructions = TrackEncoder::new(480).encode(&track);
    /// assert_eq!(instructions, vec![
    ///     Instruction::NoteOn { delta: 0, pitches: vec![60] },
    ///     Instruction::NoteOff { delta: 240, pitches: vec![60] },
    /// ]);
    /// ```
    pub fn encode(&self, track: &[Event]) -> Vec<Instruction> {
        let mut instructions = Vec::with_capacity(track.len() * 2);
        let mut cursor = 0.0_f64;
        let mut emitted = 0u64;

        for event in track {
            cursor += event.duration();
            let end = self.tick_at(cursor);
            let delta = end.saturating_sub(emitted);
            emitted = emitted.max(end);

            match event {
                Event::Rest { .. } => instructions.push(Instruction::Advance { delta }),
                Event::Note { .. } | Event::Chord { .. } => {
                    let pitches = event.pitches().to_vec();
                    instructions.push(Instruction::NoteOn {
                        delta: 0,
                        pitches: pitches.clone(),
                    });
                    instructions.push(Instruction::NoteOff { delta, pitches });
                }
            }
        }

        debug!(
            events = track.len(),
            instructions = instructions.len(),
            ticks = emitted,
            "encoded track"
        );
        instructions
    }
}

/// Encode a track at the given resolution.
pub fn encode_track(track: &[Event], ticks_per_beat: u16) -> Vec<Instruction> {
    TrackEncoder::new(ticks_per_beat).encode(track)
}

/// Total length of an instruction sequence in ticks
pub fn total_ticks(instructions: &[Instruction]) -> u64 {
    instructions.iter().map(Instruction::delta).sum()
}
