//! # Score Types
//!
//! This module defines the data model produced by the parser and consumed by
//! the encoders.
//!
//! ## Type Hierarchy
//! ```text
//! Score
//!   ├── Metadata (title, tempo, ticks per beat, instruments...)
//!   └── BTreeMap<track id, Track>
//!         └── Vec<Event>
//!               ├── Note(pitch, duration)
//!               ├── Rest(duration)
//!               └── Chord(pitches, duration)
//! ```
//!
//! ## Key Concepts
//!
//! ### Pitch
//! A MIDI note number in 0-127. `C4` is 60, computed as
//! `12 * (octave + 1) + pitch_class + accidental`.
//!
//! ### Duration
//! Always in beats (quarter notes). `0.5` is an eighth note.
//!
//! ### Track ordering
//! Tracks are keyed by id in a `BTreeMap`, so iteration is always ascending
//! by id regardless of the order markers appeared in the source.

use crate::error::ComposeError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// MIDI note number, 0-127
pub type Pitch = u8;

/// Track identifier from a `T<n>` marker line
pub type TrackId = u32;

/// One ordered event stream
pub type Track = Vec<Event>;

/// A single parsed event.
///
/// Both chord shapes (shorthand `C4-M` and custom `C4 +4 +7`) collapse to
/// `Chord` once their intervals are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Note { pitch: Pitch, duration: f64 },
    Rest { duration: f64 },
    Chord { pitches: Vec<Pitch>, duration: f64 },
}

impl Event {
    /// Duration of the event in beats
    pub fn duration(&self) -> f64 {
        match self {
            Event::Note { duration, .. }
            | Event::Rest { duration }
            | Event::Chord { duration, .. } => *duration,
        }
    }

    /// Pitches sounded by the event, empty for rests
    pub fn pitches(&self) -> &[Pitch] {
        match self {
            Event::Note { pitch, .. } => std::slice::from_ref(pitch),
            Event::Rest { .. } => &[],
            Event::Chord { pitches, .. } => pitches,
        }
    }
}

/// Document metadata from the YAML frontmatter.
///
/// Every field is optional; unset fields fall back to [`ComposeOptions`].
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Metadata {
    pub title: Option<String>,
    pub tempo: Option<f64>,
    pub ticks_per_beat: Option<u16>,
    pub default_duration: Option<f64>,
    pub velocity: Option<u8>,
    pub instruments: Option<Vec<u8>>,
}

/// A parsed score: metadata plus one event sequence per track id.
///
/// Built once per conversion and not modified afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    pub metadata: Metadata,
    pub tracks: BTreeMap<TrackId, Track>,
}

impl Score {
    /// Total length of a track in beats, `None` if the track does not exist
    pub fn track_beats(&self, id: TrackId) -> Option<f64> {
        self.tracks
            .get(&id)
            .map(|events| events.iter().map(Event::duration).sum())
    }
}

/// Conversion options.
///
/// `tempo_bpm` only affects the tempo meta event; `ticks_per_beat` drives
/// every delta-time conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOptions {
    pub tempo_bpm: f64,
    pub ticks_per_beat: u16,
    pub default_duration: f64,
    /// Note-on velocity (note-offs always use 0)
    pub velocity: u8,
    /// General MIDI program per track, indexed by track id
    pub instruments: Vec<u8>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            tempo_bpm: 120.0,
            ticks_per_beat: 480,
            default_duration: 1.0,
            velocity: 100,
            instruments: Vec::new(),
        }
    }
}

impl ComposeOptions {
    /// Overlay frontmatter values on top of these options.
    pub fn merged_with(&self, metadata: &Metadata) -> Self {
        Self {
            tempo_bpm: metadata.tempo.unwrap_or(self.tempo_bpm),
            ticks_per_beat: metadata.ticks_per_beat.unwrap_or(self.ticks_per_beat),
            default_duration: metadata.default_duration.unwrap_or(self.default_duration),
            velocity: metadata.velocity.unwrap_or(self.velocity),
            instruments: metadata
                .instruments
                .clone()
                .unwrap_or_else(|| self.instruments.clone()),
        }
    }

    /// Reject option values the encoder cannot work with.
    pub fn validate(&self) -> Result<(), ComposeError> {
        if !(self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0) {
            return Err(ComposeError::MetadataError(format!(
                "tempo must be a positive number, got {}",
                self.tempo_bpm
            )));
        }
        if self.ticks_per_beat == 0 || self.ticks_per_beat > 0x7FFF {
            return Err(ComposeError::MetadataError(format!(
                "ticks-per-beat must be between 1 and 32767, got {}",
                self.ticks_per_beat
            )));
        }
        if !(self.default_duration.is_finite() && self.default_duration > 0.0) {
            return Err(ComposeError::MetadataError(format!(
                "default-duration must be positive, got {}",
                self.default_duration
            )));
        }
        if self.velocity == 0 || self.velocity > 127 {
            return Err(ComposeError::MetadataError(format!(
                "velocity must be between 1 and 127, got {}",
                self.velocity
            )));
        }
        if let Some(program) = self.instruments.iter().find(|p| **p > 127) {
            return Err(ComposeError::MetadataError(format!(
                "instrument program must be at most 127, got {}",
                program
            )));
        }
        Ok(())
    }

    /// Program number configured for a track, if any
    pub fn instrument_for(&self, id: TrackId) -> Option<u8> {
        self.instruments.get(id as usize).copied()
    }
}
