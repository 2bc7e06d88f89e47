//! # Standard MIDI File Writer
//!
//! Serializes a [`Score`] as a format 1 (parallel tracks) Standard MIDI File.
//!
//! ## Track Layout
//! One MIDI track per score track, in ascending track id order:
//! 1. Tempo meta event (delta 0)
//! 2. Track name meta event, when the frontmatter has a `title`
//! 3. Program change, when an instrument is configured for the track id
//! 4. Note on / note off events from the [`TrackEncoder`]
//! 5. End of track
//!
//! Rests carry no MIDI event of their own: their ticks are added to the
//! delta of whatever event follows, including the end-of-track marker, so a
//! trailing rest still lengthens the track.
//!
//! ## Channels
//! Tracks are assigned channels by position, skipping channel 10 (index 9)
//! which General MIDI reserves for percussion.
//!
//! ## Related Modules
//! - `encoder` - Produces the per-track instruction sequences
//! - `ast` - `Score` and `ComposeOptions`

use crate::ast::{ComposeOptions, Pitch, Score};
use crate::encoder::{Instruction, TrackEncoder};
use crate::error::ComposeError;
use midly::num::{u28, u4};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use std::io::Write;
use tracing::{debug, info};

/// Largest delta time a variable-length quantity can hold (2^28 - 1)
pub const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Largest tempo value the 24-bit tempo meta event can hold
const MAX_TEMPO_MICROS: u64 = 0xFF_FFFF;

/// General MIDI percussion channel, never assigned to a melodic track
const PERCUSSION_CHANNEL: u8 = 9;

/// Channel for the track at `position` in ascending id order
fn channel_for(position: usize) -> u4 {
    let channel = (position % 15) as u8;
    if channel >= PERCUSSION_CHANNEL {
        (channel + 1).into()
    } else {
        channel.into()
    }
}

fn delta_ticks(ticks: u64) -> Result<u28, ComposeError> {
    if ticks > MAX_DELTA {
        return Err(ComposeError::EncodingError(format!(
            "delta time of {} ticks exceeds the maximum of {}",
            ticks, MAX_DELTA
        )));
    }
    Ok((ticks as u32).into())
}

fn checked_key(pitch: Pitch) -> Result<midly::num::u7, ComposeError> {
    if pitch > 127 {
        return Err(ComposeError::EncodingError(format!(
            "pitch {} is outside the MIDI range 0-127",
            pitch
        )));
    }
    Ok(pitch.into())
}

/// Microseconds per quarter note for a tempo in BPM
pub fn tempo_micros(tempo_bpm: f64) -> Result<u32, ComposeError> {
    let micros = (60_000_000.0 / tempo_bpm).round();
    if !micros.is_finite() || micros < 1.0 || micros > MAX_TEMPO_MICROS as f64 {
        return Err(ComposeError::EncodingError(format!(
            "tempo {} BPM cannot be represented in a tempo meta event",
            tempo_bpm
        )));
    }
    Ok(micros as u32)
}

/// Writes scores as Standard MIDI Files.
#[derive(Debug, Clone, Default)]
pub struct FileEncoder {
    options: ComposeOptions,
}

impl FileEncoder {
    /// Create an encoder. Frontmatter values in each score take precedence
    /// over `options`.
    pub fn new(options: ComposeOptions) -> Self {
        Self { options }
    }

    /// Encode a score to an in-memory MIDI file.
    ///
    /// # Errors
    /// [`ComposeError::EncodingError`] if a pitch, delta time or tempo does not
    /// fit the file format; [`ComposeError::MetadataError`] for invalid options.
    pub fn to_bytes(&self, score: &Score) -> Result<Vec<u8>, ComposeError> {
        let options = self.options.merged_with(&score.metadata);
        options.validate()?;

        let tempo = tempo_micros(options.tempo_bpm)?;
        let encoder = TrackEncoder::new(options.ticks_per_beat);
        let title = score.metadata.title.as_deref();

        let tracks = score
            .tracks
            .iter()
            .enumerate()
            .map(|(position, (id, events))| {
                let instructions = encoder.encode(events);
                let program = options.instrument_for(*id);
                debug!(track = id, position, ?program, "building MIDI track");
                build_track(
                    &instructions,
                    TrackSettings {
                        channel: channel_for(position),
                        tempo,
                        program,
                        velocity: options.velocity,
                        title,
                    },
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let smf = Smf {
            header: Header {
                format: Format::Parallel,
                timing: Timing::Metrical(options.ticks_per_beat.into()),
            },
            tracks,
        };

        let mut out = Vec::new();
        smf.write(&mut out)
            .map_err(|e| ComposeError::EncodingError(format!("failed to write MIDI: {}", e)))?;
        Ok(out)
    }

    /// Encode a score and write it to `sink`.
    ///
    /// The whole file is encoded before anything is written, so an encoding
    /// error never leaves a partial file in the sink.
    pub fn write<W: Write>(&self, score: &Score, mut sink: W) -> Result<(), ComposeError> {
        let bytes = self.to_bytes(score)?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        info!(
            tracks = score.tracks.len(),
            bytes = bytes.len(),
            "wrote MIDI file"
        );
        Ok(())
    }
}

/// Write a score to `sink` with the given options.
pub fn write_smf<W: Write>(score: &Score, options: &ComposeOptions, sink: W) -> Result<(), ComposeError> {
    FileEncoder::new(options.clone()).write(score, sink)
}

/// Per-track values that do not change between events.
struct TrackSettings<'a> {
    channel: u4,
    tempo: u32,
    program: Option<u8>,
    velocity: u8,
    title: Option<&'a str>,
}

fn build_track<'a>(instructions: &[Instruction], settings: TrackSettings<'a>) -> Result<Track<'a>, ComposeError> {
    let mut events = Vec::with_capacity(instructions.len() * 2 + 4);

    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(settings.tempo.into())),
    });

    if let Some(title) = settings.title {
        events.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(title.as_bytes())),
        });
    }

    if let Some(program) = settings.program {
        events.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: settings.channel,
                message: MidiMessage::ProgramChange {
                    program: program.into(),
                },
            },
        });
    }

    // Ticks not yet attached to an event (from rests)
    let mut pending = 0u64;

    for instruction in instructions {
        let (pitches, note_on) = match instruction {
            Instruction::Advance { delta } => {
                pending = pending.saturating_add(*delta);
                continue;
            }
            Instruction::NoteOn { pitches, .. } => (pitches, true),
            Instruction::NoteOff { pitches, .. } => (pitches, false),
        };
        pending = pending.saturating_add(instruction.delta());

        for &pitch in pitches {
            let key = checked_key(pitch)?;
            let message = if note_on {
                MidiMessage::NoteOn {
                    key,
                    vel: settings.velocity.into(),
                }
            } else {
                MidiMessage::NoteOff { key, vel: 0.into() }
            };
            events.push(TrackEvent {
                delta: delta_ticks(pending)?,
                kind: TrackEventKind::Midi {
                    channel: settings.channel,
                    message,
                },
            });
            pending = 0;
        }
    }

    events.push(TrackEvent {
        delta: delta_ticks(pending)?,
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Event;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn score_of(tracks: Vec<(u32, Vec<Event>)>) -> Score {
        Score {
            tracks: tracks.into_iter().collect::<BTreeMap<_, _>>(),
            ..Score::default()
        }
    }

    /// (delta, is_note_on, key) for every note event in a track
    fn note_events(track: &[TrackEvent]) -> Vec<(u32, bool, u8)> {
        track
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, .. },
                    ..
                } => Some((e.delta.as_int(), true, key.as_int())),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, .. },
                    ..
                } => Some((e.delta.as_int(), false, key.as_int())),
                _ => None,
            })
            .collect()
    }

    fn track_ticks(track: &[TrackEvent]) -> u32 {
        track.iter().map(|e| e.delta.as_int()).sum()
    }

    #[test]
    fn test_header() {
        let score = score_of(vec![(0, vec![Event::Note { pitch: 60, duration: 1.0 }])]);
        let bytes = FileEncoder::default().to_bytes(&score).unwrap();

        assert_eq!(&bytes[0..4], b"MThd");
        // Format 1
        assert_eq!(&bytes[8..10], &[0x00, 0x01]);
        // One track
        assert_eq!(&bytes[10..12], &[0x00, 0x01]);
        // 480 ticks per quarter note
        assert_eq!(&bytes[12..14], &[0x01, 0xE0]);
        assert_eq!(&bytes[14..18], b"MTrk");
    }

    #[test]
    fn test_two_track_file() {
        let score = parse("T0\nC4 0.5 D4 0.5\nT1\nC3-M 1.0").unwrap();
        let bytes = FileEncoder::default().to_bytes(&score).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.tracks.len(), 2);
        assert_eq!(
            note_events(&smf.tracks[0]),
            vec![(0, true, 60), (240, false, 60), (0, true, 62), (240, false, 62)]
        );
        assert_eq!(
            note_events(&smf.tracks[1]),
            vec![
                (0, true, 48),
                (0, true, 52),
                (0, true, 55),
                (480, false, 48),
                (0, false, 52),
                (0, false, 55),
            ]
        );
        assert_eq!(track_ticks(&smf.tracks[0]), 480);
        assert_eq!(track_ticks(&smf.tracks[1]), 480);
    }

    #[test]
    fn test_tempo_event_first() {
        let score = score_of(vec![(0, vec![Event::Rest { duration: 1.0 }])]);
        let options = ComposeOptions {
            tempo_bpm: 90.0,
            ..ComposeOptions::default()
        };
        let bytes = FileEncoder::new(options).to_bytes(&score).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        match smf.tracks[0][0].kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => assert_eq!(t.as_int(), 666_667),
            ref other => panic!("expected tempo, got {:?}", other),
        }
    }

    #[test]
    fn test_rests_shift_following_notes() {
        let score = score_of(vec![(
            0,
            vec![
                Event::Rest { duration: 1.0 },
                Event::Rest { duration: 0.5 },
                Event::Note { pitch: 64, duration: 1.0 },
                Event::Rest { duration: 2.0 },
            ],
        )]);
        let bytes = FileEncoder::default().to_bytes(&score).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(
            note_events(&smf.tracks[0]),
            vec![(720, true, 64), (480, false, 64)]
        );
        let last = smf.tracks[0].last().unwrap();
        assert_eq!(last.kind, TrackEventKind::Meta(MetaMessage::EndOfTrack));
        assert_eq!(last.delta.as_int(), 960);
        // 4.5 beats
        assert_eq!(track_ticks(&smf.tracks[0]), 2160);
    }

    #[test]
    fn test_program_change_and_channels() {
        let score = score_of(vec![
            (0, vec![Event::Note { pitch: 60, duration: 1.0 }]),
            (2, vec![Event::Note { pitch: 40, duration: 1.0 }]),
        ]);
        let options = ComposeOptions {
            instruments: vec![0, 16, 32],
            ..ComposeOptions::default()
        };
        let bytes = FileEncoder::new(options).to_bytes(&score).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        // Track id 2 uses program 32 on the second channel
        let program = smf.tracks[1].iter().find_map(|e| match e.kind {
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange { program },
            } => Some((channel.as_int(), program.as_int(), e.delta.as_int())),
            _ => None,
        });
        assert_eq!(program, Some((1, 32, 0)));

        // Program change precedes the first note
        let program_idx = smf.tracks[1]
            .iter()
            .position(|e| matches!(e.kind, TrackEventKind::Midi { message: MidiMessage::ProgramChange { .. }, .. }))
            .unwrap();
        let note_idx = smf.tracks[1]
            .iter()
            .position(|e| matches!(e.kind, TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. }))
            .unwrap();
        assert!(program_idx < note_idx);
    }

    #[test]
    fn test_no_program_change_without_instrument() {
        let score = score_of(vec![(0, vec![Event::Note { pitch: 60, duration: 1.0 }])]);
        let bytes = FileEncoder::default().to_bytes(&score).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert!(!smf.tracks[0].iter().any(|e| matches!(
            e.kind,
            TrackEventKind::Midi { message: MidiMessage::ProgramChange { .. }, .. }
        )));
    }

    #[test]
    fn test_channels_skip_percussion() {
        assert_eq!(channel_for(0).as_int(), 0);
        assert_eq!(channel_for(8).as_int(), 8);
        assert_eq!(channel_for(9).as_int(), 10);
        assert_eq!(channel_for(14).as_int(), 15);
        assert_eq!(channel_for(15).as_int(), 0);
        assert_eq!(channel_for(24).as_int(), 10);
        assert!((0..64).all(|p| channel_for(p).as_int() != PERCUSSION_CHANNEL));
    }

    #[test]
    fn test_title_written_as_track_name() {
        let mut score = score_of(vec![(0, vec![])]);
        score.metadata.title = Some("Etude".to_string());
        let bytes = FileEncoder::default().to_bytes(&score).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert!(smf.tracks[0]
            .iter()
            .any(|e| e.kind == TrackEventKind::Meta(MetaMessage::TrackName(b"Etude"))));
    }

    #[test]
    fn test_delta_out_of_range() {
        // 2^28 ticks at 480 per beat
        let beats = (MAX_DELTA + 1) as f64 / 480.0;
        let score = score_of(vec![(0, vec![Event::Note { pitch: 60, duration: beats }])]);
        assert!(matches!(
            FileEncoder::default().to_bytes(&score),
            Err(ComposeError::EncodingError(_))
        ));
    }

    #[test]
    fn test_pitch_out_of_range() {
        let score = score_of(vec![(0, vec![Event::Note { pitch: 200, duration: 1.0 }])]);
        assert!(matches!(
            FileEncoder::default().to_bytes(&score),
            Err(ComposeError::EncodingError(_))
        ));
    }

    #[test]
    fn test_tempo_out_of_range() {
        assert_eq!(tempo_micros(120.0).unwrap(), 500_000);
        assert!(tempo_micros(1.0).is_err());
    }

    #[test]
    fn test_failed_encoding_writes_nothing() {
        let score = score_of(vec![(0, vec![Event::Note { pitch: 128, duration: 1.0 }])]);
        let mut sink = Vec::new();
        assert!(write_smf(&score, &ComposeOptions::default(), &mut sink).is_err());
        assert!(sink.is_empty());
    }
}
