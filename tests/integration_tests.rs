//! Integration tests for the pseudocode compiler
//!
//! Tests the full pipeline from pseudocode text to Standard MIDI File bytes.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use pretty_assertions::assert_eq;
use pseudomidi::{
    compile, compile_to_writer, compile_with_options, parse, ComposeError, ComposeOptions, Event,
};
use std::collections::BTreeMap;
use std::fs;

fn track_ticks(track: &[TrackEvent]) -> u32 {
    track.iter().map(|e| e.delta.as_int()).sum()
}

fn note_off_deltas(track: &[TrackEvent]) -> Vec<u32> {
    track
        .iter()
        .filter(|e| matches!(e.kind, TrackEventKind::Midi { message: MidiMessage::NoteOff { .. }, .. }))
        .map(|e| e.delta.as_int())
        .collect()
}

#[test]
fn test_two_track_example() {
    let source = "T0\nC4 0.5 D4 0.5\nT1\nC3-M 1.0\n";

    let score = parse(source).unwrap();
    let expected = BTreeMap::from([
        (
            0,
            vec![
                Event::Note { pitch: 60, duration: 0.5 },
                Event::Note { pitch: 62, duration: 0.5 },
            ],
        ),
        (
            1,
            vec![Event::Chord {
                pitches: vec![48, 52, 55],
                duration: 1.0,
            }],
        ),
    ]);
    assert_eq!(score.tracks, expected);

    let midi = compile(source).unwrap();
    let smf = Smf::parse(&midi).unwrap();
    assert_eq!(smf.tracks.len(), 2);
    assert_eq!(smf.header.timing, Timing::Metrical(480u16.into()));
    assert_eq!(track_ticks(&smf.tracks[0]), 480);
    assert_eq!(track_ticks(&smf.tracks[1]), 480);
    assert_eq!(note_off_deltas(&smf.tracks[0]), vec![240, 240]);
}

#[test]
fn test_scale_and_progression() {
    let source = r#"
T0
C4 0.5
D4 0.5
E4 0.5
F4 0.5
G4 0.5
A4 0.5
B4 0.5
C5 0.5
T1
C3-M 1.0
F3-M 1.0
G3-7 1.0
C3-M 1.0
"#;
    let midi = compile(source).unwrap();
    let smf = Smf::parse(&midi).unwrap();
    assert_eq!(smf.tracks.len(), 2);
    assert_eq!(track_ticks(&smf.tracks[0]), 4 * 480);
    assert_eq!(track_ticks(&smf.tracks[1]), 4 * 480);

    let note_ons = smf.tracks[1]
        .iter()
        .filter(|e| matches!(e.kind, TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. }))
        .count();
    // Three triads and one seventh chord
    assert_eq!(note_ons, 3 * 3 + 4);
}

#[test]
fn test_tracks_written_in_ascending_id_order() {
    let source = "T5\nE4\nT1\nC4\nT3\nD4";
    let midi = compile(source).unwrap();
    let smf = Smf::parse(&midi).unwrap();

    let first_keys: Vec<u8> = smf
        .tracks
        .iter()
        .map(|track| {
            track
                .iter()
                .find_map(|e| match e.kind {
                    TrackEventKind::Midi {
                        message: MidiMessage::NoteOn { key, .. },
                        ..
                    } => Some(key.as_int()),
                    _ => None,
                })
                .unwrap()
        })
        .collect();
    assert_eq!(first_keys, vec![60, 62, 64]);
}

#[test]
fn test_every_track_starts_with_tempo() {
    let source = "---\ntempo: 60\n---\nT0\nC4\nT1\nr\n";
    let midi = compile(source).unwrap();
    let smf = Smf::parse(&midi).unwrap();
    for track in &smf.tracks {
        assert_eq!(track[0].delta.as_int(), 0);
        assert_eq!(
            track[0].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(1_000_000u32.into()))
        );
    }
}

#[test]
fn test_frontmatter_overrides_options() {
    let source = "---\nticks-per-beat: 96\ndefault-duration: 0.5\n---\nT0\nC4 D4\n";
    let options = ComposeOptions {
        ticks_per_beat: 960,
        ..ComposeOptions::default()
    };
    let midi = compile_with_options(source, &options).unwrap();
    let smf = Smf::parse(&midi).unwrap();
    assert_eq!(smf.header.timing, Timing::Metrical(96u16.into()));
    assert_eq!(note_off_deltas(&smf.tracks[0]), vec![48, 48]);
}

#[test]
fn test_zero_velocity_rejected() {
    let options = ComposeOptions {
        velocity: 0,
        ..ComposeOptions::default()
    };
    assert!(matches!(
        compile_with_options("T0\nC4", &options),
        Err(ComposeError::MetadataError(_))
    ));
    assert!(matches!(
        compile("---\nvelocity: 0\n---\nT0\nC4"),
        Err(ComposeError::MetadataError(_))
    ));
}

#[test]
fn test_custom_chord_with_duration() {
    let midi = compile("T0\nC4 +4 +7 0.75\n").unwrap();
    let smf = Smf::parse(&midi).unwrap();
    assert_eq!(note_off_deltas(&smf.tracks[0]), vec![360, 0, 0]);
}

#[test]
fn test_line_before_marker_fails() {
    match compile("C4\nT0\nD4") {
        Err(ComposeError::NoActiveTrack { line_number, line }) => {
            assert_eq!(line_number, 1);
            assert_eq!(line, "C4");
        }
        other => panic!("expected NoActiveTrack, got {:?}", other),
    }
}

#[test]
fn test_unknown_shorthand_fails() {
    assert!(matches!(
        compile("T0\nC4-xyz"),
        Err(ComposeError::UnknownShorthand { .. })
    ));
}

#[test]
fn test_malformed_score_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.mid");

    let mut sink = Vec::new();
    let result = compile_to_writer("T0\nC4\nnot music", &ComposeOptions::default(), &mut sink);
    assert!(matches!(result, Err(ComposeError::InvalidLine { line_number: 3, .. })));
    assert!(sink.is_empty());
    assert!(!path.exists());
}

#[test]
fn test_write_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.mid");

    let file = fs::File::create(&path).unwrap();
    compile_to_writer("T0\nC4 0.5\n", &ComposeOptions::default(), file).unwrap();

    let bytes = fs::read(&path).unwrap();
    let smf = Smf::parse(&bytes).unwrap();
    assert_eq!(smf.tracks.len(), 1);
    assert_eq!(note_off_deltas(&smf.tracks[0]), vec![240]);
}

#[test]
fn test_empty_input_produces_empty_file() {
    let midi = compile("").unwrap();
    let smf = Smf::parse(&midi).unwrap();
    assert!(smf.tracks.is_empty());
}
