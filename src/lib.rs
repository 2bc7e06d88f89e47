pub mod api;
pub mod ast;
pub mod chords;
pub mod encoder;
pub mod error;
pub mod midi;
pub mod note;
pub mod parser;
pub mod playback;

pub use api::{compile, compile_to_writer, compile_with_options};
pub use ast::*;
pub use chords::{chord_to_notes, intervals_for};
pub use encoder::{encode_track, total_ticks, Instruction, TrackEncoder};
pub use error::*;
pub use midi::{write_smf, FileEncoder};
pub use note::resolve;
pub use parser::{parse, parse_line, parse_with_options, split_events, LineParser, ScoreParser};
pub use playback::{CommandPlayer, Player};
