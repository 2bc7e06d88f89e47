use anyhow::{Context, Result};
use clap::Parser;
use pseudomidi::{compile_with_options, CommandPlayer, ComposeOptions, Player};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pseudomidi")]
#[command(about = "Convert musical pseudocode to a Standard MIDI File", long_about = None)]
struct Args {
    /// Pseudocode input file
    input: PathBuf,

    /// Output file path (default: `<input-name>.mid`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Tempo in beats per minute
    #[arg(long, default_value = "120")]
    tempo: f64,

    /// MIDI resolution in ticks per beat
    #[arg(long, default_value = "480")]
    ticks_per_beat: u16,

    /// Duration in beats for events that omit one
    #[arg(long, default_value = "1.0")]
    default_duration: f64,

    /// Note-on velocity (1-127)
    #[arg(long, default_value = "100")]
    velocity: u8,

    /// General MIDI program for each track, in track id order (repeatable)
    #[arg(short, long = "instrument")]
    instruments: Vec<u8>,

    /// Play the file after writing it
    #[arg(long)]
    play: bool,

    /// Player command; the file path is appended
    #[arg(long, default_value = "timidity")]
    player: String,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("mid"));

    let options = ComposeOptions {
        tempo_bpm: args.tempo,
        ticks_per_beat: args.ticks_per_beat,
        default_duration: args.default_duration,
        velocity: args.velocity,
        instruments: args.instruments.clone(),
    };

    let midi = compile_with_options(&source, &options)
        .with_context(|| format!("Failed to compile {}", args.input.display()))?;

    fs::write(&output_path, &midi)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    eprintln!("Music file '{}' created.", output_path.display());

    if args.play {
        let player = CommandPlayer::from_command_line(&args.player)
            .context("Player command is empty")?;
        player
            .play(&output_path)
            .with_context(|| format!("Failed to play {}", output_path.display()))?;
    }

    Ok(())
}
