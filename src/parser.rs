//! # Pseudocode Parser
//!
//! Turns pseudocode text into a [`Score`].
//!
//! ## Line Grammar
//! Every event line is one of four shapes, tried in this order:
//!
//! | Shape            | Example          | Result                 |
//! |------------------|------------------|------------------------|
//! | Plain note       | `C4 0.5`         | `Note(60, 0.5)`        |
//! | Rest             | `r 2`            | `Rest(2.0)`            |
//! | Shorthand chord  | `C4-M7`          | `Chord([60,64,67,71])` |
//! | Custom chord     | `C4 +4 +7 0.75`  | `Chord([60,64,67])`    |
//!
//! The trailing duration is optional and defaults to the configured default
//! duration (1 beat unless overridden).
//!
//! ## Score Structure
//! - `T<n>` marker lines switch the current track (re-opening an id resets it)
//! - Several events may share one physical line: `C4 0.5 D4 0.5`
//! - Blank lines and lines starting with `#` or `//` are skipped
//! - An optional YAML frontmatter block between `---` lines sets options

use crate::ast::*;
use crate::chords::{intervals_for, stack};
use crate::error::ComposeError;
use crate::note::resolve;
use std::collections::BTreeMap;
use std::num::ParseIntError;
use tracing::{debug, trace};

/// Parses a single event line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineParser {
    default_duration: f64,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// A shape matcher: `None` when the tokens do not have this shape,
/// `Some(Err)` when they do but a component fails to resolve.
type ShapeMatcher = fn(&LineParser, &[&str]) -> Option<Result<Event, ComposeError>>;

/// Candidate shapes in priority order; the first match wins.
const SHAPES: [ShapeMatcher; 4] = [
    LineParser::plain_note,
    LineParser::rest,
    LineParser::shorthand_chord,
    LineParser::custom_chord,
];

impl LineParser {
    pub fn new(default_duration: f64) -> Self {
        Self { default_duration }
    }

    /// Parse one line into exactly one event.
    ///
    /// # Examples
    /// ```
    /// use pseudomidi::{Event, LineParser};
    ///
    /// let parser = LineParser::default();
    /// assert_eq!(
    ///     parser.parse("C4 +4 +7").unwrap(),
    ///     Event::Chord { pitches: vec![60, 64, 67], duration: 1.0 }
    /// );
    /// ```
    ///
    /// # Errors
    /// [`ComposeError::InvalidLine`] if no shape matches. Resolution errors
    /// ([`ComposeError::MalformedNote`], [`ComposeError::UnknownShorthand`],
    /// [`ComposeError::PitchOutOfRange`]) carry the original line text.
    pub fn parse(&self, line: &str) -> Result<Event, ComposeError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        SHAPES
            .iter()
            .find_map(|matcher| matcher(self, &tokens))
            .unwrap_or_else(|| {
                Err(ComposeError::InvalidLine {
                    line_number: 0,
                    line: line.to_string(),
                })
            })
            .map_err(|e| e.in_line(line))
    }

    /// Resolve the optional trailing duration token.
    /// `None` means the token is present but not a valid duration.
    fn duration(&self, token: Option<&&str>) -> Option<f64> {
        match token {
            None => Some(self.default_duration),
            Some(t) => parse_duration(t),
        }
    }

    /// `<note> [<duration>]`
    fn plain_note(&self, tokens: &[&str]) -> Option<Result<Event, ComposeError>> {
        let (head, tail) = tokens.split_first()?;
        if !is_note_like(head) || head.contains('-') || tail.len() > 1 {
            return None;
        }
        let duration = self.duration(tail.first())?;
        Some(resolve(head).map(|pitch| Event::Note { pitch, duration }))
    }

    /// `r [<duration>]`
    fn rest(&self, tokens: &[&str]) -> Option<Result<Event, ComposeError>> {
        let (head, tail) = tokens.split_first()?;
        if *head != "r" || tail.len() > 1 {
            return None;
        }
        let duration = self.duration(tail.first())?;
        Some(Ok(Event::Rest { duration }))
    }

    /// `<note>-<shorthand> [<duration>]`
    fn shorthand_chord(&self, tokens: &[&str]) -> Option<Result<Event, ComposeError>> {
        let (head, tail) = tokens.split_first()?;
        let (root, shorthand) = head.split_once('-')?;
        if !is_note_like(root) || tail.len() > 1 {
            return None;
        }
        let duration = self.duration(tail.first())?;

        let chord = resolve(root).and_then(|root_pitch| {
            let offsets: Vec<u32> = intervals_for(shorthand)?.iter().map(|&i| i as u32).collect();
            stack(root_pitch, &offsets, head)
        });
        Some(chord.map(|pitches| Event::Chord { pitches, duration }))
    }

    /// `<note> +<int> [+<int> ...] [<duration>]`
    fn custom_chord(&self, tokens: &[&str]) -> Option<Result<Event, ComposeError>> {
        let (head, tail) = tokens.split_first()?;
        if !is_note_like(head) || head.contains('-') {
            return None;
        }

        let interval_count = tail.iter().take_while(|t| t.starts_with('+')).count();
        if interval_count == 0 || tail.len() > interval_count + 1 {
            return None;
        }

        let mut offsets = vec![0u32];
        for token in &tail[..interval_count] {
            offsets.push(parse_interval(token)?);
        }
        let duration = self.duration(tail.get(interval_count))?;

        let chord = resolve(head).and_then(|root| stack(root, &offsets, head));
        Some(chord.map(|pitches| Event::Chord { pitches, duration }))
    }
}

/// Parse a single line with the default duration of one beat.
///
/// # Examples
/// ```
/// use pseudomidi::{parse_line, Event};
///
/// assert_eq!(parse_line("r").unwrap(), Event::Rest { duration: 1.0 });
/// assert_eq!(parse_line("C4 0.5").unwrap(), Event::Note { pitch: 60, duration: 0.5 });
/// ```
pub fn parse_line(line: &str) -> Result<Event, ComposeError> {
    LineParser::default().parse(line)
}

/// A token that commits to being a note: it starts with a note letter.
fn is_note_like(token: &str) -> bool {
    token
        .chars()
        .next()
        .map_or(false, |c| matches!(c.to_ascii_uppercase(), 'A'..='G'))
}

/// A token that looks like a number rather than the start of an event.
fn is_duration_like(token: &str) -> bool {
    token
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_digit() || c == '.')
}

/// Positive decimal duration. Signs, exponents, `inf` and `nan` are rejected.
fn parse_duration(token: &str) -> Option<f64> {
    let well_formed = token.chars().all(|c| c.is_ascii_digit() || c == '.')
        && token.chars().any(|c| c.is_ascii_digit());
    if !well_formed {
        return None;
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// `+<digits>`. Values too large for `u32` saturate and later fail the range check.
fn parse_interval(token: &str) -> Option<u32> {
    let digits = token.strip_prefix('+')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(digits.parse().unwrap_or(u32::MAX))
}

/// Split a physical line into event segments.
///
/// A new segment starts at every token that is neither a duration nor a
/// `+<int>` interval, so `C4 0.5 D4 +4 +7 1` becomes `C4 0.5` and `D4 +4 +7 1`.
pub fn split_events(line: &str) -> Vec<String> {
    let mut segments: Vec<Vec<&str>> = Vec::new();
    for token in line.split_whitespace() {
        let continues = is_duration_like(token) || token.starts_with('+');
        match segments.last_mut() {
            Some(segment) if continues => segment.push(token),
            _ => segments.push(vec![token]),
        }
    }
    segments.into_iter().map(|s| s.join(" ")).collect()
}

/// Recognize a `T<digits>` track marker token.
fn track_marker(token: &str) -> Option<Result<TrackId, ParseIntError>> {
    let digits = token.strip_prefix('T')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(digits.parse())
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with("//")
}

/// Accumulator threaded through the score fold.
#[derive(Default)]
struct ScoreState {
    current: Option<TrackId>,
    tracks: BTreeMap<TrackId, Track>,
}

/// Splits pseudocode into tracks and parses every event line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreParser {
    line_parser: LineParser,
}

impl ScoreParser {
    pub fn new(line_parser: LineParser) -> Self {
        Self { line_parser }
    }

    /// Parse the music body (frontmatter already removed) into tracks.
    ///
    /// # Errors
    /// - [`ComposeError::NoActiveTrack`] for an event line before the first marker
    /// - Any line-level error from [`LineParser::parse`], tagged with the
    ///   full physical line
    pub fn parse(&self, text: &str) -> Result<BTreeMap<TrackId, Track>, ComposeError> {
        let state = text
            .lines()
            .enumerate()
            .try_fold(ScoreState::default(), |state, (idx, line)| {
                self.fold_line(state, idx + 1, line)
            })?;

        for (id, events) in &state.tracks {
            debug!(track = id, events = events.len(), "parsed track");
        }
        Ok(state.tracks)
    }

    fn fold_line(&self, mut state: ScoreState, line_number: usize, line: &str) -> Result<ScoreState, ComposeError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment(trimmed) {
            return Ok(state);
        }
        trace!(line_number, line = trimmed, "parsing line");

        let invalid = || ComposeError::InvalidLine {
            line_number,
            line: line.to_string(),
        };

        let mut tokens = trimmed.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        if let Some(marker) = track_marker(first) {
            let id = marker.map_err(|_| invalid())?;
            if tokens.next().is_some() {
                return Err(invalid());
            }
            // Last marker for an id wins
            state.tracks.insert(id, Vec::new());
            state.current = Some(id);
            return Ok(state);
        }

        let id = state.current.ok_or_else(|| ComposeError::NoActiveTrack {
            line_number,
            line: line.to_string(),
        })?;

        let events = split_events(trimmed)
            .iter()
            .map(|segment| self.line_parser.parse(segment))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.in_line(line).at_line_number(line_number))?;

        state.tracks.entry(id).or_default().extend(events);
        Ok(state)
    }
}

/// Extract the YAML frontmatter block (between the first two `---` lines).
///
/// Returns `(metadata_content, music_source)`. Metadata lines are blanked
/// rather than removed so line numbers in errors still match the input.
fn extract_metadata(source: &str) -> (Option<String>, String) {
    let lines: Vec<&str> = source.lines().collect();

    let mut markers = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim() == "---")
        .map(|(i, _)| i);

    match (markers.next(), markers.next()) {
        (Some(start), Some(end)) => {
            let metadata_content = lines[start + 1..end].join("\n");
            let music: Vec<&str> = lines
                .iter()
                .enumerate()
                .map(|(i, line)| if (start..=end).contains(&i) { "" } else { *line })
                .collect();
            (Some(metadata_content), music.join("\n"))
        }
        _ => (None, source.to_string()),
    }
}

/// Parse and validate frontmatter content.
fn parse_yaml_metadata(content: &str) -> Result<Metadata, ComposeError> {
    if content.trim().is_empty() {
        return Ok(Metadata::default());
    }
    let metadata: Metadata =
        serde_yaml::from_str(content).map_err(|e| ComposeError::MetadataError(e.to_string()))?;
    ComposeOptions::default().merged_with(&metadata).validate()?;
    Ok(metadata)
}

/// Parse pseudocode with default options.
///
/// # Examples
/// ```
/// use pseudomidi::{parse, Event};
///
/// let score = parse("T0\nC4 0.5 D4 0.5\nT1\nC3-M 1.0").unwrap();
/// assert_eq!(score.tracks[&0].len(), 2);
/// assert_eq!(
///     score.tracks[&1],
///     vec![Event::Chord { pitches: vec![48, 52, 55], duration: 1.0 }]
/// );
/// ```
pub fn parse(source: &str) -> Result<Score, ComposeError> {
    parse_with_options(source, &ComposeOptions::default())
}

/// Parse pseudocode. Frontmatter `default-duration` overrides the one in `options`.
pub fn parse_with_options(source: &str, options: &ComposeOptions) -> Result<Score, ComposeError> {
    let (metadata_content, music_source) = extract_metadata(source);

    let metadata = match metadata_content {
        Some(content) => parse_yaml_metadata(&content)?,
        None => Metadata::default(),
    };

    let effective = options.merged_with(&metadata);
    let parser = ScoreParser::new(LineParser::new(effective.default_duration));
    let tracks = parser.parse(&music_source)?;

    Ok(Score { metadata, tracks })
}
