//! # Pattern Library
//!
//! Named, parameter-free lighting patterns.
//!
//! ## Patterns
//! - **Steady** - light fully on, refreshed once a second
//! - **Fade** - breathing ramp 0.1 → 1.0 → 0.1 in 0.3 s steps with 1 s holds at each end
//! - **Show** - a long blink, ten short blinks, then the fade ramp
//! - **Morse** - a fixed message spelled out in Morse code
//!
//! Every pattern is one finite *period* of [`PatternStep`]s repeated forever.
//! [`PatternLibrary::steps`] hands out a fresh iterator starting at the first
//! step, so a pattern restarts from the top every time the engine picks it up
//! again. Patterns know nothing about cancellation; the playback engine checks
//! between steps.
//!
//! ## Morse Timing
//! | Element | Light | Duration |
//! |---|---|---|
//! | dot | on | 0.2 s |
//! | dash | on | 0.6 s |
//! | after every symbol | off | 0.2 s |
//! | after every letter | off | +0.6 s |
//! | space | off | 1.4 s |
//!
//! Characters without a Morse code are skipped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One actuator directive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternStep {
    /// Set the light to a level in `[0.0, 1.0]`
    Brightness(f64),
    /// Keep the outputs as they are for a while
    Hold(Duration),
}

/// An infinite, lazily repeated pattern
pub type PatternSteps = std::iter::Cycle<std::vec::IntoIter<PatternStep>>;

/// The selectable lighting patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    Steady,
    Fade,
    Show,
    Morse,
}

impl Pattern {
    pub const ALL: [Pattern; 4] = [Pattern::Steady, Pattern::Fade, Pattern::Show, Pattern::Morse];

    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Steady => "steady",
            Pattern::Fade => "fade",
            Pattern::Show => "show",
            Pattern::Morse => "morse",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown pattern '{}'", s.trim()))
    }
}

const STEADY_REFRESH: Duration = Duration::from_secs(1);
const FADE_STEP: Duration = Duration::from_millis(300);
const FADE_HOLD: Duration = Duration::from_secs(1);
const SHOW_LONG_BLINK: Duration = Duration::from_millis(800);
const SHOW_SHORT_BLINK: Duration = Duration::from_millis(200);
const SHOW_SHORT_BLINKS: usize = 10;

const MORSE_DOT: Duration = Duration::from_millis(200);
const MORSE_DASH: Duration = Duration::from_millis(600);
const MORSE_SYMBOL_GAP: Duration = Duration::from_millis(200);
const MORSE_LETTER_GAP: Duration = Duration::from_millis(600);
const MORSE_WORD_GAP: Duration = Duration::from_millis(1400);

/// Message spelled by the Morse pattern unless configured otherwise
pub const DEFAULT_MORSE_MESSAGE: &str = "SOS";

/// Dot/dash code for a character, case-insensitive
pub fn morse_code(c: char) -> Option<&'static str> {
    let code = match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        _ => return None,
    };
    Some(code)
}

/// Source of pattern step sequences
#[derive(Debug, Clone, PartialEq)]
pub struct PatternLibrary {
    morse_message: String,
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::new(DEFAULT_MORSE_MESSAGE)
    }
}

impl PatternLibrary {
    pub fn new(morse_message: impl Into<String>) -> Self {
        Self {
            morse_message: morse_message.into(),
        }
    }

    pub fn morse_message(&self) -> &str {
        &self.morse_message
    }

    /// A fresh, endlessly repeating step sequence for `pattern`.
    pub fn steps(&self, pattern: Pattern) -> PatternSteps {
        self.period(pattern).into_iter().cycle()
    }

    /// One period of `pattern`. Never empty.
    pub fn period(&self, pattern: Pattern) -> Vec<PatternStep> {
        match pattern {
            Pattern::Steady => vec![PatternStep::Brightness(1.0), PatternStep::Hold(STEADY_REFRESH)],
            Pattern::Fade => fade_period(),
            Pattern::Show => show_period(),
            Pattern::Morse => morse_period(&self.morse_message),
        }
    }
}

fn fade_period() -> Vec<PatternStep> {
    let mut steps = Vec::with_capacity(42);
    for level in 1..=10 {
        steps.push(PatternStep::Brightness(level as f64 / 10.0));
        steps.push(PatternStep::Hold(FADE_STEP));
    }
    steps.push(PatternStep::Hold(FADE_HOLD));
    for level in (1..=10).rev() {
        steps.push(PatternStep::Brightness(level as f64 / 10.0));
        steps.push(PatternStep::Hold(FADE_STEP));
    }
    steps.push(PatternStep::Hold(FADE_HOLD));
    steps
}

fn show_period() -> Vec<PatternStep> {
    let mut steps = vec![
        PatternStep::Brightness(1.0),
        PatternStep::Hold(SHOW_LONG_BLINK),
        PatternStep::Brightness(0.0),
        PatternStep::Hold(SHOW_LONG_BLINK),
    ];
    for _ in 0..SHOW_SHORT_BLINKS {
        steps.extend([
            PatternStep::Brightness(1.0),
            PatternStep::Hold(SHOW_SHORT_BLINK),
            PatternStep::Brightness(0.0),
            PatternStep::Hold(SHOW_SHORT_BLINK),
        ]);
    }
    steps.extend(fade_period());
    steps
}

/// Steps spelling `message` once, followed by a word gap before it repeats.
pub fn morse_period(message: &str) -> Vec<PatternStep> {
    let mut steps = Vec::new();
    for c in message.chars() {
        if c.is_whitespace() {
            steps.push(PatternStep::Brightness(0.0));
            steps.push(PatternStep::Hold(MORSE_WORD_GAP));
            continue;
        }
        let Some(code) = morse_code(c) else {
            log::warn!("no morse code for {:?}, skipping", c);
            continue;
        };
        for symbol in code.chars() {
            let on = if symbol == '-' { MORSE_DASH } else { MORSE_DOT };
            steps.push(PatternStep::Brightness(1.0));
            steps.push(PatternStep::Hold(on));
            steps.push(PatternStep::Brightness(0.0));
            steps.push(PatternStep::Hold(MORSE_SYMBOL_GAP));
        }
        steps.push(PatternStep::Hold(MORSE_LETTER_GAP));
    }
    steps.push(PatternStep::Brightness(0.0));
    steps.push(PatternStep::Hold(MORSE_WORD_GAP));
    steps
}
