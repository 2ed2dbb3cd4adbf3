//! CW element timing derived from speed in words per minute.
//!
//! Uses the PARIS standard: a dot lasts 1200 / WPM milliseconds.

use std::time::Duration;

use crate::domain::{PttError, PttResult, MAX_CW_WPM, MIN_CW_WPM};

use super::morse::{self, DOT};

const DASH_DOT_RATIO: u64 = 3;
const MARK_SPACE_RATIO: u64 = 1;
const CHAR_SPACE_RATIO: u64 = 3;
const WORD_SPACE_RATIO: u64 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CwTiming {
    pub wpm: u32,
    pub dot: Duration,
    pub dash: Duration,
    /// Gap between elements of one character
    pub mark_space: Duration,
    /// Gap between characters of one word
    pub char_space: Duration,
    /// Gap for a space in the text
    pub word_space: Duration,
}

impl CwTiming {
    pub fn from_wpm(wpm: u32) -> PttResult<Self> {
        if !(MIN_CW_WPM..=MAX_CW_WPM).contains(&wpm) {
            return Err(PttError::Keyer(format!(
                "CW speed {wpm} WPM is outside {MIN_CW_WPM}-{MAX_CW_WPM}"
            )));
        }
        let dot_ms = 1200 / u64::from(wpm);
        Ok(Self {
            wpm,
            dot: Duration::from_millis(dot_ms),
            dash: Duration::from_millis(dot_ms * DASH_DOT_RATIO),
            mark_space: Duration::from_millis(dot_ms * MARK_SPACE_RATIO),
            char_space: Duration::from_millis(dot_ms * CHAR_SPACE_RATIO),
            word_space: Duration::from_millis(dot_ms * WORD_SPACE_RATIO),
        })
    }

    /// How long `text` keeps the line busy at this speed, gaps included.
    /// Stops at the first character with no code, as the keyer does.
    pub fn air_time(&self, text: &str) -> Duration {
        let chars: Vec<char> = text.chars().collect();
        let mut total = Duration::ZERO;
        for (i, &c) in chars.iter().enumerate() {
            if c == ' ' {
                total += self.word_space;
                continue;
            }
            let Some(code) = morse::code_for(c) else {
                break;
            };
            for (j, element) in code.chars().enumerate() {
                if j > 0 {
                    total += self.mark_space;
                }
                total += if element == DOT { self.dot } else { self.dash };
            }
            if chars.get(i + 1).is_some_and(|next| *next != ' ') {
                total += self.char_space;
            }
        }
        total
    }
}
