//! Configuration profiles
//!
//! A PttConfig is a saved profile describing how a station keys its
//! transmitter: which serial port, which control line, whether the port is
//! shared with the radio-control link, and the timing around key-down.

use serde::{Deserialize, Serialize};

use super::{PttError, PttResult};

/// Slowest CW speed the keyer accepts
pub const MIN_CW_WPM: u32 = 5;
/// Fastest CW speed the keyer accepts
pub const MAX_CW_WPM: u32 = 99;

/// How the transmitter is keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PttType {
    /// No hardware PTT; keying is left to VOX or the radio itself
    None,
    #[default]
    Dtr,
    Rts,
}

impl std::str::FromStr for PttType {
    type Err = PttError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(PttType::None),
            "DTR" => Ok(PttType::Dtr),
            "RTS" => Ok(PttType::Rts),
            other => Err(PttError::Config(format!("Unknown PTT type: '{other}'"))),
        }
    }
}

fn default_delay_ms() -> u64 {
    100
}

fn default_cw_wpm() -> u32 {
    24
}

/// A saved PTT profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PttConfig {
    /// Profile name (e.g., "FT-991A Home", "IC-7300 Portable")
    pub name: String,
    #[serde(default)]
    pub ptt_type: PttType,
    /// Serial port carrying the PTT line
    #[serde(default)]
    pub port: Option<String>,
    /// Reuse the port already opened for radio control instead of opening it
    #[serde(default)]
    pub share_port: bool,
    /// Settle time between the `on()` request and asserting the line
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Hold time before `off()` de-asserts the line
    #[serde(default)]
    pub tail_ms: u64,
    /// CW keyer speed in words per minute
    #[serde(default = "default_cw_wpm")]
    pub cw_wpm: u32,
}

impl Default for PttConfig {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            ptt_type: PttType::default(),
            port: None,
            share_port: false,
            delay_ms: default_delay_ms(),
            tail_ms: 0,
            cw_wpm: default_cw_wpm(),
        }
    }
}

impl PttConfig {
    /// Check the profile is usable before building anything from it.
    pub fn validate(&self) -> PttResult<()> {
        let has_port = self.port.as_deref().is_some_and(|p| !p.is_empty());
        if self.ptt_type != PttType::None && !self.share_port && !has_port {
            return Err(PttError::Config(format!(
                "Profile '{}' uses {:?} PTT but names no serial port",
                self.name, self.ptt_type
            )));
        }
        if !(MIN_CW_WPM..=MAX_CW_WPM).contains(&self.cw_wpm) {
            return Err(PttError::Config(format!(
                "CW speed {} WPM is outside {MIN_CW_WPM}-{MAX_CW_WPM}",
                self.cw_wpm
            )));
        }
        Ok(())
    }
}
