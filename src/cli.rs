//! Command-line interface for pttlink.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use pttlink_lib::domain::PttType;

/// Key a transmitter through a serial port's DTR or RTS line.
#[derive(Debug, Parser)]
#[command(name = "pttlink", version, about)]
pub struct Cli {
    /// Use in-memory serial ports instead of hardware.
    #[arg(long, env = "MOCK_SERIAL", global = true)]
    pub mock: bool,

    /// Directory holding saved profiles.
    #[arg(long, env = "PTTLINK_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Take port, line and timing from this saved profile.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Control line wired to the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LineArg {
    Dtr,
    Rts,
}

impl From<LineArg> for PttType {
    fn from(line: LineArg) -> Self {
        match line {
            LineArg::Dtr => PttType::Dtr,
            LineArg::Rts => PttType::Rts,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List serial ports.
    List,

    /// Key the transmitter for a while, then release it.
    Key {
        /// Serial port, e.g. /dev/ttyUSB0 or COM3.
        #[arg(long, short)]
        port: Option<String>,

        /// Control line carrying PTT.
        #[arg(long, value_enum)]
        line: Option<LineArg>,

        /// Settle time before the line is asserted.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Hold time before the line is released.
        #[arg(long)]
        tail_ms: Option<u64>,

        /// How long to stay keyed.
        #[arg(long, default_value = "1000")]
        hold_ms: u64,
    },

    /// Send Morse code on the control line.
    Cw {
        /// Serial port, e.g. /dev/ttyUSB0 or COM3.
        #[arg(long, short)]
        port: Option<String>,

        /// Control line wired to the key input.
        #[arg(long, value_enum)]
        line: Option<LineArg>,

        /// Speed in words per minute.
        #[arg(long)]
        wpm: Option<u32>,

        /// Text to send.
        text: String,
    },

    /// Manage saved profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProfileAction {
    /// List saved profiles.
    List,

    /// Save a profile.
    Save {
        name: String,

        #[arg(long, short)]
        port: Option<String>,

        /// DTR, RTS or NONE.
        #[arg(long, default_value = "DTR")]
        ptt_type: PttType,

        /// Share the port with the radio-control link.
        #[arg(long)]
        share: bool,

        #[arg(long, default_value = "100")]
        delay_ms: u64,

        #[arg(long, default_value = "0")]
        tail_ms: u64,

        #[arg(long, default_value = "24")]
        wpm: u32,
    },

    /// Print a profile as JSON.
    Show { name: String },

    /// Delete a profile.
    Delete { name: String },
}
