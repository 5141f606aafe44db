use clap::{Parser, ValueEnum};

use crate::dispatcher::Policy;

/// Workstation-side dispatcher for the Julia-set compute protocol.
#[derive(Parser, Debug)]
#[command(name = "juliawire-host", version, about)]
pub struct Cli {
    /// Serial device path (e.g. /dev/ttyUSB0 or COM3).
    pub port: String,

    /// Initial UART baud rate.
    #[arg(long, default_value_t = protocol::DEFAULT_BAUD)]
    pub baud: u32,

    /// Chunk-selection policy.
    #[arg(long, value_enum, default_value_t = PolicyArg::Sequential)]
    pub policy: PolicyArg,

    /// Number of chunk rows the image is divided into.
    #[arg(long, default_value_t = 2)]
    pub chunk_rows: u8,

    /// Number of chunk columns the image is divided into.
    #[arg(long, default_value_t = 2)]
    pub chunk_cols: u8,

    /// Square image side length in pixels.
    #[arg(long, default_value_t = 64)]
    pub image_size: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    Sequential,
    Random,
}

impl From<PolicyArg> for Policy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Sequential => Policy::Sequential,
            PolicyArg::Random => Policy::Random,
        }
    }
}

/// One interactive keystroke command (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Go,
    Abort,
    ClearChunks,
    ResetDevice,
    TogglePolicy,
    Info,
    LocalCompute,
    ExportFramebuffer,
    CycleBaud,
    ToggleVerbose,
    FullRecompute,
    ForceQuit,
}

impl Command {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'h' => Self::Help,
            'q' => Self::Quit,
            'g' => Self::Go,
            'a' => Self::Abort,
            'c' => Self::ClearChunks,
            'r' => Self::ResetDevice,
            'p' => Self::TogglePolicy,
            'i' => Self::Info,
            's' => Self::LocalCompute,
            'e' => Self::ExportFramebuffer,
            'b' => Self::CycleBaud,
            'd' => Self::ToggleVerbose,
            'f' => Self::FullRecompute,
            'x' => Self::ForceQuit,
            _ => return None,
        })
    }
}

pub const HELP_TEXT: &str = "\
h  help                  q  quit
g  go (start compute)    a  abort in-flight chunk
c  clear chunk bitmap    r  reset device
p  toggle policy         i  status info
s  local compute (no device)
e  export framebuffer    b  cycle baud rate
d  toggle verbose log    f  clear + restart
x  force quit";
