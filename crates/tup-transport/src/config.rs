//! Serial line settings.

use std::fmt;

use crate::error::{Result, TransportError};

/// Supported line speeds.
///
/// The discriminant order matches the index used by the bindings
/// (`0 = 1200` .. `7 = 115200`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Baudrate {
    B1200,
    B2400,
    B4800,
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
}

impl Baudrate {
    /// Every supported speed, in index order.
    pub const ALL: [Baudrate; 8] = [
        Baudrate::B1200,
        Baudrate::B2400,
        Baudrate::B4800,
        Baudrate::B9600,
        Baudrate::B19200,
        Baudrate::B38400,
        Baudrate::B57600,
        Baudrate::B115200,
    ];

    /// Resolve a speed from its binding index.
    pub fn from_index(index: i32) -> Result<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| TransportError::InvalidConfig(format!("unknown baudrate index {index}")))
    }

    /// Resolve a speed from bits per second.
    pub fn from_bps(bps: u32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.bps() == bps)
            .ok_or_else(|| TransportError::InvalidConfig(format!("unsupported baudrate {bps}")))
    }

    /// Binding index of this speed.
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Bits per second.
    pub fn bps(self) -> u32 {
        match self {
            Baudrate::B1200 => 1200,
            Baudrate::B2400 => 2400,
            Baudrate::B4800 => 4800,
            Baudrate::B9600 => 9600,
            Baudrate::B19200 => 19200,
            Baudrate::B38400 => 38400,
            Baudrate::B57600 => 57600,
            Baudrate::B115200 => 115200,
        }
    }
}

/// Parity bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl Parity {
    /// Resolve a parity mode from its binding index (`0 = none`, `1 = odd`, `2 = even`).
    pub fn from_index(index: i32) -> Result<Self> {
        match index {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Odd),
            2 => Ok(Parity::Even),
            other => Err(TransportError::InvalidConfig(format!(
                "unknown parity index {other}"
            ))),
        }
    }

    fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

/// Line settings applied to a link before it is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Line speed.
    pub baudrate: Baudrate,
    /// Parity mode. Data bits are always 8 and stop bits 1.
    pub parity: Parity,
    /// RTS/CTS hardware flow control.
    pub flow_control: bool,
}

impl SerialConfig {
    /// Create a configuration from typed settings.
    pub fn new(baudrate: Baudrate, parity: Parity, flow_control: bool) -> Self {
        Self {
            baudrate,
            parity,
            flow_control,
        }
    }

    /// Create a configuration from the raw values used by the bindings.
    pub fn from_raw(baudrate_index: i32, parity_index: i32, flow_control: bool) -> Result<Self> {
        Ok(Self::new(
            Baudrate::from_index(baudrate_index)?,
            Parity::from_index(parity_index)?,
            flow_control,
        ))
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(Baudrate::B115200, Parity::None, false)
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} 8{}1 (flow control {})",
            self.baudrate.bps(),
            self.parity.letter(),
            if self.flow_control { "on" } else { "off" }
        )
    }
}
