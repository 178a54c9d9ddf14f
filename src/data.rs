use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::constants::{COIL_ZERO_FLOW, DEFAULT_PORT, REG_FLOW, REG_SETPOINT};
use crate::error::ConnectError;

/// Entries of the controller register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Flow,
    Setpoint,
    ZeroFlow,
}

impl Register {
    #[must_use]
    pub const fn address(self) -> u16 {
        match self {
            Self::Flow => REG_FLOW,
            Self::Setpoint => REG_SETPOINT,
            Self::ZeroFlow => COIL_ZERO_FLOW,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Flow => "flow input registers",
            Self::Setpoint => "setpoint holding registers",
            Self::ZeroFlow => "zero-flow coil",
        };
        f.write_str(name)
    }
}

/// Network location of one controller. The port defaults to 502.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for DeviceAddress {
    type Err = ConnectError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || ConnectError::InvalidAddress(input.to_string());
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(invalid());
        }

        if let Ok(socket) = trimmed.parse::<SocketAddr>() {
            return Ok(Self::new(socket.ip().to_string(), socket.port()));
        }

        let bare = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed);
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return Ok(Self::new(ip.to_string(), DEFAULT_PORT));
        }

        match trimmed.rsplit_once(':') {
            Some((host, port)) => {
                if host.is_empty() || host.contains(':') {
                    return Err(invalid());
                }
                let port = port.parse::<u16>().map_err(|_| invalid())?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(trimmed, DEFAULT_PORT)),
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Ok,
    ReadError,
}

/// One polled value. `value` is present exactly when `status` is `Ok`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowReading {
    pub value: Option<f32>,
    pub status: ReadStatus,
}

impl FlowReading {
    #[must_use]
    pub const fn ok(value: f32) -> Self {
        Self {
            value: Some(value),
            status: ReadStatus::Ok,
        }
    }

    #[must_use]
    pub const fn error() -> Self {
        Self {
            value: None,
            status: ReadStatus::ReadError,
        }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, ReadStatus::Ok)
    }
}

/// Result of polling one occupied slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotReading {
    pub slot: usize,
    pub flow: FlowReading,
    pub setpoint: FlowReading,
}
