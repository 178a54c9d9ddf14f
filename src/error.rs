//! Error types for controller communication.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::data::Register;

/// Modbus exception code returned by a device in place of a normal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionCode(pub u8);

impl ExceptionCode {
    pub const ILLEGAL_FUNCTION: Self = Self(0x01);
    pub const ILLEGAL_DATA_ADDRESS: Self = Self(0x02);
    pub const ILLEGAL_DATA_VALUE: Self = Self(0x03);
    pub const SERVER_DEVICE_FAILURE: Self = Self(0x04);
    pub const SERVER_DEVICE_BUSY: Self = Self(0x06);

    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0x01 => Some("illegal function"),
            0x02 => Some("illegal data address"),
            0x03 => Some("illegal data value"),
            0x04 => Some("server device failure"),
            0x05 => Some("acknowledge"),
            0x06 => Some("server device busy"),
            0x08 => Some("memory parity error"),
            0x0A => Some("gateway path unavailable"),
            0x0B => Some("gateway target failed to respond"),
            _ => None,
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:02X} ({name})", self.0),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

/// Failure of a single request against a device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("not connected")]
    NotConnected,
    #[error("request timed out")]
    Timeout,
    #[error("device exception {0}")]
    Exception(ExceptionCode),
    #[error("short response: expected {expected} registers, got {actual}")]
    ShortResponse { expected: usize, actual: usize },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("transport error")]
    Transport(#[source] io::Error),
}

impl From<io::Error> for DeviceError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::TimedOut {
            DeviceError::Timeout
        } else {
            DeviceError::Transport(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("slot {slot} is out of range (capacity {capacity})")]
    SlotOutOfRange { slot: usize, capacity: usize },
    #[error("slot {0} already holds a connected controller")]
    SlotOccupied(usize),
    #[error("invalid device address {0:?}")]
    InvalidAddress(String),
    #[error("cannot connect to {address}")]
    Transport {
        address: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
#[error("read {register} failed")]
pub struct ReadError {
    pub register: Register,
    #[source]
    pub source: DeviceError,
}

#[derive(Debug, Error)]
#[error("write {register} failed")]
pub struct WriteError {
    pub register: Register,
    #[source]
    pub source: DeviceError,
}
