use std::time::Duration;

pub const REG_FLOW: u16 = 0x4000;
pub const REG_SETPOINT: u16 = 0xA000;
pub const COIL_ZERO_FLOW: u16 = 0xE003;

/// Number of 16-bit registers holding one float32 value.
pub const FLOAT_REG_COUNT: u16 = 2;

pub const DEFAULT_PORT: u16 = 502;
pub const DEFAULT_UNIT_ID: u8 = 1;
pub const DEFAULT_CONTROLLER_COUNT: usize = 3;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(1000);

pub const FLOW_UNIT: &str = "SCCM";
