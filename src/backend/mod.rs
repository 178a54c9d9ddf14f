use crate::data::DeviceAddress;
use crate::error::{ConnectError, DeviceError};

pub mod remote;
pub mod sim;

pub use remote::TcpConnector;
pub use sim::SimConnector;

/// One open connection to a controller. Implementations perform a single
/// Modbus transaction per call.
pub trait DeviceTransport {
    fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, DeviceError>;
    fn read_holding_registers(&mut self, address: u16, count: u16)
    -> Result<Vec<u16>, DeviceError>;
    fn write_multiple_registers(&mut self, address: u16, words: &[u16]) -> Result<(), DeviceError>;
    fn write_single_coil(&mut self, address: u16, value: bool) -> Result<(), DeviceError>;
}

pub type BoxedTransport = Box<dyn DeviceTransport + Send>;

/// Opens transports for controller addresses.
pub trait Connector {
    fn connect(&self, address: &DeviceAddress, unit_id: u8) -> Result<BoxedTransport, ConnectError>;
}
