//! Monitoring and control core for Modbus/TCP mass flow controllers.
//!
//! A [`ControllerRegistry`] holds a fixed number of slots, each optionally
//! occupied by a [`ControllerLink`] to one device. The registry is polled by
//! an external scheduler through [`ControllerRegistry::poll_all`].

pub mod backend;
pub mod codec;
pub mod constants;
pub mod data;
pub mod error;
pub mod link;
pub mod registry;
pub mod sim;

pub use backend::{Connector, DeviceTransport, SimConnector, TcpConnector};
pub use data::{DeviceAddress, FlowReading, ReadStatus, Register, SlotReading};
pub use error::{ConnectError, DeviceError, ExceptionCode, ReadError, WriteError};
pub use link::ControllerLink;
pub use registry::ControllerRegistry;
