use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use tokio_modbus::Slave;
use tokio_modbus::client::sync::{self, Reader, Writer};
use tracing::debug;

use crate::backend::{BoxedTransport, Connector, DeviceTransport};
use crate::data::DeviceAddress;
use crate::error::{ConnectError, DeviceError, ExceptionCode};

/// Opens Modbus/TCP connections. The timeout bounds both connection setup
/// and every request made over the connection.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for TcpConnector {
    fn connect(&self, address: &DeviceAddress, unit_id: u8) -> Result<BoxedTransport, ConnectError> {
        let transport_error = |source: io::Error| ConnectError::Transport {
            address: address.to_string(),
            source,
        };
        let candidates = (address.host.as_str(), address.port)
            .to_socket_addrs()
            .map_err(transport_error)?;
        let context = connect_first(candidates, |socket_addr| {
            debug!(%address, %socket_addr, unit_id, "opening modbus tcp connection");
            sync::tcp::connect_slave_with_timeout(socket_addr, Slave(unit_id), Some(self.timeout))
        })
        .map_err(transport_error)?;
        Ok(Box::new(TcpTransport { context }))
    }
}

/// Tries each resolved address in order and returns the first connection,
/// or the last error if none succeeds.
fn connect_first<T>(
    candidates: impl IntoIterator<Item = SocketAddr>,
    mut attempt: impl FnMut(SocketAddr) -> io::Result<T>,
) -> io::Result<T> {
    let mut last_error = None;
    for socket_addr in candidates {
        match attempt(socket_addr) {
            Ok(connection) => return Ok(connection),
            Err(err) => {
                debug!(%socket_addr, %err, "connection attempt failed");
                last_error = Some(err);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "address did not resolve")))
}

pub(crate) struct TcpTransport {
    context: sync::Context,
}

impl DeviceTransport for TcpTransport {
    fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, DeviceError> {
        map_response(self.context.read_input_registers(address, count))
    }

    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, DeviceError> {
        map_response(self.context.read_holding_registers(address, count))
    }

    fn write_multiple_registers(&mut self, address: u16, words: &[u16]) -> Result<(), DeviceError> {
        map_response(self.context.write_multiple_registers(address, words))
    }

    fn write_single_coil(&mut self, address: u16, value: bool) -> Result<(), DeviceError> {
        map_response(self.context.write_single_coil(address, value))
    }
}

fn map_response<T>(response: tokio_modbus::Result<T>) -> Result<T, DeviceError> {
    match response {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(code)) => Err(DeviceError::Exception(ExceptionCode(u8::from(code)))),
        Err(tokio_modbus::Error::Transport(err)) => Err(DeviceError::from(err)),
        Err(err) => Err(DeviceError::Protocol(err.to_string())),
    }
}
