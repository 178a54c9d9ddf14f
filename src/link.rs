//! A connection to one mass flow controller.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::backend::{BoxedTransport, Connector, DeviceTransport};
use crate::codec::{decode_f32_words, encode_f32};
use crate::constants::{COIL_ZERO_FLOW, FLOAT_REG_COUNT, REG_FLOW, REG_SETPOINT};
use crate::data::{DeviceAddress, FlowReading, Register};
use crate::error::{ConnectError, DeviceError, ReadError, WriteError};

/// Owns the transport to a single controller.
///
/// Every operation holds the transport lock for its whole Modbus
/// transaction, so at most one request is in flight per connection and
/// [`ControllerLink::disconnect`] waits for a running request to finish.
pub struct ControllerLink {
    slot: usize,
    address: DeviceAddress,
    unit_id: u8,
    name: String,
    transport: Mutex<Option<BoxedTransport>>,
}

impl ControllerLink {
    pub fn connect(
        connector: &dyn Connector,
        slot: usize,
        address: DeviceAddress,
        unit_id: u8,
    ) -> Result<Self, ConnectError> {
        let transport = connector.connect(&address, unit_id)?;
        info!(slot, %address, unit_id, "controller connected");
        Ok(Self {
            slot,
            name: format!("MFC {}", address.host),
            address,
            unit_id,
            transport: Mutex::new(Some(transport)),
        })
    }

    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    #[must_use]
    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    pub fn read_flow(&self) -> FlowReading {
        self.reading(self.try_read_flow())
    }

    pub fn read_setpoint(&self) -> FlowReading {
        self.reading(self.try_read_setpoint())
    }

    pub fn try_read_flow(&self) -> Result<f32, ReadError> {
        self.read_float(Register::Flow, |transport| {
            transport.read_input_registers(REG_FLOW, FLOAT_REG_COUNT)
        })
    }

    pub fn try_read_setpoint(&self) -> Result<f32, ReadError> {
        self.read_float(Register::Setpoint, |transport| {
            transport.read_holding_registers(REG_SETPOINT, FLOAT_REG_COUNT)
        })
    }

    /// Writes `value` unchanged. Rounding for display precision is the
    /// caller's job.
    pub fn write_setpoint(&self, value: f32) -> Result<(), WriteError> {
        let (word0, word1) = encode_f32(value);
        debug!(slot = self.slot, value, "writing setpoint");
        self.with_transport(|transport| {
            transport.write_multiple_registers(REG_SETPOINT, &[word0, word1])
        })
        .map_err(|source| self.write_error(Register::Setpoint, source))
    }

    /// Asks the device to re-zero its flow baseline. Only the acknowledgement
    /// is checked.
    pub fn zero_flow(&self) -> Result<(), WriteError> {
        debug!(slot = self.slot, "writing zero-flow coil");
        self.with_transport(|transport| transport.write_single_coil(COIL_ZERO_FLOW, true))
            .map_err(|source| self.write_error(Register::ZeroFlow, source))
    }

    /// Closes the transport. Safe to call more than once.
    pub fn disconnect(&self) {
        if self.lock().take().is_some() {
            info!(slot = self.slot, address = %self.address, "controller disconnected");
        }
    }

    fn read_float(
        &self,
        register: Register,
        request: impl FnOnce(&mut dyn DeviceTransport) -> Result<Vec<u16>, DeviceError>,
    ) -> Result<f32, ReadError> {
        self.with_transport(|transport| {
            let words = request(transport)?;
            decode_f32_words(&words).ok_or(DeviceError::ShortResponse {
                expected: usize::from(FLOAT_REG_COUNT),
                actual: words.len(),
            })
        })
        .map_err(|source| ReadError { register, source })
    }

    fn reading(&self, result: Result<f32, ReadError>) -> FlowReading {
        match result {
            Ok(value) => FlowReading::ok(value),
            Err(err) => {
                warn!(slot = self.slot, error = %err, cause = %err.source, "poll read failed");
                FlowReading::error()
            }
        }
    }

    fn write_error(&self, register: Register, source: DeviceError) -> WriteError {
        warn!(slot = self.slot, %register, cause = %source, "write failed");
        WriteError { register, source }
    }

    fn with_transport<T>(
        &self,
        operation: impl FnOnce(&mut dyn DeviceTransport) -> Result<T, DeviceError>,
    ) -> Result<T, DeviceError> {
        let mut guard = self.lock();
        let transport = guard.as_mut().ok_or(DeviceError::NotConnected)?;
        operation(transport.as_mut())
    }

    fn lock(&self) -> MutexGuard<'_, Option<BoxedTransport>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ControllerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerLink")
            .field("slot", &self.slot)
            .field("address", &self.address)
            .field("unit_id", &self.unit_id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
