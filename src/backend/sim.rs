use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{BoxedTransport, Connector, DeviceTransport};
use crate::data::DeviceAddress;
use crate::error::{ConnectError, DeviceError};
use crate::sim::SimDevice;

pub type SharedSimDevice = Arc<Mutex<SimDevice>>;

/// Connects to simulated controllers.
///
/// Registered addresses resolve to their shared [`SimDevice`]. Unknown
/// addresses are refused unless the connector spawns devices on demand.
#[derive(Debug, Default)]
pub struct SimConnector {
    devices: Mutex<HashMap<DeviceAddress, SharedSimDevice>>,
    spawn_on_connect: bool,
}

impl SimConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector that creates a fresh dynamic device for any address.
    #[must_use]
    pub fn spawning() -> Self {
        Self {
            spawn_on_connect: true,
            ..Self::default()
        }
    }

    pub fn add_device(&self, address: DeviceAddress, device: SimDevice) -> SharedSimDevice {
        let shared = Arc::new(Mutex::new(device));
        lock(&self.devices).insert(address, Arc::clone(&shared));
        shared
    }
}

impl Connector for SimConnector {
    fn connect(&self, address: &DeviceAddress, _unit_id: u8) -> Result<BoxedTransport, ConnectError> {
        let mut devices = lock(&self.devices);
        let existing = devices.get(address).cloned();
        let device = match existing {
            Some(device) => device,
            None if self.spawn_on_connect => {
                let device = Arc::new(Mutex::new(SimDevice::dynamic()));
                devices.insert(address.clone(), Arc::clone(&device));
                device
            }
            None => {
                return Err(ConnectError::Transport {
                    address: address.to_string(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                });
            }
        };
        Ok(Box::new(SimTransport { device }))
    }
}

struct SimTransport {
    device: SharedSimDevice,
}

impl DeviceTransport for SimTransport {
    fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, DeviceError> {
        lock(&self.device).read_input_registers(address, count)
    }

    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, DeviceError> {
        lock(&self.device).read_holding_registers(address, count)
    }

    fn write_multiple_registers(&mut self, address: u16, words: &[u16]) -> Result<(), DeviceError> {
        lock(&self.device).write_multiple_registers(address, words)
    }

    fn write_single_coil(&mut self, address: u16, value: bool) -> Result<(), DeviceError> {
        lock(&self.device).write_single_coil(address, value)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
