//! Fixed-capacity set of controller slots.

use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use crate::backend::Connector;
use crate::data::{DeviceAddress, FlowReading, Register, SlotReading};
use crate::error::{ConnectError, DeviceError, WriteError};
use crate::link::ControllerLink;

/// Slot indices are stable: slots are never reordered or compacted, and an
/// empty slot is skipped when polling.
pub struct ControllerRegistry {
    connector: Box<dyn Connector + Send + Sync>,
    unit_id: u8,
    slots: Vec<Option<Arc<ControllerLink>>>,
}

impl ControllerRegistry {
    pub fn new(capacity: usize, unit_id: u8, connector: Box<dyn Connector + Send + Sync>) -> Self {
        Self {
            connector,
            unit_id,
            slots: vec![None; capacity],
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn link(&self, slot: usize) -> Option<Arc<ControllerLink>> {
        self.slots.get(slot).cloned().flatten()
    }

    #[must_use]
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(Option::is_some)
    }

    pub fn connect(&mut self, slot: usize, address: &str) -> Result<(), ConnectError> {
        self.connect_with_unit(slot, address, self.unit_id)
    }

    pub fn connect_with_unit(
        &mut self,
        slot: usize,
        address: &str,
        unit_id: u8,
    ) -> Result<(), ConnectError> {
        let capacity = self.capacity();
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(ConnectError::SlotOutOfRange { slot, capacity })?;
        if entry.is_some() {
            return Err(ConnectError::SlotOccupied(slot));
        }
        let address: DeviceAddress = address.parse()?;
        let link = ControllerLink::connect(self.connector.as_ref(), slot, address, unit_id)?;
        *entry = Some(Arc::new(link));
        Ok(())
    }

    /// Disconnects and clears the slot. Returns whether a link was removed.
    pub fn disconnect(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot).and_then(Option::take) {
            Some(link) => {
                link.disconnect();
                true
            }
            None => {
                debug!(slot, "disconnect on empty slot");
                false
            }
        }
    }

    /// Disconnects whichever slot holds this exact link instance.
    pub fn remove_link(&mut self, link: &Arc<ControllerLink>) -> Option<usize> {
        let slot = self
            .slots
            .iter()
            .position(|entry| entry.as_ref().is_some_and(|held| Arc::ptr_eq(held, link)))?;
        info!(slot, "removing controller by reference");
        self.disconnect(slot);
        Some(slot)
    }

    pub fn write_setpoint(&self, slot: usize, value: f32) -> Result<(), WriteError> {
        self.occupied_link(slot, Register::Setpoint)?
            .write_setpoint(value)
    }

    pub fn zero_flow(&self, slot: usize) -> Result<(), WriteError> {
        self.occupied_link(slot, Register::ZeroFlow)?.zero_flow()
    }

    /// Reads flow and setpoint from every occupied slot, one request at a
    /// time. A failing slot yields error readings and never stops the cycle.
    #[must_use]
    pub fn poll_all(&self) -> Vec<SlotReading> {
        self.occupied().map(|(slot, link)| poll_link(slot, link)).collect()
    }

    /// Same result as [`ControllerRegistry::poll_all`], with one thread per
    /// occupied slot. Requests to a single device are still sequential.
    #[must_use]
    pub fn poll_all_concurrent(&self) -> Vec<SlotReading> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .occupied()
                .map(|(slot, link)| (slot, scope.spawn(move || poll_link(slot, link))))
                .collect();
            handles
                .into_iter()
                .map(|(slot, handle)| {
                    handle.join().unwrap_or_else(|_| SlotReading {
                        slot,
                        flow: FlowReading::error(),
                        setpoint: FlowReading::error(),
                    })
                })
                .collect()
        })
    }

    fn occupied(&self) -> impl Iterator<Item = (usize, &ControllerLink)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_deref().map(|link| (slot, link)))
    }

    fn occupied_link(&self, slot: usize, register: Register) -> Result<&ControllerLink, WriteError> {
        self.slots
            .get(slot)
            .and_then(Option::as_deref)
            .ok_or(WriteError {
                register,
                source: DeviceError::NotConnected,
            })
    }
}

fn poll_link(slot: usize, link: &ControllerLink) -> SlotReading {
    SlotReading {
        slot,
        flow: link.read_flow(),
        setpoint: link.read_setpoint(),
    }
}
