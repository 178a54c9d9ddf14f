//! In-memory model of a mass flow controller's Modbus register map.

use std::io;

use crate::codec::{decode_f32_words, encode_f32};
use crate::constants::{COIL_ZERO_FLOW, FLOAT_REG_COUNT, REG_FLOW, REG_SETPOINT};
use crate::error::{DeviceError, ExceptionCode};

const SETPOINT_MAX: f32 = 1000.0;
const RESPONSE_GAIN: f32 = 0.2;

/// Failures a simulated device can be told to produce.
#[derive(Debug, Clone, Default)]
pub struct SimFaults {
    pub flow_exception: Option<ExceptionCode>,
    pub setpoint_exception: Option<ExceptionCode>,
    pub write_exception: Option<ExceptionCode>,
    pub coil_exception: Option<ExceptionCode>,
    /// Answer register reads with a single word.
    pub short_reads: bool,
    /// Fail every request at the transport level.
    pub offline: bool,
}

#[derive(Debug, Clone)]
pub struct SimDevice {
    flow: f32,
    setpoint: f32,
    baseline: f32,
    dynamic: bool,
    zero_count: u32,
    pub faults: SimFaults,
}

impl SimDevice {
    /// A device whose flow only changes through [`SimDevice::set_flow`].
    #[must_use]
    pub fn fixed(flow: f32, setpoint: f32) -> Self {
        Self {
            flow,
            setpoint,
            baseline: 0.0,
            dynamic: false,
            zero_count: 0,
            faults: SimFaults::default(),
        }
    }

    /// A device whose flow follows the setpoint on every read.
    #[must_use]
    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            ..Self::fixed(0.0, 0.0)
        }
    }

    pub fn set_flow(&mut self, flow: f32) {
        self.flow = flow;
    }

    #[must_use]
    pub fn flow(&self) -> f32 {
        self.flow - self.baseline
    }

    #[must_use]
    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    #[must_use]
    pub fn zero_count(&self) -> u32 {
        self.zero_count
    }

    fn tick(&mut self) {
        if self.dynamic {
            let delta = self.setpoint - self.flow;
            self.flow += delta * RESPONSE_GAIN;
        }
    }

    fn check_online(&self) -> Result<(), DeviceError> {
        if self.faults.offline {
            return Err(DeviceError::Transport(io::Error::from(
                io::ErrorKind::ConnectionReset,
            )));
        }
        Ok(())
    }

    fn float_words(&self, value: f32, count: u16) -> Vec<u16> {
        let (word0, word1) = encode_f32(value);
        if self.faults.short_reads {
            vec![word0]
        } else {
            let mut words = vec![word0, word1];
            words.resize(usize::from(count.max(FLOAT_REG_COUNT)), 0);
            words
        }
    }

    pub fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, DeviceError> {
        self.check_online()?;
        if let Some(code) = self.faults.flow_exception {
            return Err(DeviceError::Exception(code));
        }
        if address != REG_FLOW || count == 0 {
            return Err(DeviceError::Exception(ExceptionCode::ILLEGAL_DATA_ADDRESS));
        }
        self.tick();
        Ok(self.float_words(self.flow(), count))
    }

    pub fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, DeviceError> {
        self.check_online()?;
        if let Some(code) = self.faults.setpoint_exception {
            return Err(DeviceError::Exception(code));
        }
        if address != REG_SETPOINT || count == 0 {
            return Err(DeviceError::Exception(ExceptionCode::ILLEGAL_DATA_ADDRESS));
        }
        Ok(self.float_words(self.setpoint, count))
    }

    pub fn write_multiple_registers(&mut self, address: u16, words: &[u16]) -> Result<(), DeviceError> {
        self.check_online()?;
        if let Some(code) = self.faults.write_exception {
            return Err(DeviceError::Exception(code));
        }
        if address != REG_SETPOINT || words.len() != usize::from(FLOAT_REG_COUNT) {
            return Err(DeviceError::Exception(ExceptionCode::ILLEGAL_DATA_ADDRESS));
        }
        let value = decode_f32_words(words)
            .filter(|value| (0.0..=SETPOINT_MAX).contains(value))
            .ok_or(DeviceError::Exception(ExceptionCode::ILLEGAL_DATA_VALUE))?;
        self.setpoint = value;
        Ok(())
    }

    pub fn write_single_coil(&mut self, address: u16, value: bool) -> Result<(), DeviceError> {
        self.check_online()?;
        if let Some(code) = self.faults.coil_exception {
            return Err(DeviceError::Exception(code));
        }
        if address != COIL_ZERO_FLOW {
            return Err(DeviceError::Exception(ExceptionCode::ILLEGAL_DATA_ADDRESS));
        }
        if value {
            self.baseline = self.flow;
            self.zero_count += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SimDevice;
    use crate::codec::{decode_f32, encode_f32};
    use crate::constants::{COIL_ZERO_FLOW, REG_FLOW, REG_SETPOINT};
    use crate::error::{DeviceError, ExceptionCode};

    #[test]
    fn fixed_device_serves_encoded_floats() {
        let mut device = SimDevice::fixed(5.125, 5.0);
        let flow = device
            .read_input_registers(REG_FLOW, 2)
            .expect("flow read should succeed");
        assert_eq!(decode_f32(flow[0], flow[1]), 5.125);

        let setpoint = device
            .read_holding_registers(REG_SETPOINT, 2)
            .expect("setpoint read should succeed");
        assert_eq!(decode_f32(setpoint[0], setpoint[1]), 5.0);
    }

    #[test]
    fn dynamic_flow_approaches_setpoint() {
        let mut device = SimDevice::dynamic();
        let (word0, word1) = encode_f32(50.0);
        device
            .write_multiple_registers(REG_SETPOINT, &[word0, word1])
            .expect("setpoint write should succeed");

        let mut last = 0.0;
        for _ in 0..20 {
            let words = device
                .read_input_registers(REG_FLOW, 2)
                .expect("flow read should succeed");
            let flow = decode_f32(words[0], words[1]);
            assert!(flow > last && flow <= 50.0);
            last = flow;
        }
        assert!(last > 49.0);
    }

    #[test]
    fn out_of_range_setpoint_is_rejected() {
        let mut device = SimDevice::fixed(0.0, 5.0);
        let (word0, word1) = encode_f32(-1.0);
        let err = device
            .write_multiple_registers(REG_SETPOINT, &[word0, word1])
            .expect_err("negative setpoint should fail");
        assert!(matches!(
            err,
            DeviceError::Exception(ExceptionCode::ILLEGAL_DATA_VALUE)
        ));
        assert_eq!(device.setpoint(), 5.0);
    }

    #[test]
    fn zero_flow_rebases_reported_flow() {
        let mut device = SimDevice::fixed(0.4, 0.0);
        device
            .write_single_coil(COIL_ZERO_FLOW, true)
            .expect("coil write should succeed");
        assert_eq!(device.flow(), 0.0);
        assert_eq!(device.zero_count(), 1);
    }

    #[test]
    fn unmapped_addresses_raise_illegal_data_address() {
        let mut device = SimDevice::fixed(1.0, 1.0);
        let err = device
            .read_input_registers(REG_SETPOINT, 2)
            .expect_err("wrong bank should fail");
        assert!(matches!(
            err,
            DeviceError::Exception(ExceptionCode::ILLEGAL_DATA_ADDRESS)
        ));
    }

    #[test]
    fn short_reads_return_one_word() {
        let mut device = SimDevice::fixed(1.0, 1.0);
        device.faults.short_reads = true;
        let words = device
            .read_input_registers(REG_FLOW, 2)
            .expect("read should still answer");
        assert_eq!(words.len(), 1);
    }
}
