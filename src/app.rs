use mfc_monitor::{FlowReading, SlotReading};

use crate::transport::{NoticeLevel, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Address,
    Setpoint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Empty,
    Connecting,
    Connected { name: String },
}

#[derive(Debug, Clone)]
pub struct SlotView {
    pub address: String,
    pub state: SlotState,
    pub flow: Option<FlowReading>,
    pub setpoint: Option<FlowReading>,
}

impl SlotView {
    fn empty() -> Self {
        Self {
            address: String::new(),
            state: SlotState::Empty,
            flow: None,
            setpoint: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SlotState::Connected { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug)]
pub struct AppState {
    pub slots: Vec<SlotView>,
    pub selected: usize,
    pub input_mode: Option<InputMode>,
    pub input_buffer: String,
    pub notice: Option<Notice>,
    pub should_quit: bool,
    pub simulate: bool,
    pub read_only: bool,
}

impl AppState {
    pub fn new(capacity: usize, simulate: bool, read_only: bool) -> Self {
        Self {
            slots: vec![SlotView::empty(); capacity],
            selected: 0,
            input_mode: None,
            input_buffer: String::new(),
            notice: None,
            should_quit: false,
            simulate,
            read_only,
        }
    }

    pub fn selected_slot(&self) -> &SlotView {
        &self.slots[self.selected]
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % self.slots.len();
    }

    pub fn select_previous(&mut self) {
        self.selected = self
            .selected
            .checked_sub(1)
            .unwrap_or(self.slots.len() - 1);
    }

    pub fn mark_connecting(&mut self, slot: usize, address: &str) {
        if let Some(view) = self.slots.get_mut(slot) {
            view.address = address.to_string();
            view.state = SlotState::Connecting;
        }
    }

    pub fn apply_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Readings(readings) => self.apply_readings(&readings),
            TransportEvent::Connected { slot, name } => {
                if let Some(view) = self.slots.get_mut(slot) {
                    view.state = SlotState::Connected { name };
                }
            }
            TransportEvent::ConnectFailed { slot, message } => {
                if let Some(view) = self.slots.get_mut(slot) {
                    view.state = SlotState::Empty;
                }
                self.set_notice(NoticeLevel::Error, message);
            }
            TransportEvent::Disconnected(slot) => {
                if let Some(view) = self.slots.get_mut(slot) {
                    *view = SlotView::empty();
                }
            }
            TransportEvent::SetpointWritten { slot, value } => {
                if let Some(view) = self.slots.get_mut(slot) {
                    view.setpoint = Some(FlowReading::ok(value));
                }
            }
            TransportEvent::Notice { level, message } => self.set_notice(level, message),
            TransportEvent::Error(err) => {
                self.set_notice(NoticeLevel::Error, format!("{err:#}"));
            }
        }
    }

    pub fn set_notice(&mut self, level: NoticeLevel, message: String) {
        self.notice = Some(Notice { level, message });
    }

    fn apply_readings(&mut self, readings: &[SlotReading]) {
        for reading in readings {
            if let Some(view) = self.slots.get_mut(reading.slot)
                && view.is_connected()
            {
                view.flow = Some(reading.flow);
                view.setpoint = Some(reading.setpoint);
            }
        }
    }
}
