use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::eyre;
use mfc_monitor::{ConnectError, ControllerRegistry, SlotReading};
use tracing::{debug, info};

use crate::interface::InterfaceMode;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Connect { slot: usize, address: String },
    Disconnect(usize),
    WriteSetpoint { slot: usize, value: f32 },
    ZeroFlow(usize),
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug)]
pub enum TransportEvent {
    Readings(Vec<SlotReading>),
    Connected { slot: usize, name: String },
    ConnectFailed { slot: usize, message: String },
    Disconnected(usize),
    SetpointWritten { slot: usize, value: f32 },
    Notice { level: NoticeLevel, message: String },
    Error(eyre::Report),
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub capacity: usize,
    pub unit_id: u8,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub interface: InterfaceMode,
    pub parallel: bool,
    pub read_only: bool,
}

pub fn spawn_worker(
    config: TransportConfig,
    command_rx: Receiver<TransportCommand>,
    event_tx: Sender<TransportEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let result = run_worker_loop(config, command_rx, &event_tx);

        if let Err(err) = result {
            let _ = event_tx.send(TransportEvent::Error(err));
        }
    })
}

#[allow(clippy::needless_pass_by_value)]
fn run_worker_loop(
    config: TransportConfig,
    command_rx: Receiver<TransportCommand>,
    event_tx: &Sender<TransportEvent>,
) -> eyre::Result<()> {
    let mut registry = ControllerRegistry::new(
        config.capacity,
        config.unit_id,
        config.interface.connector(config.timeout),
    );
    let mut next_poll = Instant::now() + config.poll_interval;

    loop {
        let now = Instant::now();
        if now >= next_poll {
            let readings = if config.parallel {
                registry.poll_all_concurrent()
            } else {
                registry.poll_all()
            };
            if !readings.is_empty() {
                event_tx.send(TransportEvent::Readings(readings)).ok();
            }
            next_poll = now + config.poll_interval;
        }

        match command_rx.recv_timeout(next_poll.saturating_duration_since(Instant::now())) {
            Ok(TransportCommand::Terminate) => break,
            Ok(command) => apply_command(&mut registry, &config, command, event_tx),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(eyre::eyre!("command channel closed"));
            }
        }
    }

    for slot in 0..registry.capacity() {
        registry.disconnect(slot);
    }
    info!("transport worker stopped");
    Ok(())
}

fn apply_command(
    registry: &mut ControllerRegistry,
    config: &TransportConfig,
    command: TransportCommand,
    event_tx: &Sender<TransportEvent>,
) {
    debug!(?command, "applying command");
    let event = match command {
        TransportCommand::Connect { slot, address } => match registry.connect(slot, &address) {
            Ok(()) => TransportEvent::Connected {
                slot,
                name: registry
                    .link(slot)
                    .map_or_else(|| format!("MFC {address}"), |link| link.name().to_string()),
            },
            Err(err) => TransportEvent::ConnectFailed {
                slot,
                message: connect_failure_message(&err),
            },
        },
        TransportCommand::Disconnect(slot) => {
            registry.disconnect(slot);
            TransportEvent::Disconnected(slot)
        }
        TransportCommand::WriteSetpoint { .. } | TransportCommand::ZeroFlow(_)
            if config.read_only =>
        {
            TransportEvent::Notice {
                level: NoticeLevel::Error,
                message: String::from("read-only mode: command ignored"),
            }
        }
        TransportCommand::WriteSetpoint { slot, value } => {
            match registry.write_setpoint(slot, value) {
                Ok(()) => TransportEvent::SetpointWritten { slot, value },
                Err(_) => TransportEvent::Notice {
                    level: NoticeLevel::Error,
                    message: format!("{}: write failed", slot_name(registry, slot)),
                },
            }
        }
        TransportCommand::ZeroFlow(slot) => match registry.zero_flow(slot) {
            Ok(()) => TransportEvent::Notice {
                level: NoticeLevel::Info,
                message: format!("{}: flow zeroed", slot_name(registry, slot)),
            },
            Err(_) => TransportEvent::Notice {
                level: NoticeLevel::Error,
                message: format!("{}: command failed", slot_name(registry, slot)),
            },
        },
        TransportCommand::Terminate => return,
    };
    event_tx.send(event).ok();
}

fn slot_name(registry: &ControllerRegistry, slot: usize) -> String {
    registry
        .link(slot)
        .map_or_else(|| format!("MFC {}", slot + 1), |link| link.name().to_string())
}

fn connect_failure_message(err: &ConnectError) -> String {
    match err {
        ConnectError::Transport { address, .. } => format!("Cannot connect to {address}"),
        ConnectError::InvalidAddress(input) => format!("Invalid address {input:?}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};
    use std::time::{Duration, Instant};

    use mfc_monitor::FlowReading;

    use super::{
        NoticeLevel, TransportCommand, TransportConfig, TransportEvent, spawn_worker,
    };
    use crate::interface::InterfaceMode;

    fn config(read_only: bool) -> TransportConfig {
        TransportConfig {
            capacity: 3,
            unit_id: 1,
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_millis(200),
            interface: InterfaceMode::Simulation,
            parallel: false,
            read_only,
        }
    }

    fn wait_for(
        rx: &Receiver<TransportEvent>,
        mut matches: impl FnMut(&TransportEvent) -> bool,
    ) -> TransportEvent {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = rx.recv_timeout(remaining).expect("event should arrive");
            if matches(&event) {
                return event;
            }
        }
    }

    #[test]
    fn worker_connects_polls_and_writes() {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let handle = spawn_worker(config(false), command_rx, event_tx);

        command_tx
            .send(TransportCommand::Connect {
                slot: 1,
                address: String::from("10.1.1.1"),
            })
            .expect("send connect");
        match wait_for(&event_rx, |event| matches!(event, TransportEvent::Connected { .. })) {
            TransportEvent::Connected { slot, name } => {
                assert_eq!(slot, 1);
                assert_eq!(name, "MFC 10.1.1.1");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        match wait_for(&event_rx, |event| matches!(event, TransportEvent::Readings(_))) {
            TransportEvent::Readings(readings) => {
                assert_eq!(readings.len(), 1);
                assert_eq!(readings[0].slot, 1);
                assert!(readings[0].setpoint.is_ok());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        command_tx
            .send(TransportCommand::WriteSetpoint {
                slot: 1,
                value: 12.5,
            })
            .expect("send setpoint");
        let event = wait_for(&event_rx, |event| {
            matches!(event, TransportEvent::SetpointWritten { .. })
        });
        assert!(matches!(
            event,
            TransportEvent::SetpointWritten { slot: 1, value } if value == 12.5
        ));

        command_tx
            .send(TransportCommand::Disconnect(1))
            .expect("send disconnect");
        let event = wait_for(&event_rx, |event| matches!(event, TransportEvent::Disconnected(_)));
        assert!(matches!(event, TransportEvent::Disconnected(1)));

        command_tx
            .send(TransportCommand::Terminate)
            .expect("send terminate");
        handle.join().expect("worker should stop");
    }

    #[test]
    fn commands_on_empty_slot_produce_error_notices() {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let handle = spawn_worker(config(false), command_rx, event_tx);

        command_tx
            .send(TransportCommand::ZeroFlow(2))
            .expect("send zero flow");
        match wait_for(&event_rx, |event| matches!(event, TransportEvent::Notice { .. })) {
            TransportEvent::Notice { level, message } => {
                assert_eq!(level, NoticeLevel::Error);
                assert_eq!(message, "MFC 3: command failed");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        command_tx
            .send(TransportCommand::Connect {
                slot: 0,
                address: String::from("bad address"),
            })
            .expect("send connect");
        let event = wait_for(&event_rx, |event| {
            matches!(event, TransportEvent::ConnectFailed { .. })
        });
        assert!(matches!(event, TransportEvent::ConnectFailed { slot: 0, .. }));

        command_tx
            .send(TransportCommand::Terminate)
            .expect("send terminate");
        handle.join().expect("worker should stop");
    }

    fn connect_slot(
        command_tx: &mpsc::Sender<TransportCommand>,
        event_rx: &Receiver<TransportEvent>,
        slot: usize,
        address: &str,
    ) {
        command_tx
            .send(TransportCommand::Connect {
                slot,
                address: address.to_string(),
            })
            .expect("send connect");
        let event = wait_for(event_rx, |event| {
            matches!(
                event,
                TransportEvent::Connected { .. } | TransportEvent::ConnectFailed { .. }
            )
        });
        assert!(
            matches!(event, TransportEvent::Connected { slot: connected, .. } if connected == slot),
            "unexpected event: {event:?}"
        );
    }

    #[test]
    fn rejected_setpoint_reports_write_failure_without_confirmation() {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let handle = spawn_worker(config(false), command_rx, event_tx);
        connect_slot(&command_tx, &event_rx, 0, "10.1.1.3");

        command_tx
            .send(TransportCommand::WriteSetpoint {
                slot: 0,
                value: -1.0,
            })
            .expect("send setpoint");
        match wait_for(&event_rx, |event| {
            matches!(
                event,
                TransportEvent::Notice { .. } | TransportEvent::SetpointWritten { .. }
            )
        }) {
            TransportEvent::Notice { level, message } => {
                assert_eq!(level, NoticeLevel::Error);
                assert_eq!(message, "MFC 10.1.1.3: write failed");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // The link stays usable and the device kept its previous setpoint.
        match wait_for(&event_rx, |event| matches!(event, TransportEvent::Readings(_))) {
            TransportEvent::Readings(readings) => {
                assert_eq!(readings[0].slot, 0);
                assert_eq!(readings[0].setpoint, FlowReading::ok(0.0));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        command_tx
            .send(TransportCommand::Terminate)
            .expect("send terminate");
        handle.join().expect("worker should stop");
    }

    #[test]
    fn zero_flow_on_connected_slot_reports_success() {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let handle = spawn_worker(config(false), command_rx, event_tx);
        connect_slot(&command_tx, &event_rx, 2, "10.1.1.4");

        command_tx
            .send(TransportCommand::ZeroFlow(2))
            .expect("send zero flow");
        match wait_for(&event_rx, |event| matches!(event, TransportEvent::Notice { .. })) {
            TransportEvent::Notice { level, message } => {
                assert_eq!(level, NoticeLevel::Info);
                assert_eq!(message, "MFC 10.1.1.4: flow zeroed");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        command_tx
            .send(TransportCommand::Terminate)
            .expect("send terminate");
        handle.join().expect("worker should stop");
    }

    #[test]
    fn read_only_worker_ignores_writes() {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let handle = spawn_worker(config(true), command_rx, event_tx);

        command_tx
            .send(TransportCommand::Connect {
                slot: 0,
                address: String::from("10.1.1.2"),
            })
            .expect("send connect");
        command_tx
            .send(TransportCommand::WriteSetpoint {
                slot: 0,
                value: 3.0,
            })
            .expect("send setpoint");

        match wait_for(&event_rx, |event| {
            matches!(
                event,
                TransportEvent::Notice { .. } | TransportEvent::SetpointWritten { .. }
            )
        }) {
            TransportEvent::Notice { message, .. } => assert!(message.contains("read-only")),
            other => panic!("unexpected event: {other:?}"),
        }

        command_tx
            .send(TransportCommand::Terminate)
            .expect("send terminate");
        handle.join().expect("worker should stop");
    }

    #[test]
    fn dropped_command_channel_is_reported() {
        let (command_tx, command_rx) = mpsc::channel::<TransportCommand>();
        let (event_tx, event_rx) = mpsc::channel();
        let handle = spawn_worker(config(false), command_rx, event_tx);
        drop(command_tx);

        let event = wait_for(&event_rx, |event| matches!(event, TransportEvent::Error(_)));
        assert!(matches!(event, TransportEvent::Error(err) if err.to_string().contains("closed")));
        handle.join().expect("worker should stop");
    }
}
