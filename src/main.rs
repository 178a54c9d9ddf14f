mod app;
mod input;
mod interface;
mod transport;
mod ui;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use mfc_monitor::constants::{
    DEFAULT_CONTROLLER_COUNT, DEFAULT_IO_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_UNIT_ID,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::EnvFilter;

use app::AppState;
use input::handle_key_event;
use interface::InterfaceMode;
use transport::{TransportCommand, TransportConfig, TransportEvent, spawn_worker};
use ui::render_ui;

#[allow(clippy::cast_possible_truncation)]
const DEFAULT_POLL_MS: u64 = DEFAULT_POLL_INTERVAL.as_millis() as u64;
#[allow(clippy::cast_possible_truncation)]
const DEFAULT_TIMEOUT_MS: u64 = DEFAULT_IO_TIMEOUT.as_millis() as u64;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Modbus/TCP mass flow controller monitor")]
struct Args {
    /// Controller address (host or host:port) to connect at startup; repeat for later slots
    #[arg(short, long = "device")]
    devices: Vec<String>,

    /// Number of controller slots
    #[arg(short = 'n', long, default_value_t = DEFAULT_CONTROLLER_COUNT)]
    controllers: usize,

    /// Modbus unit identifier
    #[arg(short, long, default_value_t = DEFAULT_UNIT_ID)]
    unit_id: u8,

    /// Poll interval in milliseconds
    #[arg(short = 'i', long, default_value_t = DEFAULT_POLL_MS)]
    poll_interval: u64,

    /// Connect and request timeout in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout: u64,

    /// Device interface
    #[arg(short = 'I', long, value_enum, default_value_t = InterfaceMode::Remote)]
    interface: InterfaceMode,

    /// Disable write commands
    #[arg(short = 'r', long, default_value_t = false)]
    read_only: bool,

    /// Poll connected controllers concurrently
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct RuntimeArgs {
    transport: TransportConfig,
    devices: Vec<String>,
    log_file: Option<PathBuf>,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let runtime = resolve_runtime_args(&args)?;
    if let Some(path) = &runtime.log_file {
        init_logging(path)?;
    }

    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();

    let worker_handle = spawn_worker(runtime.transport.clone(), command_rx, event_tx);

    let mut app = AppState::new(
        runtime.transport.capacity,
        runtime.transport.interface == InterfaceMode::Simulation,
        runtime.transport.read_only,
    );
    for (slot, address) in runtime.devices.iter().enumerate() {
        app.mark_connecting(slot, address);
        command_tx
            .send(TransportCommand::Connect {
                slot,
                address: address.clone(),
            })
            .wrap_err("send startup connect")?;
    }

    enable_raw_mode().wrap_err("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).wrap_err("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_millis(50);
    let mut exit_error: Option<eyre::Report> = None;

    loop {
        terminal.draw(|frame| render_ui(frame, &app))?;

        if event::poll(tick_rate)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && handle_key_event(key.code, &mut app, &command_tx)?
        {
            break;
        }

        if let Some(err) = drain_events(&mut app, &event_rx) {
            exit_error = Some(err);
            app.should_quit = true;
        }

        if app.should_quit {
            break;
        }
    }

    command_tx.send(TransportCommand::Terminate).ok();
    worker_handle.join().ok();

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    if let Some(err) = exit_error {
        return Err(err);
    }

    Ok(())
}

/// Applies every pending worker event. Returns the error that should end the
/// session, if the worker failed or went away.
fn drain_events(app: &mut AppState, event_rx: &Receiver<TransportEvent>) -> Option<eyre::Report> {
    loop {
        match event_rx.try_recv() {
            Ok(TransportEvent::Error(err)) => return Some(err.wrap_err("transport worker failed")),
            Ok(event) => app.apply_event(event),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                return Some(eyre::eyre!("transport thread disconnected"));
            }
        }
    }
}

fn resolve_runtime_args(args: &Args) -> eyre::Result<RuntimeArgs> {
    if args.controllers == 0 {
        return Err(eyre::eyre!("at least one controller slot is required"));
    }
    if args.devices.len() > args.controllers {
        return Err(eyre::eyre!(
            "{} devices given but only {} controller slots",
            args.devices.len(),
            args.controllers
        ));
    }
    if args.poll_interval == 0 {
        return Err(eyre::eyre!("poll interval must be greater than zero"));
    }
    if args.timeout == 0 {
        return Err(eyre::eyre!("timeout must be greater than zero"));
    }

    Ok(RuntimeArgs {
        transport: TransportConfig {
            capacity: args.controllers,
            unit_id: args.unit_id,
            poll_interval: Duration::from_millis(args.poll_interval),
            timeout: Duration::from_millis(args.timeout),
            interface: args.interface,
            parallel: args.parallel,
            read_only: args.read_only,
        },
        devices: args.devices.clone(),
        log_file: args.log_file.clone(),
    })
}

fn init_logging(path: &Path) -> eyre::Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| eyre::eyre!("install log subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use clap::Parser;
    use color_eyre::eyre;

    use super::{AppState, Args, InterfaceMode, TransportEvent, drain_events, resolve_runtime_args};

    #[test]
    fn defaults_match_reference_configuration() {
        let args = Args::try_parse_from(["bin"]).expect("args should parse");
        let runtime = resolve_runtime_args(&args).expect("runtime should resolve");
        assert_eq!(runtime.transport.capacity, 3);
        assert_eq!(runtime.transport.unit_id, 1);
        assert_eq!(runtime.transport.poll_interval, Duration::from_millis(100));
        assert_eq!(runtime.transport.interface, InterfaceMode::Remote);
        assert!(!runtime.transport.parallel);
        assert!(runtime.devices.is_empty());
    }

    #[test]
    fn repeated_devices_fill_slots_in_order() {
        let args = Args::try_parse_from([
            "bin",
            "--device",
            "10.0.0.1",
            "-d",
            "10.0.0.2:1502",
            "--interface",
            "simulation",
        ])
        .expect("args should parse");
        let runtime = resolve_runtime_args(&args).expect("runtime should resolve");
        assert_eq!(runtime.devices, vec!["10.0.0.1", "10.0.0.2:1502"]);
        assert_eq!(runtime.transport.interface, InterfaceMode::Simulation);
    }

    #[test]
    fn more_devices_than_slots_is_rejected() {
        let args = Args::try_parse_from(["bin", "-n", "1", "-d", "a", "-d", "b"])
            .expect("args should parse");
        let err = resolve_runtime_args(&args).expect_err("too many devices should fail");
        assert!(err.to_string().contains("controller slots"));
    }

    #[test]
    fn zero_values_are_rejected() {
        for flags in [["-n", "0"], ["-i", "0"], ["-t", "0"]] {
            let args = Args::try_parse_from(["bin", flags[0], flags[1]]).expect("args should parse");
            assert!(resolve_runtime_args(&args).is_err(), "{flags:?}");
        }
    }

    #[test]
    fn unit_id_and_timeout_are_configurable() {
        let args = Args::try_parse_from(["bin", "--unit-id", "7", "--timeout", "250", "--parallel"])
            .expect("args should parse");
        let runtime = resolve_runtime_args(&args).expect("runtime should resolve");
        assert_eq!(runtime.transport.unit_id, 7);
        assert_eq!(runtime.transport.timeout, Duration::from_millis(250));
        assert!(runtime.transport.parallel);
    }

    #[test]
    fn pending_events_are_applied_until_empty() {
        let (event_tx, event_rx) = mpsc::channel();
        let mut app = AppState::new(3, true, false);
        event_tx
            .send(TransportEvent::Connected {
                slot: 0,
                name: String::from("MFC 10.0.0.1"),
            })
            .expect("send event");
        event_tx
            .send(TransportEvent::Disconnected(1))
            .expect("send event");

        assert!(drain_events(&mut app, &event_rx).is_none());
        assert!(app.slots[0].is_connected());
    }

    #[test]
    fn worker_error_ends_the_session() {
        let (event_tx, event_rx) = mpsc::channel();
        let mut app = AppState::new(3, true, false);
        event_tx
            .send(TransportEvent::Error(eyre::eyre!("command channel closed")))
            .expect("send event");

        let err = drain_events(&mut app, &event_rx).expect("error should end the session");
        assert!(format!("{err:#}").contains("command channel closed"));
    }

    #[test]
    fn vanished_worker_ends_the_session() {
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>();
        let mut app = AppState::new(3, true, false);
        drop(event_tx);

        let err = drain_events(&mut app, &event_rx).expect("closed channel should end the session");
        assert!(err.to_string().contains("disconnected"));
    }
}
