use std::sync::mpsc::Sender;

use color_eyre::eyre::{self, WrapErr};
use crossterm::event::KeyCode;

use crate::app::{AppState, InputMode, SlotState};
use crate::transport::{NoticeLevel, TransportCommand};

const ADDRESS_MAX_LEN: usize = 64;
const SETPOINT_MAX_LEN: usize = 10;

pub fn handle_key_event(
    code: KeyCode,
    app: &mut AppState,
    command_tx: &Sender<TransportCommand>,
) -> eyre::Result<bool> {
    if let Some(mode) = app.input_mode {
        handle_input_event(code, mode, app, command_tx)?;
        return Ok(false);
    }

    let slot = app.selected;
    match code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return Ok(true);
        }
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Char('c') => {
            if app.selected_slot().state == SlotState::Empty {
                app.input_buffer = app.selected_slot().address.clone();
                app.input_mode = Some(InputMode::Address);
            }
        }
        KeyCode::Char('x') => {
            if app.selected_slot().state != SlotState::Empty {
                command_tx
                    .send(TransportCommand::Disconnect(slot))
                    .wrap_err("send disconnect")?;
            }
        }
        KeyCode::Char('s') => {
            if !app.read_only && app.selected_slot().is_connected() {
                app.input_buffer.clear();
                app.input_mode = Some(InputMode::Setpoint);
            }
        }
        KeyCode::Char('z') => {
            if !app.read_only && app.selected_slot().is_connected() {
                command_tx
                    .send(TransportCommand::ZeroFlow(slot))
                    .wrap_err("send zero flow")?;
            }
        }
        _ => {}
    }

    Ok(false)
}

fn handle_input_event(
    code: KeyCode,
    mode: InputMode,
    app: &mut AppState,
    command_tx: &Sender<TransportCommand>,
) -> eyre::Result<()> {
    match code {
        KeyCode::Esc => {
            app.input_mode = None;
            app.input_buffer.clear();
        }
        KeyCode::Enter => {
            submit_input(mode, app, command_tx)?;
            app.input_mode = None;
            app.input_buffer.clear();
        }
        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Char(ch) => match mode {
            InputMode::Address => {
                if ch.is_ascii_graphic() && app.input_buffer.len() < ADDRESS_MAX_LEN {
                    app.input_buffer.push(ch);
                }
            }
            InputMode::Setpoint => {
                if (ch.is_ascii_digit() || ch == '.' || ch == '-')
                    && app.input_buffer.len() < SETPOINT_MAX_LEN
                {
                    app.input_buffer.push(ch);
                }
            }
        },
        _ => {}
    }
    Ok(())
}

fn submit_input(
    mode: InputMode,
    app: &mut AppState,
    command_tx: &Sender<TransportCommand>,
) -> eyre::Result<()> {
    let slot = app.selected;
    let text = app.input_buffer.trim().to_string();
    match mode {
        InputMode::Address => {
            if text.is_empty() {
                return Ok(());
            }
            app.mark_connecting(slot, &text);
            command_tx
                .send(TransportCommand::Connect {
                    slot,
                    address: text,
                })
                .wrap_err("send connect")
        }
        InputMode::Setpoint => match text.parse::<f64>() {
            Ok(value) if value.is_finite() => command_tx
                .send(TransportCommand::WriteSetpoint {
                    slot,
                    value: round_setpoint(value),
                })
                .wrap_err("send setpoint"),
            _ => {
                app.set_notice(
                    NoticeLevel::Error,
                    String::from("Enter a numeric setpoint"),
                );
                Ok(())
            }
        },
    }
}

/// Setpoints are entered with two decimal places of precision.
#[allow(clippy::cast_possible_truncation)]
fn round_setpoint(value: f64) -> f32 {
    ((value * 100.0).round() / 100.0) as f32
}
