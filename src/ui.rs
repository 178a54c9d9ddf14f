use mfc_monitor::FlowReading;
use mfc_monitor::constants::FLOW_UNIT;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::app::{AppState, InputMode, SlotState, SlotView};
use crate::transport::NoticeLevel;

const SLOT_HEIGHT: u16 = 5;

pub fn render_ui(frame: &mut Frame, app: &AppState) {
    let mut constraints = vec![Constraint::Length(1), Constraint::Length(3)];
    constraints.extend(app.slots.iter().map(|_| Constraint::Length(SLOT_HEIGHT)));
    constraints.push(Constraint::Length(3));
    constraints.push(Constraint::Length(3));
    constraints.push(Constraint::Min(0));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    render_header(frame, chunks[0]);
    render_status(frame, chunks[1], app);
    let mut index = 2;
    for (slot, view) in app.slots.iter().enumerate() {
        render_slot(frame, chunks[index], slot, view, slot == app.selected);
        index += 1;
    }
    render_notice(frame, chunks[index], app);
    render_help(frame, chunks[index + 1], app);

    if let Some(mode) = app.input_mode {
        render_input_popup(frame, app, mode);
    }
}

pub fn format_flow(reading: Option<FlowReading>) -> String {
    match reading {
        None => String::from("Flow: --.--"),
        Some(FlowReading {
            value: Some(value), ..
        }) => format!("Flow: {value:.3} {FLOW_UNIT}"),
        Some(_) => String::from("Flow: Err"),
    }
}

pub fn format_setpoint(reading: Option<FlowReading>) -> String {
    match reading {
        None => String::from("Setpoint: --.--"),
        Some(FlowReading {
            value: Some(value), ..
        }) => format!("Setpoint: {value:.2} {FLOW_UNIT}"),
        Some(_) => String::from("Setpoint: Err"),
    }
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![Span::styled(
        "MFC Monitor",
        Style::default()
            .fg(Color::LightMagenta)
            .add_modifier(Modifier::BOLD),
    )]);

    let paragraph = Paragraph::new(title).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &AppState) {
    let connected = app.slots.iter().filter(|view| view.is_connected()).count();
    let mode_label = if app.simulate { "SIM" } else { "LIVE" };
    let mode_color = if app.simulate {
        Color::Yellow
    } else {
        Color::Blue
    };

    let line = Line::from(vec![
        Span::styled("Controllers: ", Style::default().fg(Color::Gray)),
        Span::raw(format!("{connected}/{}", app.slots.len())),
        Span::raw("  "),
        Span::styled("Mode: ", Style::default().fg(Color::Gray)),
        Span::styled(
            mode_label,
            Style::default().fg(mode_color).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            if app.read_only {
                "Read-only"
            } else {
                "Writable"
            },
            Style::default()
                .fg(if app.read_only {
                    Color::Yellow
                } else {
                    Color::Green
                })
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Status")
            .border_style(Style::default().fg(Color::LightMagenta)),
    );
    frame.render_widget(paragraph, area);
}

fn render_slot(frame: &mut Frame, area: Rect, slot: usize, view: &SlotView, selected: bool) {
    let (state_text, state_style) = match &view.state {
        SlotState::Connected { .. } => (
            "Connected",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        SlotState::Connecting => ("Connecting", Style::default().fg(Color::Yellow)),
        SlotState::Empty => ("Disconnected", Style::default().fg(Color::Gray)),
    };
    let title = match &view.state {
        SlotState::Connected { name } => format!("MFC {} - {name}", slot + 1),
        _ => format!("MFC {}", slot + 1),
    };
    let address = if view.address.is_empty() {
        "--"
    } else {
        view.address.as_str()
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(
                format_flow(view.flow),
                reading_style(view.flow).add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled(format_setpoint(view.setpoint), reading_style(view.setpoint)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("IP: ", Style::default().fg(Color::Gray)),
            Span::raw(address.to_string()),
            Span::raw("  "),
            Span::styled("Link: ", Style::default().fg(Color::Gray)),
            Span::styled(state_text, state_style),
        ]),
    ];

    let border_color = if selected {
        Color::LightCyan
    } else {
        Color::DarkGray
    };
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(border_color)),
    );
    frame.render_widget(paragraph, area);
}

fn reading_style(reading: Option<FlowReading>) -> Style {
    match reading {
        Some(reading) if !reading.is_ok() => Style::default().fg(Color::Red),
        Some(_) => Style::default().fg(Color::White),
        None => Style::default().fg(Color::Gray),
    }
}

fn render_notice(frame: &mut Frame, area: Rect, app: &AppState) {
    let line = match &app.notice {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Info => Color::LightGreen,
                NoticeLevel::Error => Color::LightRed,
            };
            Line::from(Span::styled(
                notice.message.clone(),
                Style::default().fg(color),
            ))
        }
        None => Line::from(""),
    };
    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Notices")
            .border_style(Style::default().fg(Color::LightYellow)),
    );
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, area: Rect, app: &AppState) {
    let mut spans = vec![
        Span::styled("↑/↓", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" select  "),
        Span::styled("c", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" connect  "),
        Span::styled("x", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" disconnect  "),
    ];
    if !app.read_only {
        spans.extend([
            Span::styled("s", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" setpoint  "),
            Span::styled("z", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" zero flow  "),
        ]);
    }
    spans.extend([
        Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" quit"),
    ]);
    let paragraph = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Controls")
                .border_style(Style::default().fg(Color::LightMagenta)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_input_popup(frame: &mut Frame, app: &AppState, mode: InputMode) {
    let area = centered_rect(60, 20, frame.area());
    let buffer = if app.input_buffer.is_empty() {
        "_".to_string()
    } else {
        app.input_buffer.clone()
    };
    let (title, prompt, suffix) = match mode {
        InputMode::Address => ("Connect", format!("MFC {} IP:", app.selected + 1), ""),
        InputMode::Setpoint => ("Setpoint", String::from("New Setpoint:"), FLOW_UNIT),
    };

    let content = vec![
        Line::from(Span::styled(
            prompt,
            Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Value: ", Style::default().fg(Color::Gray)),
            Span::styled(
                buffer,
                Style::default()
                    .fg(Color::LightYellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" {suffix}")),
        ]),
        Line::from(""),
        Line::from("Enter to apply, Esc to cancel"),
    ];

    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::LightMagenta)),
    );
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
