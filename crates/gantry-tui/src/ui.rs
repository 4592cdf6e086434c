//! UI rendering for the gantry dashboard.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::app::{Mode, Model, Notice};

const KEY_HELP: &str =
    "↑/↓ select  s start  x stop  e restart  K kill  a stop-all  c command  l logs  o source  r reload  q quit";

/// Main UI rendering function
pub fn draw(frame: &mut Frame, model: &Model) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Panes
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    draw_header(frame, model, chunks[0]);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(chunks[1]);
    draw_servers(frame, model, panes[0]);
    draw_logs(frame, model, panes[1]);

    draw_footer(frame, model, chunks[2]);
}

fn draw_header(frame: &mut Frame, model: &Model, area: Rect) {
    let (mode, mode_color) = match model.mode {
        Mode::Normal => ("NORMAL", Color::Green),
        Mode::Command => ("COMMAND", Color::Yellow),
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {mode} "),
            Style::default().fg(Color::Black).bg(mode_color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  source: {}", model.log_source)),
        Span::raw(format!("  logs: {}", if model.show_logs { "on" } else { "off" })),
        Span::raw(format!("  stop-all budget: {}s", model.stop_all_timeout)),
    ]);
    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" GANTRY ")
            .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    );
    frame.render_widget(header, area);
}

fn draw_servers(frame: &mut Frame, model: &Model, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Servers ({}) ", model.servers.len()))
        .title_style(Style::default().fg(Color::Green));

    if model.servers.is_empty() {
        frame.render_widget(Paragraph::new(" No servers found").block(block), area);
        return;
    }

    let items: Vec<ListItem> = model
        .servers
        .iter()
        .map(|server| {
            let color = if server.is_running() { Color::Green } else { Color::DarkGray };
            ListItem::new(Line::from(vec![
                Span::styled("● ", Style::default().fg(color)),
                Span::raw(server.name.clone()),
                Span::styled(format!("  {}", server.status), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(model.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_logs(frame: &mut Frame, model: &Model, area: Rect) {
    let title = match model.selected_server() {
        Some(server) => format!(" Logs: {} [{}] ", server.name, model.log_source),
        None => " Logs ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Magenta));

    let lines: Vec<Line> = if !model.show_logs {
        vec![Line::from(" Logs hidden (press l)")]
    } else if model.logs.is_empty() {
        vec![Line::from(" Waiting for output…")]
    } else {
        let visible = usize::from(area.height.saturating_sub(2));
        model.logs.tail(visible).map(|line| Line::from(line.as_str())).collect()
    };
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(frame: &mut Frame, model: &Model, area: Rect) {
    let line = match (model.mode, &model.notice) {
        (Mode::Command, _) => {
            let target = model.selected_server().map_or("", |s| s.name.as_str());
            Line::from(vec![
                Span::styled(format!("{target}> "), Style::default().fg(Color::Yellow)),
                Span::raw(model.command_input.as_str()),
                Span::styled("█", Style::default().fg(Color::Yellow)),
            ])
        }
        (Mode::Normal, Some(Notice::Status(msg))) => Line::from(Span::styled(msg.as_str(), Style::default().fg(Color::Green))),
        (Mode::Normal, Some(Notice::Error(msg))) => {
            Line::from(Span::styled(format!("✗ {msg}"), Style::default().fg(Color::Red)))
        }
        (Mode::Normal, None) => Line::from(Span::styled(KEY_HELP, Style::default().fg(Color::DarkGray))),
    };
    frame.render_widget(Paragraph::new(line).block(Block::default().borders(Borders::ALL)), area);
}
