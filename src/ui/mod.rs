mod diff;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use diffnav::keymap::{keys_for, Command};

use crate::app::App;

pub fn render(frame: &mut Frame, app: &App) {
    let banner = app.viewer.banner();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(u16::from(banner.is_some())),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    if let Some(banner) = banner {
        let banner = Paragraph::new(Line::from(vec![
            Span::styled(banner, Style::default().fg(Color::Black)),
            Span::styled("  (Esc to cancel)", Style::default().fg(Color::DarkGray)),
        ]))
        .style(Style::default().bg(Color::Yellow));
        frame.render_widget(banner, chunks[1]);
    }
    diff::render(frame, &app.viewer, chunks[2]);
    render_status_bar(frame, app, chunks[3]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.viewer.state();
    let range = match (state.revision, state.interdiff_revision) {
        (Some(rev), Some(inter)) => format!("Interdiff {} - {}", rev, inter),
        (Some(rev), None) => format!("Diff r{} of {}", rev, app.viewer.latest_revision()),
        (None, _) => "Diff".to_string(),
    };
    let pagination = app.viewer.pagination();

    let mut spans = vec![Span::styled(
        format!("diffnav - {}", range),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )];
    if pagination.pages > 1 {
        spans.push(Span::raw(format!(
            "  page {}/{}",
            pagination.current_page, pagination.pages
        )));
    }
    if let Some(url) = app.viewer.current_url() {
        spans.push(Span::styled(
            format!("  {}", url),
            Style::default().fg(Color::Gray),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(error) = &app.viewer.error {
        Line::from(vec![Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red),
        )])
    } else if let Some(status) = &app.status {
        Line::from(vec![Span::styled(
            status.as_str(),
            Style::default().fg(Color::Green),
        )])
    } else if !app.viewer.is_settled() {
        Line::from(vec![Span::styled(
            "Loading...",
            Style::default().fg(Color::Yellow),
        )])
    } else {
        let help = format!(
            "{}/{}: file | {}/{}: diff | {}/{}: comment | {}: comment here | 1-9: revision | {{/}}: page | y: copy URL | o: open | q: quit",
            keys_for(Command::PreviousFile),
            keys_for(Command::NextFile),
            keys_for(Command::PreviousDiff),
            keys_for(Command::NextDiff),
            keys_for(Command::PreviousComment),
            keys_for(Command::NextComment),
            keys_for(Command::CreateComment),
        );
        Line::from(vec![Span::styled(help, Style::default().fg(Color::Gray))])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}
