//! Rendering for the group table, details view, and chrome.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::tui::app::{App, SortColumn};
use crate::tui::format;

const MIN_WIDTH: u16 = 60;
const MIN_HEIGHT: u16 = 10;

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = format!(
            "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        );
        let paragraph = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(paragraph, area);
        return;
    }

    if app.show_details {
        render_details(frame, app, area);
        return;
    }

    let chunks = Layout::vertical([
        Constraint::Length(2), // Title + stats
        Constraint::Length(1), // Per-host status / filter prompt
        Constraint::Min(6),    // Group table
        Constraint::Length(1), // Key help
    ])
    .split(area);

    render_header(frame, app, chunks[0]);
    render_status(frame, app, chunks[1]);
    render_table(frame, app, chunks[2]);
    render_footer(frame, app, chunks[3]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let hosts = app.sorted_hosts();
    let host_index = app
        .selected_host
        .as_ref()
        .and_then(|h| hosts.iter().position(|x| x == h))
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut badges = Vec::new();
    if app.is_paused() {
        badges.push(Span::styled(
            " PAUSED ",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ));
    } else if app.interval.is_zero() {
        badges.push(Span::styled(
            " MANUAL ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let updated = app
        .last_update
        .map(|at| format!("{}s ago", at.elapsed().as_secs()))
        .unwrap_or_else(|| "never".to_string());

    let title = Line::from(
        [
            vec![Span::styled(
                "Goroutine Explorer",
                Style::default().add_modifier(Modifier::BOLD),
            )],
            badges,
        ]
        .concat(),
    );

    let stats = Line::from(Span::styled(
        format!(
            "Host {host_index}/{}: {} | Groups: {}/{} | Goroutines: {} | Updated: {updated}",
            hosts.len(),
            app.selected_host.as_deref().unwrap_or("-"),
            app.displayed_groups.len(),
            app.stats.total_groups,
            app.stats.total_goroutines,
        ),
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(vec![title, stats]), area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    if app.filter_active {
        let line = Line::from(vec![
            Span::styled("Filter: ", Style::default().fg(Color::Magenta)),
            Span::raw(app.filter_text.clone()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let mut spans = Vec::new();
    if !app.filter_text.is_empty() {
        spans.push(Span::styled(
            format!("Filter: {} ", app.filter_text),
            Style::default().fg(Color::DarkGray),
        ));
    }

    if app.selected_host_fetching() {
        spans.push(Span::styled(
            "⟳ Fetching...",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    } else if let Some(error) = app.selected_host_error() {
        spans.push(Span::styled(
            format!("⚠ Error: {error}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    } else {
        let (errored, fetching) = app.issue_counts();
        if errored > 0 {
            spans.push(Span::styled(
                format!("{errored} error(s) "),
                Style::default().fg(Color::Red),
            ));
        }
        if fetching > 0 {
            spans.push(Span::styled(
                format!("{fetching} fetching"),
                Style::default().fg(Color::Yellow),
            ));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let header = Row::new(
        [
            (SortColumn::State, "State"),
            (SortColumn::Function, "Function"),
            (SortColumn::Count, "Count"),
            (SortColumn::Wait, "Wait"),
        ]
        .map(|(column, title)| {
            if column == app.sort_by {
                Cell::from(format!("{title} ↓"))
            } else {
                Cell::from(title)
            }
        }),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app
        .displayed_groups
        .iter()
        .map(|group| {
            let created_by = group
                .created_by
                .as_ref()
                .map(|f| format!("  ({})", f.func))
                .unwrap_or_default();
            Row::new(vec![
                Cell::from(Span::styled(
                    group.state.as_str(),
                    state_style(group.state),
                )),
                Cell::from(format!("{}{created_by}", group.leaf_func())),
                Cell::from(group.count.to_string()),
                Cell::from(format::format_wait_range(&group.wait_durations)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Min(40),
            Constraint::Length(7),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .row_highlight_style(
        Style::default()
            .bg(Color::Indexed(57))
            .fg(Color::Indexed(229)),
    )
    .block(Block::default().borders(Borders::TOP));

    frame.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_details(frame: &mut Frame, app: &App, area: Rect) {
    let Some(group) = &app.selected_group else {
        frame.render_widget(Paragraph::new("No details available"), area);
        return;
    };

    let label = Style::default().fg(Color::DarkGray);
    let section = Style::default()
        .fg(Color::Indexed(229))
        .add_modifier(Modifier::BOLD);
    let location = Style::default().fg(Color::DarkGray);

    let mut lines = vec![
        Line::from(Span::styled("Goroutine Group Details", section)),
        Line::default(),
        Line::from(vec![
            Span::styled("Host:     ", label),
            Span::raw(app.selected_host.clone().unwrap_or_default()),
        ]),
        Line::from(vec![
            Span::styled("State:    ", label),
            Span::styled(group.state.as_str(), state_style(group.state)),
        ]),
        Line::from(vec![
            Span::styled("Count:    ", label),
            Span::raw(group.count.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Group ID: ", label),
            Span::raw(group.id.to_string()),
        ]),
        Line::default(),
        Line::from(Span::styled("Stack Trace:", section)),
    ];

    for (i, frame_entry) in group.trace.iter().enumerate() {
        lines.push(Line::from(format!("{:2}. {}", i + 1, frame_entry.func)));
        if !frame_entry.file.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("      {}", frame_entry.location()),
                location,
            )));
        }
    }

    if let Some(created_by) = &group.created_by {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Created By:", section)));
        lines.push(Line::from(created_by.func.clone()));
        if !created_by.file.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("      {}", created_by.location()),
                location,
            )));
        }
    }

    if !group.wait_durations.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Wait Durations ({} total):", group.wait_durations.len()),
            section,
        )));

        // Fold identical durations into one bullet with a count.
        let mut folded: Vec<(String, usize)> = Vec::new();
        for duration in &group.wait_durations {
            match folded.iter_mut().find(|(d, _)| d == duration) {
                Some((_, count)) => *count += 1,
                None => folded.push((duration.clone(), 1)),
            }
        }
        folded.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for (duration, count) in folded {
            if count > 1 {
                lines.push(Line::from(format!("  • {duration} ({count})")));
            } else {
                lines.push(Line::from(format!("  • {duration}")));
            }
        }
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Press Enter or Esc to return",
        label,
    )));

    frame.render_widget(Paragraph::new(lines), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let help = if app.filter_active {
        "Enter: Apply • Esc: Cancel"
    } else {
        "↑/↓: Navigate • ←/→: Host • Enter: Details • f: Filter • c: Clear • s: Sort • r: Refresh • p: Pause • q: Quit"
    };
    frame.render_widget(
        Paragraph::new(Span::styled(help, Style::default().fg(Color::DarkGray))),
        area,
    );
}

fn state_style(state: goru_types::GoroutineState) -> Style {
    use goru_types::GoroutineState::*;
    let color = match state {
        Running => Color::Green,
        Runnable => Color::LightGreen,
        Blocked => Color::Red,
        Waiting => Color::Yellow,
        Syscall => Color::Cyan,
        Dead | Copystack | Preempted => Color::DarkGray,
    };
    Style::default().fg(color)
}
