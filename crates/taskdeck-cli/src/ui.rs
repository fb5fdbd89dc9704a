use std::time::SystemTime;

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use taskdeck_core::dashboard::{ProjectPanel, StatusCounts, TaskFilter};
use taskdeck_core::models::StatusCategory;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::app::App;

pub fn render(frame: &mut Frame, app: &App, offset: UtcOffset) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    frame.render_widget(Paragraph::new(header_line(app, offset)), header);
    render_panels(frame, app, body);
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("r", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" refresh  "),
            Span::styled("d", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(if app.filter.hide_done {
                " show done  "
            } else {
                " hide done  "
            }),
            Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" quit"),
        ]))
        .style(Style::default().fg(Color::DarkGray)),
        footer,
    );
}

fn header_line(app: &App, offset: UtcOffset) -> Line<'static> {
    let totals = app.panels.totals();
    let mut spans = vec![Span::styled(
        "taskdeck ",
        Style::default().add_modifier(Modifier::BOLD),
    )];
    spans.extend(count_spans(&totals));

    let errors = app.panels.error_count();
    if errors > 0 {
        spans.push(Span::styled(
            format!("  {errors} failing"),
            Style::default().fg(Color::Red),
        ));
    }

    let status = if app.is_refreshing() {
        "  refreshing...".to_string()
    } else {
        match app.last_refresh {
            Some((trigger, at)) => format!("  {trigger:?} refresh at {}", clock(at, offset)),
            None => String::new(),
        }
    };
    spans.push(Span::styled(status, Style::default().fg(Color::DarkGray)));
    Line::from(spans)
}

fn render_panels(frame: &mut Frame, app: &App, area: Rect) {
    if app.panels.is_empty() {
        frame.render_widget(
            Paragraph::new(format!(
                "No projects configured in {}",
                app.config.path.display()
            ))
            .block(Block::default().borders(Borders::ALL)),
            area,
        );
        return;
    }

    let count = app.panels.len() as u32;
    let areas = Layout::vertical((0..count).map(|_| Constraint::Ratio(1, count))).split(area);

    for (panel, area) in app.panels.iter().zip(areas.iter()) {
        render_panel(frame, panel, &app.filter, *area);
    }
}

fn render_panel(frame: &mut Frame, panel: &ProjectPanel, filter: &TaskFilter, area: Rect) {
    let mut title = vec![Span::styled(
        format!(" {} ", panel.display_name),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    title.extend(count_spans(&panel.counts()));
    title.push(Span::raw(" "));

    let border = if panel.error.is_some() {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Line::from(title));

    let mut lines = Vec::new();
    if let Some(error) = &panel.error {
        lines.push(Line::styled(
            format!("{:?}: {}", error.kind, error.message),
            Style::default().fg(Color::Red),
        ));
    }

    if panel.is_loading() {
        lines.push(Line::styled(
            "loading...",
            Style::default().fg(Color::DarkGray),
        ));
    }

    for group in panel.visible_groups(filter) {
        lines.push(Line::from(vec![
            Span::styled(
                format!("{} ", status_marker(group.status)),
                status_style(group.status),
            ),
            Span::styled(group.title, Style::default().add_modifier(Modifier::BOLD)),
        ]));
        for task in group.tasks {
            let category = task.category();
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(format!("{} ", status_marker(category)), status_style(category)),
                Span::raw(task.title),
                Span::styled(
                    format!("  {}", task.status),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
        }
    }

    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn count_spans(counts: &StatusCounts) -> Vec<Span<'static>> {
    StatusCategory::ALL
        .iter()
        .filter(|category| counts.get(**category) > 0)
        .map(|category| {
            Span::styled(
                format!(" {} {}", category, counts.get(*category)),
                status_style(*category),
            )
        })
        .collect()
}

fn status_marker(category: StatusCategory) -> &'static str {
    match category {
        StatusCategory::Done => "[x]",
        StatusCategory::Active => "[>]",
        StatusCategory::Todo => "[ ]",
        StatusCategory::Review => "[?]",
        StatusCategory::Blocked => "[!]",
        StatusCategory::Other => "[-]",
    }
}

fn status_style(category: StatusCategory) -> Style {
    let color = match category {
        StatusCategory::Done => Color::Green,
        StatusCategory::Active => Color::Cyan,
        StatusCategory::Todo => Color::White,
        StatusCategory::Review => Color::Yellow,
        StatusCategory::Blocked => Color::Red,
        StatusCategory::Other => Color::DarkGray,
    };
    Style::default().fg(color)
}

fn clock(at: SystemTime, offset: UtcOffset) -> String {
    OffsetDateTime::from(at)
        .to_offset(offset)
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".to_string())
}
