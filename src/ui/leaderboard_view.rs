use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use crate::{
    app::App,
    positioning::PositionSource,
    ui::{bold, dim},
};

pub fn render_leaderboard<P: PositionSource>(app: &App<P>, f: &mut Frame, area: Rect) {
    let header = Row::new(vec!["#", "Runner", "City", "Distance", "Streak", "Pace"]).style(bold());

    let rows = app.leaderboard().into_iter().map(|entry| {
        let (r, g, b) = entry.color;
        let accent = Color::Rgb(r, g, b);

        let mut name = vec![
            Span::styled(format!("{} ", entry.avatar()), bold().fg(accent)),
            Span::raw(entry.name.clone()),
        ];
        if entry.is_me {
            name.push(Span::styled(" (you)", Style::default().fg(Color::Red)));
        }
        name.push(Span::styled(format!(" {}", entry.handle), dim()));

        let row = Row::new(vec![
            Cell::from(entry.rank_label()),
            Cell::from(Line::from(name)),
            Cell::from(entry.city.clone()),
            Cell::from(format!("{} km", entry.distance_km)),
            Cell::from(entry.streak_label()),
            Cell::from(entry.pace.clone()),
        ]);
        if entry.is_me {
            row.style(Style::default().add_modifier(Modifier::BOLD))
        } else {
            row
        }
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Min(30),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" This week · Global "),
    );

    f.render_widget(table, area);
}
