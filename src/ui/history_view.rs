use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, TableState,
    },
    Frame,
};

use crate::{
    app::App,
    history::HISTORY_CAPACITY,
    metrics::{format_distance, format_elapsed, format_pace},
    positioning::PositionSource,
    ui::{
        bold,
        charting::{compute_chart_params, distance_series, format_label},
        dim,
    },
};

pub fn render_history<P: PositionSource>(app: &App<P>, f: &mut Frame, area: Rect) {
    let runs = app.runs();

    if runs.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled(
                "No runs yet. Press esc and start one!",
                dim(),
            ))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" History ")),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(10)])
        .split(area);

    let header = Row::new(vec!["Completed", "Distance", "Time", "Pace", "kcal", "Points"])
        .style(bold());

    let rows = runs.iter().map(|r| {
        Row::new(vec![
            Cell::from(r.completed_at_label.clone()),
            Cell::from(format!("{} km", format_distance(r.distance_km))),
            Cell::from(format_elapsed(r.duration_seconds)),
            Cell::from(format!("{} /km", format_pace(r.pace_min_per_km))),
            Cell::from(
                r.calories_kcal
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::from(r.gps_point_count.to_string()),
        ])
    });

    let title = if app.history_state.confirm_clear {
        " Clear all runs? (y/N) ".to_string()
    } else {
        format!(" History · {}/{} runs ", runs.len(), HISTORY_CAPACITY)
    };
    let border = if app.history_state.confirm_clear {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(22),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .row_highlight_style(bold().fg(Color::Black).bg(Color::Rgb(255, 45, 45)))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title),
    );

    let mut state = TableState::default().with_selected(Some(app.history_state.selected));
    f.render_stateful_widget(table, chunks[0], &mut state);

    let coords = distance_series(&runs);
    let (x_max, y_max) = compute_chart_params(&coords);
    // a single run still gets a non-empty x range
    let x_max = x_max.max(2.0);
    let datasets = vec![Dataset::default()
        .name("km")
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&coords)];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(" Distance per run "))
        .x_axis(
            Axis::default()
                .title("run")
                .bounds([1.0, x_max])
                .labels(vec![format_label(1.0), format_label(x_max)]),
        )
        .y_axis(
            Axis::default()
                .title("km")
                .bounds([0.0, y_max])
                .labels(vec![format_label(0.0), format_label(y_max)]),
        );

    f.render_widget(chart, chunks[1]);
}
