pub mod charting;
pub mod coach_view;
pub mod history_view;
pub mod leaderboard_view;
pub mod screen;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points},
        Block, Borders, Clear, Paragraph,
    },
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::{App, AppState},
    identity::IdentityProvider,
    positioning::PositionSource,
    session::{NoticeLevel, StatusIndicator},
};

use self::screen::current_screen;

const ACCENT: Color = Color::Rgb(255, 45, 45);

pub fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

pub fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

pub fn status_color(indicator: StatusIndicator) -> Color {
    match indicator {
        StatusIndicator::Idle => Color::Gray,
        StatusIndicator::Searching => Color::Yellow,
        StatusIndicator::Active => Color::Green,
        StatusIndicator::Tracking => Color::Cyan,
        StatusIndicator::Error => Color::Red,
    }
}

/// Top-level frame: header tabs, active screen, key hints, toast
pub fn draw<P: PositionSource>(app: &App<P>, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(app, f, chunks[0]);
    current_screen::<P>(&app.state).render(app, f, chunks[1]);
    render_footer(app, f, chunks[2]);
    render_toast(app, f, chunks[1]);
}

fn render_header<P: PositionSource>(app: &App<P>, f: &mut Frame, area: Rect) {
    let tabs = [
        (AppState::Run, "Run"),
        (AppState::History, "History"),
        (AppState::Leaderboard, "Leaderboard"),
        (AppState::Coach, "Coach"),
    ];

    let mut spans = vec![
        Span::styled(" STRINEX ", bold().fg(Color::Black).bg(ACCENT)),
        Span::raw(" "),
    ];
    for (state, label) in tabs {
        let style = if state == app.state {
            bold().fg(ACCENT).add_modifier(Modifier::UNDERLINED)
        } else {
            dim()
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw("  "));
    }

    let user = match app.identity.current_user() {
        Some(u) => format!("[{}] {} ", u.initials(), u.nav_label()),
        None => "signed out ".to_string(),
    };

    let header = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(user.width() as u16)])
        .split(area);

    f.render_widget(Paragraph::new(Line::from(spans)), header[0]);
    f.render_widget(
        Paragraph::new(Span::styled(user, dim())).alignment(Alignment::Right),
        header[1],
    );
}

fn render_footer<P: PositionSource>(app: &App<P>, f: &mut Frame, area: Rect) {
    let hints = match app.state {
        AppState::Run if app.tracker.is_tracking() => "space stop · q quit",
        AppState::Run => "space start · l locate · h history · b leaderboard · c coach · o sign out · q quit",
        AppState::History if app.history_state.confirm_clear => "y confirm clear · any other key cancels",
        AppState::History => "↑/↓ select · c coach · d delete · x clear all · esc back",
        AppState::Leaderboard => "esc back · q quit",
        AppState::Coach => "type a question · enter send · esc close",
    };
    f.render_widget(
        Paragraph::new(Span::styled(hints, dim())).alignment(Alignment::Center),
        area,
    );
}

fn render_toast<P: PositionSource>(app: &App<P>, f: &mut Frame, area: Rect) {
    let Some(toast) = &app.toast else {
        return;
    };
    let color = match toast.notice.level {
        NoticeLevel::Info => Color::Blue,
        NoticeLevel::Success => Color::Green,
        NoticeLevel::Error => Color::Red,
    };

    let width = (toast.notice.message.width() as u16 + 4).min(area.width);
    let rect = Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(3),
        width,
        height: 3.min(area.height),
    };
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(toast.notice.message.as_str())
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color))),
        rect,
    );
}

/// Map canvas plus the live stats column
pub fn render_run<P: PositionSource>(app: &App<P>, f: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(30)])
        .split(area);

    render_map(app, f, chunks[0]);
    render_stats(app, f, chunks[1]);
}

fn render_map<P: PositionSource>(app: &App<P>, f: &mut Frame, area: Rect) {
    let map = app.tracker.map();
    let ([south, north], [west, east]) = map.viewport();
    let route: Vec<(f64, f64)> = map.route.iter().map(|p| (p.lng, p.lat)).collect();

    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Map · zoom {} ", map.zoom)),
        )
        .marker(Marker::Braille)
        .x_bounds([west, east])
        .y_bounds([south, north])
        .paint(move |ctx| {
            for pair in route.windows(2) {
                ctx.draw(&CanvasLine {
                    x1: pair[0].0,
                    y1: pair[0].1,
                    x2: pair[1].0,
                    y2: pair[1].1,
                    color: ACCENT,
                });
            }
            if route.len() == 1 {
                ctx.draw(&Points {
                    coords: &route,
                    color: ACCENT,
                });
            }
            if let Some(marker) = map.marker {
                ctx.print(
                    marker.lng,
                    marker.lat,
                    Span::styled("●", bold().fg(Color::White)),
                );
            }
        });

    f.render_widget(canvas, area);
}

fn render_stats<P: PositionSource>(app: &App<P>, f: &mut Frame, area: Rect) {
    let tracker = &app.tracker;
    let live = tracker.live();
    let status = tracker.status();

    let stat = |label: &'static str, value: String, unit: &'static str| {
        Line::from(vec![
            Span::styled(format!("{label:<10}"), dim()),
            Span::styled(value, bold()),
            Span::styled(format!(" {unit}"), dim()),
        ])
    };

    let lines = vec![
        Line::from(Span::styled(
            format!("● {}", status.label),
            Style::default().fg(status_color(status.indicator)),
        )),
        Line::raw(""),
        stat("Time", tracker.elapsed_label(), ""),
        stat("Distance", live.distance_label(), "km"),
        stat("Pace", live.pace_label(), "/km"),
        stat("Speed", live.speed_label(), "km/h"),
        stat("Calories", live.calories_kcal.to_string(), "kcal"),
        stat("GPS pts", live.gps_points.to_string(), ""),
        Line::raw(""),
        Line::from(Span::styled(
            if tracker.is_tracking() {
                "■ STOP RUN"
            } else {
                "▶ START RUN"
            },
            bold().fg(ACCENT),
        )),
    ];

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", tracker.state())),
        ),
        area,
    );
}
