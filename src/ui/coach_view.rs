use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::{
    app::App,
    coach::Author,
    positioning::PositionSource,
    ui::{bold, dim},
    util::{truncate_to_width, wrap_to_width},
};

pub fn render_coach<P: PositionSource>(app: &App<P>, f: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    let Some(chat) = app.active_conversation() else {
        f.render_widget(
            Paragraph::new(Span::styled("Open a run from history to get coaching.", dim()))
                .block(Block::default().borders(Borders::ALL).title(" AI Coach ")),
            area,
        );
        return;
    };

    let run = chat.payload();
    let summary = format!(
        "{} · {} · {} · {}",
        run.distance,
        run.duration,
        run.pace,
        run.calories.as_deref().unwrap_or("N/A")
    );
    f.render_widget(
        Paragraph::new(Span::styled(summary, bold())).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" AI Coach · {} ", run.timestamp)),
        ),
        chunks[0],
    );

    // inside the borders, one column of margin each side
    let text_width = chunks[1].width.saturating_sub(4) as usize;
    let mut lines: Vec<Line> = Vec::new();
    for message in chat.transcript() {
        let (who, style) = match message.author {
            Author::Coach => ("🤖 coach", Style::default().fg(Color::Cyan)),
            Author::Runner => ("🏃 you", Style::default().fg(Color::Yellow)),
        };
        lines.push(Line::from(Span::styled(who, bold().patch(style))));
        lines.extend(
            wrap_to_width(&message.text, text_width)
                .into_iter()
                .map(Line::raw),
        );
        lines.push(Line::raw(""));
    }
    if chat.is_busy() {
        lines.push(Line::from(Span::styled("coach is typing…", dim())));
    }

    // keep the newest lines in view
    let visible = chunks[1].height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;
    f.render_widget(
        Paragraph::new(lines)
            .scroll((scroll, 0))
            .block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );

    let prompt = format!("> {}", app.coach_input);
    let input_width = chunks[2].width.saturating_sub(2) as usize;
    f.render_widget(
        Paragraph::new(truncate_to_width(&prompt, input_width)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Ask about diet, recovery or training "),
        ),
        chunks[2],
    );
}
