use ratatui::{layout::Rect, Frame};

use crate::{
    app::{App, AppState},
    positioning::PositionSource,
    ui::{
        coach_view::render_coach, history_view::render_history,
        leaderboard_view::render_leaderboard, render_run,
    },
};

/// A UI Screen boundary: renders the body area for one app state
pub trait Screen<P: PositionSource> {
    fn render(&self, app: &App<P>, f: &mut Frame, area: Rect);
}

/// Live run - map and metrics
pub struct RunScreen;

impl<P: PositionSource> Screen<P> for RunScreen {
    fn render(&self, app: &App<P>, f: &mut Frame, area: Rect) {
        render_run(app, f, area);
    }
}

pub struct HistoryScreen;

impl<P: PositionSource> Screen<P> for HistoryScreen {
    fn render(&self, app: &App<P>, f: &mut Frame, area: Rect) {
        render_history(app, f, area);
    }
}

pub struct LeaderboardScreen;

impl<P: PositionSource> Screen<P> for LeaderboardScreen {
    fn render(&self, app: &App<P>, f: &mut Frame, area: Rect) {
        render_leaderboard(app, f, area);
    }
}

pub struct CoachScreen;

impl<P: PositionSource> Screen<P> for CoachScreen {
    fn render(&self, app: &App<P>, f: &mut Frame, area: Rect) {
        render_coach(app, f, area);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen<P: PositionSource>(state: &AppState) -> Box<dyn Screen<P>> {
    match state {
        AppState::Run => Box::new(RunScreen),
        AppState::History => Box::new(HistoryScreen),
        AppState::Leaderboard => Box::new(LeaderboardScreen),
        AppState::Coach => Box::new(CoachScreen),
    }
}
