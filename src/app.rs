use std::sync::mpsc::Sender;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::coach::{CoachClient, CoachConversation, CoachReply};
use crate::config::Config;
use crate::history::{RunHistory, RunRecord};
use crate::identity::{IdentityProvider, LocalIdentity};
use crate::leaderboard::{leaderboard_for, LeaderboardEntry};
use crate::map::RouteMap;
use crate::positioning::PositionSource;
use crate::runtime::{position_callback, AppEvent, EventSource, Runner, Ticker};
use crate::session::{Notice, NoticeLevel, RunTracker};

/// Ticks a toast stays on screen
pub const TOAST_SECS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum AppState {
    Run,
    History,
    Leaderboard,
    Coach,
}

#[derive(Debug, Default)]
pub struct HistoryState {
    pub selected: usize,
    pub confirm_clear: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub notice: Notice,
    pub ticks_left: u32,
}

pub struct App<P: PositionSource> {
    pub tracker: RunTracker<P, RouteMap>,
    pub state: AppState,
    pub identity: LocalIdentity,
    pub coach: CoachClient,
    pub conversation: Option<(u64, CoachConversation)>,
    pub coach_input: String,
    pub history_state: HistoryState,
    pub toast: Option<Toast>,
    pub should_quit: bool,
    /// Screen to return to when the coach is closed
    coach_return: AppState,
    next_conversation: u64,
    events: Sender<AppEvent>,
}

impl<P: PositionSource> App<P> {
    pub fn new(
        source: P,
        history: RunHistory,
        config: &Config,
        identity: LocalIdentity,
        events: Sender<AppEvent>,
    ) -> Self {
        let tracker = RunTracker::new(
            source,
            RouteMap::default(),
            history,
            position_callback(events.clone()),
        )
        .with_options(config.initial_fix_options(), config.watch_options());

        Self {
            tracker,
            state: AppState::Run,
            identity,
            coach: CoachClient::from_config(config),
            conversation: None,
            coach_input: String::new(),
            history_state: HistoryState::default(),
            toast: None,
            should_quit: false,
            coach_return: AppState::Run,
            next_conversation: 1,
            events,
        }
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.tracker.history().list()
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard_for(self.identity.current_user())
    }

    pub fn active_conversation(&self) -> Option<&CoachConversation> {
        self.conversation.as_ref().map(|(_, c)| c)
    }

    /// Pull the next event from `runner` and apply it. A run started here
    /// restarts the tick phase so the run clock counts from the start.
    pub fn step<E: EventSource, T: Ticker>(&mut self, runner: &mut Runner<E, T>) -> bool {
        self.sync_clock(runner);
        let redraw = self.handle_event(runner.step());
        self.sync_clock(runner);
        redraw
    }

    fn sync_clock<E: EventSource, T: Ticker>(&mut self, runner: &mut Runner<E, T>) {
        if self.tracker.take_clock_restart() {
            runner.restart_tick();
        }
    }

    /// Apply one event. Returns true when the screen needs a redraw.
    pub fn handle_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Tick => {
                self.tracker.on_tick();
                self.age_toast();
            }
            AppEvent::Resize => {}
            AppEvent::Position(ev) => self.tracker.handle_position(ev),
            AppEvent::Coach(reply) => self.on_coach_reply(reply),
            AppEvent::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    return false;
                }
                self.on_key(key);
            }
        }
        self.collect_notices();
        true
    }

    fn collect_notices(&mut self) {
        if let Some(notice) = self.tracker.take_notices().pop() {
            self.show_toast(notice);
        }
    }

    fn show_toast(&mut self, notice: Notice) {
        self.toast = Some(Toast {
            notice,
            ticks_left: TOAST_SECS,
        });
    }

    fn age_toast(&mut self) {
        if let Some(toast) = &mut self.toast {
            toast.ticks_left = toast.ticks_left.saturating_sub(1);
            if toast.ticks_left == 0 {
                self.toast = None;
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.state {
            AppState::Run => self.on_run_key(key.code),
            AppState::History => self.on_history_key(key.code),
            AppState::Leaderboard => match key.code {
                KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
                    self.state = AppState::Run
                }
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
            AppState::Coach => self.on_coach_key(key.code),
        }
    }

    fn on_run_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char(' ') | KeyCode::Enter => {
                // failures are already reported on the status line
                let _ = self.tracker.toggle_run();
            }
            KeyCode::Char('l') => {
                if !self.tracker.is_tracking() {
                    let _ = self.tracker.locate();
                }
            }
            KeyCode::Char('h') => {
                self.history_state = HistoryState::default();
                self.state = AppState::History;
            }
            KeyCode::Char('b') => self.state = AppState::Leaderboard,
            KeyCode::Char('c') => {
                if let Some(run) = self.tracker.history().latest() {
                    self.open_coach(&run, AppState::Run);
                } else {
                    self.show_toast(Notice {
                        level: NoticeLevel::Info,
                        message: "Finish a run to get coaching.".to_string(),
                    });
                }
            }
            KeyCode::Char('o') => {
                self.identity.sign_out();
                self.show_toast(Notice {
                    level: NoticeLevel::Info,
                    message: "Signed out.".to_string(),
                });
            }
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }

    fn on_history_key(&mut self, code: KeyCode) {
        if self.history_state.confirm_clear {
            if code == KeyCode::Char('y') {
                self.tracker.history_mut().clear();
                self.history_state.selected = 0;
                tracing::info!("run history cleared");
            }
            self.history_state.confirm_clear = false;
            return;
        }

        let runs = self.runs();
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.history_state.selected = self.history_state.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.history_state.selected + 1 < runs.len() {
                    self.history_state.selected += 1;
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(run) = runs.get(self.history_state.selected) {
                    self.tracker.history_mut().delete(run.id);
                    let remaining = runs.len() - 1;
                    self.history_state.selected =
                        self.history_state.selected.min(remaining.saturating_sub(1));
                }
            }
            KeyCode::Char('x') => {
                if !runs.is_empty() {
                    self.history_state.confirm_clear = true;
                }
            }
            KeyCode::Char('c') | KeyCode::Enter => {
                if let Some(run) = runs.get(self.history_state.selected) {
                    self.open_coach(run, AppState::History);
                }
            }
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') => self.state = AppState::Run,
            KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn on_coach_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.coach_input.clear();
                self.state = self.coach_return;
            }
            KeyCode::Enter => {
                // keep the draft while a reply is still on its way
                if self.active_conversation().is_some_and(|c| c.is_busy()) {
                    return;
                }
                let question = std::mem::take(&mut self.coach_input);
                self.send_question(&question);
            }
            KeyCode::Backspace => {
                self.coach_input.pop();
            }
            KeyCode::Char(c) => self.coach_input.push(c),
            _ => {}
        }
    }

    pub fn open_coach(&mut self, run: &RunRecord, return_to: AppState) {
        let id = self.next_conversation;
        self.next_conversation += 1;

        let mut chat = CoachConversation::new(run);
        if !self.coach.is_configured() {
            chat.note_not_configured();
        } else if let Some(history) = chat.begin_analysis() {
            self.dispatch(id, history);
        }

        tracing::info!(run = run.id, conversation = id, "coach opened");
        self.conversation = Some((id, chat));
        self.coach_input.clear();
        self.coach_return = return_to;
        self.state = AppState::Coach;
    }

    fn send_question(&mut self, question: &str) {
        let configured = self.coach.is_configured();
        let Some((id, chat)) = &mut self.conversation else {
            return;
        };
        if question.trim().is_empty() {
            return;
        }
        if !configured {
            chat.note_not_configured();
            return;
        }
        let id = *id;
        if let Some(history) = chat.ask(question) {
            self.dispatch(id, history);
        }
    }

    fn dispatch(&self, conversation: u64, history: Vec<crate::coach::Content>) {
        let tx = self.events.clone();
        self.coach.spawn_generate(conversation, history, move |reply| {
            let _ = tx.send(AppEvent::Coach(reply));
        });
    }

    fn on_coach_reply(&mut self, reply: CoachReply) {
        match &mut self.conversation {
            Some((id, chat)) if *id == reply.conversation => chat.accept_reply(reply.result),
            _ => tracing::debug!(conversation = reply.conversation, "dropping stale coach reply"),
        }
    }
}
