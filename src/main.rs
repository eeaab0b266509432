use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strinex::{
    app::App,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    history::{MemoryKvStore, RunHistory, SqliteKvStore},
    identity::LocalIdentity,
    positioning::{NoPositioning, PositionSource},
    replay::ReplayPositionSource,
    runtime::{CrosstermEventSource, EventSource, FixedTicker, Runner},
    ui,
};

const LOG_ENV: &str = "STRINEX_LOG";
const DEFAULT_LOG_FILTER: &str = "strinex=info";

/// live GPS run tracking in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Track a run on a live route map with distance, pace, speed and calories, keep a history of your last 50 runs and get post-run coaching."
)]
pub struct Cli {
    /// replay a recorded track (csv: latitude,longitude,accuracy_m,timestamp_ms[,error])
    #[clap(short = 'r', long)]
    replay: Option<PathBuf>,

    /// replay speed multiplier
    #[clap(short = 's', long, default_value_t = 1.0)]
    replay_speed: f64,

    /// display name for the header and leaderboard
    #[clap(short = 'n', long)]
    name: Option<String>,

    /// e-mail shown when no name is set
    #[clap(long)]
    email: Option<String>,

    /// API key for the AI coach
    #[clap(long)]
    coach_key: Option<String>,

    /// config file to use instead of the default location
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// run history database to use instead of the default location
    #[clap(long)]
    history_db: Option<PathBuf>,

    /// do not ask for an initial fix on startup
    #[clap(long)]
    no_locate: bool,
}

impl Cli {
    /// Flags win over the stored config
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(name) = &self.name {
            cfg.display_name = Some(name.clone());
        }
        if let Some(email) = &self.email {
            cfg.email = Some(email.clone());
        }
        if let Some(key) = &self.coach_key {
            cfg.coach_api_key = Some(key.clone());
        }
        cfg
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // the terminal belongs to the UI, so logs only go to a file
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init();
}

fn open_history(path: Option<PathBuf>) -> RunHistory {
    let path = path.unwrap_or_else(SqliteKvStore::default_path);
    match SqliteKvStore::open(&path) {
        Ok(store) => RunHistory::new(Box::new(store)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "history database unavailable, runs will not persist");
            RunHistory::new(Box::new(MemoryKvStore::new()))
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_logging();

    let store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let config = cli.apply(store.load().with_env_overrides());
    tracing::info!(config = %store.path().display(), replay = ?cli.replay, "starting");

    // load the replay before touching the terminal so errors print normally
    match &cli.replay {
        Some(path) => {
            let source = ReplayPositionSource::from_path(path, cli.replay_speed)?;
            run(source, &cli, &config)
        }
        None => run(NoPositioning, &cli, &config),
    }
}

fn run<P: PositionSource>(source: P, cli: &Cli, config: &Config) -> Result<(), Box<dyn Error>> {
    let history = open_history(cli.history_db.clone());
    let identity = LocalIdentity::from_config(config);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut runner = Runner::new(CrosstermEventSource::new(), FixedTicker::every_second());
    let mut app = App::new(source, history, config, identity, runner.sender());
    if !cli.no_locate {
        let _ = app.tracker.locate();
    }

    let result = start_tui(&mut terminal, &mut app, &mut runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    tracing::info!("exiting");
    result
}

fn start_tui<B: Backend, P: PositionSource, E: EventSource>(
    terminal: &mut Terminal<B>,
    app: &mut App<P>,
    runner: &mut Runner<E, FixedTicker>,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| ui::draw(app, f))?;

    while !app.should_quit {
        if app.step(runner) {
            terminal.draw(|f| ui::draw(app, f))?;
        }
    }

    // quitting mid-run drops the run, like closing the tracker page
    app.tracker.abandon_run();
    Ok(())
}
