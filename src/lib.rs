// Run tracking engine and TUI pieces; main.rs only wires the terminal,
// the CLI and logging around them.
pub mod app;
pub mod app_dirs;
pub mod coach;
pub mod config;
pub mod filter;
pub mod geo;
pub mod history;
pub mod identity;
pub mod leaderboard;
pub mod map;
pub mod metrics;
pub mod positioning;
pub mod replay;
pub mod route;
pub mod runtime;
pub mod session;
pub mod ui;
pub mod util;
