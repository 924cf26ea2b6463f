mod args;
mod commands;
mod shared;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use args::{AppCommand, Cli};
use commands::{run_decode, run_fix, run_replay, run_select, run_track};

// Top-level entrypoint: set up logging, parse CLI args and dispatch to a command module.
fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        AppCommand::Fix(args) => run_fix(args),
        AppCommand::Track(args) => run_track(args),
        AppCommand::Select(args) => run_select(args),
        AppCommand::Replay(args) => run_replay(args),
        AppCommand::Decode(args) => run_decode(args),
    }
}
