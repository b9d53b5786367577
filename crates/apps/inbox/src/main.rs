//! Inbox - browse, search and sync an analyzed mailbox from the terminal
//!
//! This is the main entry point for the inbox command-line client.

use clap::Parser;
use log::error;

mod app;
mod cli;
mod expansion;
mod render;

use app::App;
use cli::Cli;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let result = match App::from_cli(&cli) {
        Ok(app) => app.run(cli.command, &mut std::io::stdout().lock()).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("错误: {e:#}");
        std::process::exit(1);
    }
}
