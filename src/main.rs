mod commands;

use clap::Parser;

use std::path::PathBuf;
use std::process::ExitCode;

use torrent_intake::bot_options::BotOptions;

#[derive(Parser)]
#[command(name = "torrent-intake")]
#[command(about = "Validates uploaded torrent files and manages upload records")]
struct Cli {
    /// JSON database file, overrides DATABASE_PATH
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut options = match BotOptions::from_env() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("[Error] {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(database) = cli.database {
        options.database_path = database;
    }

    // stdout carries command output
    tracing_subscriber::fmt()
        .with_max_level(options.tracing_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("starting {}", options.bot_name);

    match commands::handle_command(cli.command, options).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("[Error] {:#}", e);
            ExitCode::FAILURE
        }
    }
}
