mod commands;
mod table;

use crate::commands::{schedule_command, ScheduleCommand};
use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use hostctl_client::client::HostClient;
use std::{process, time::Duration};
use tracing::Level;
use url::Url;

#[derive(Debug, Parser)]
#[command(version, about = "Manage scheduled tasks on a hosting account")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[clap(
        long,
        default_value = "https://www.pythonanywhere.com",
        env = "HOSTCTL_API_URL",
        help = "Base URL of the control-plane API"
    )]
    api_url: Url,

    #[clap(long, env = "HOSTCTL_USER", help = "Account the tasks belong to")]
    user: String,

    #[clap(
        long,
        env = "API_TOKEN",
        hide_env_values = true,
        help = "API token of the account"
    )]
    token: String,

    #[clap(
        long,
        default_value_t = 30,
        env = "HOSTCTL_TIMEOUT",
        help = "Connect and read timeout in seconds"
    )]
    timeout: u64,

    #[clap(long, short, global = true, help = "Log API requests to stderr")]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage scheduled tasks
    #[command(subcommand)]
    Schedule(ScheduleCommand),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let client = HostClient::new(
        cli.api_url,
        cli.user,
        cli.token,
        Duration::from_secs(cli.timeout),
    )?;

    let result = match cli.command {
        Command::Schedule(command) => schedule_command(command, &client).await,
    };

    if let Err(error) = result {
        eprintln!("{} {}", "✖".red().bold(), error);
        process::exit(1);
    }

    Ok(())
}
