//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

mod chat;
mod common;
mod config;
mod serve;
mod tools;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kubepilot")]
#[command(version)]
#[command(about = "Chat with your Kubernetes cluster through MCP tools", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.kubepilot/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket gateway
    Serve,
    /// Chat in the terminal
    Chat {
        /// Send one message and exit
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List the tools offered by the MCP server
    Tools {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Check the config file for unknown or misspelled fields
        #[arg(long)]
        check: bool,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = common::load_config(cli.config.as_deref())?;
    kubepilot::utils::logging::init_logging(&config.logging)
        .context("Failed to initialize logging")?;

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Serve) => serve::cmd_serve(config).await?,
        Some(Commands::Chat { message }) => chat::cmd_chat(config, message).await?,
        Some(Commands::Tools { json }) => tools::cmd_tools(config, json).await?,
        Some(Commands::Config { check }) => {
            let path = cli.config.unwrap_or_else(kubepilot::config::Config::path);
            config::cmd_config(&config, &path, check)?
        }
    }
    Ok(())
}
