//! CLI for the ABK export backup tool.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{run_backup, run_init};

/// Top-level CLI for the ABK export backup tool.
#[derive(Debug, Parser)]
#[command(name = "abk")]
#[command(about = "ABK: resilient Atlassian Cloud export backup", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Trigger the configured exports, then download and archive them.
    Run {
        /// Back up only the Confluence (wiki) export.
        #[arg(short = 'c', long)]
        confluence: bool,

        /// Back up only the Jira site export.
        #[arg(short = 'j', long)]
        jira: bool,
    },

    /// Write a default config file to edit by hand.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        match cli.command {
            CliCommand::Run { confluence, jira } => run_backup(confluence, jira),
            CliCommand::Init { force } => run_init(force),
        }
    }
}
