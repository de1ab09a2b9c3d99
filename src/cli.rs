//! CLI argument parsing for the engagement-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "engagement-worker", about = "Employee engagement survey worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Import a survey CSV file synchronously and print the summary
    Import {
        /// Path to the `;`-separated survey export
        file: PathBuf,
        /// Validate and count against an in-memory store; nothing is written
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the status of an import job
    Status {
        job_id: Uuid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["engagement-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["engagement-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_import_command_parses() {
        let cli = Cli::parse_from(["engagement-worker", "import", "data/survey.csv", "--dry-run"]);
        match cli.command {
            Some(Command::Import { file, dry_run }) => {
                assert_eq!(file, PathBuf::from("data/survey.csv"));
                assert!(dry_run);
            }
            _ => panic!("expected import command"),
        }
    }

    #[test]
    fn test_cli_status_requires_uuid() {
        assert!(Cli::try_parse_from(["engagement-worker", "status", "not-a-uuid"]).is_err());
        let cli = Cli::parse_from(["engagement-worker", "status", "00000000-0000-0000-0000-000000000000"]);
        assert!(matches!(cli.command, Some(Command::Status { job_id }) if job_id.is_nil()));
    }
}
