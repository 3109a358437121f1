//! CLI argument parsing.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "leadsync", version, about = "Mailbox lead-report poller with a live read API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start the HTTP server and the polling scheduler (default).
    Serve {
        /// Serve the API without arming the scheduler; cycles run only via the trigger endpoint.
        #[arg(long)]
        no_poll: bool,
    },
    /// Run a single polling cycle, print its outcome as JSON, and exit.
    PollOnce,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve { no_poll: false })
    }
}
