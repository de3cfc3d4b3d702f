//! Command-line interface for the DocSparrow binary.

pub mod seed;

use clap::{Parser, Subcommand};

/// Sales-kit document portal
#[derive(Parser, Debug)]
#[command(name = "docsparrow")]
#[command(about = "DocSparrow sales-kit document portal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Insert the initial countries, products and categories
    Seed,

    /// Create a local user account
    CreateUser {
        /// Login name
        username: String,

        /// Initial password (can also be set via DOCSPARROW_PASSWORD env var)
        #[arg(long, env = "DOCSPARROW_PASSWORD")]
        password: String,

        /// Name shown in the portal
        #[arg(long)]
        display_name: Option<String>,

        /// Grant staff privileges
        #[arg(long)]
        staff: bool,
    },
}
