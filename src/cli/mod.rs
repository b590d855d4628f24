pub mod onboard;

use crate::report::ReportKind;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "FieldReport",
    about = "Field visit and GDM reporting forms backed by a spreadsheet"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive first-run setup
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Check configuration, secrets and spreadsheet access
    Doctor,
    /// Serve the forms and the admin panel
    Serve,
    /// Send one report by e-mail right away
    Report {
        /// visitas | gdm
        kind: ReportKind,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
