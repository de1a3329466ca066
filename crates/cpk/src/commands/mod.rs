pub mod arc;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle CPK archive files
    Arc {
        #[command(subcommand)]
        command: arc::ArcCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Arc { command } => command.handle(),
        }
    }
}
