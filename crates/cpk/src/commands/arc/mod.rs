pub mod dump;
pub mod extract;
pub mod scan;
pub mod schema;

#[derive(clap::Subcommand)]
pub enum ArcCommands {
    /// Walk an archive's frames and report statistics
    Scan(scan::ScanArgs),
    /// Extract an archive's files into a directory
    Extract(extract::ExtractArgs),
    /// Print the schemas of an archive's index tables
    Schema(schema::SchemaArgs),
    /// Dump an archive's frames into an aligned fragment image
    Dump(dump::DumpArgs),
}

impl ArcCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ArcCommands::Scan(scan) => scan.handle(),
            ArcCommands::Extract(extract) => extract.handle(),
            ArcCommands::Schema(schema) => schema.handle(),
            ArcCommands::Dump(dump) => dump.handle(),
        }
    }
}
