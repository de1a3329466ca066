use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, path::PathBuf};

use cpk_arc::FrameScanner;
use cpk_utf::Table;

#[derive(Args)]
pub struct SchemaArgs {
    /// An input CPK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl SchemaArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let mut scanner = FrameScanner::new(f);

        while let Some(frame) = scanner.next_frame()? {
            if !frame.kind.is_table() {
                continue;
            }
            let table = Table::parse(&frame.body)?;

            let doc = serde_json::json!({
                "frame": frame.kind.to_string(),
                "offset": frame.offset,
                "table": &*table.name,
                "encrypted": table.encrypted,
                "rows": table.rows.len(),
                "row_width": table.row_width(),
                "columns": &table.columns,
            });
            println!("{}", serde_json::to_string_pretty(&doc).into_diagnostic()?);
        }

        Ok(())
    }
}
