use clap::Args;
use itertools::Itertools;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{fs::File, path::PathBuf};

use cpk_arc::{FrameKind, FrameScanner};

#[derive(Args)]
pub struct ScanArgs {
    /// An input CPK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ScanArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let mut scanner = FrameScanner::new(f);

        let mut kinds = Vec::new();
        while let Some(frame) = scanner.next_frame()? {
            println!(
                "{:#012x} {:<16} ({:#08x})",
                frame.offset,
                frame.kind.to_string().cyan(),
                frame.body.len()
            );
            kinds.push(frame.kind);
        }

        let counts = kinds.iter().counts();
        println!("{}", format!("scanner found {} frames", kinds.len()).bold());
        for kind in FrameKind::all() {
            println!(
                "{:>16} : {}",
                kind.to_string(),
                counts.get(&kind).copied().unwrap_or_default()
            );
        }

        Ok(())
    }
}
