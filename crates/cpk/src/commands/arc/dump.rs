use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, path::PathBuf};
use tracing::info;

use cpk_arc::{Fragment, FrameKind, FrameScanner};

#[derive(Args)]
pub struct DumpArgs {
    /// An input CPK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target fragment image
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let mut f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;

        // First pass records every frame's span on disk.
        let spans: Vec<(u64, usize, FrameKind)> = {
            let mut scanner = FrameScanner::new(&mut f);
            scanner
                .frames()
                .map(|r| {
                    r.map(|frame| {
                        let trailer = frame.trailer.map(|t| t.len()).unwrap_or_default();
                        (frame.offset, 16 + frame.body.len() + trailer, frame.kind)
                    })
                })
                .collect::<Result<_, _>>()?
        };

        let mut out = if !self.overwrite {
            File::create_new(&self.output)
                .into_diagnostic()
                .context(format!("creating {}", &self.output.display()))?
        } else {
            File::create(&self.output)
                .into_diagnostic()
                .context(format!("creating {}", &self.output.display()))?
        };

        // Second pass copies each frame out on the fragment grid.
        for (offset, length, kind) in spans {
            let mut fragment = Fragment::parse(&mut f, offset, length)?;
            let landed = fragment.dump(&mut out)?;
            info!("{kind} frame at {offset:#x} dumped to {landed:#x}");
        }

        Ok(())
    }
}
