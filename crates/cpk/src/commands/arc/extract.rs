use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{fs::File, io::Write, path::PathBuf};
use tracing::{info, warn};

use cpk_arc::error::Error;
use cpk_arc::{crilayla, ArchiveTables, DirectoryIndex, FileRecord, Frame, FrameKind, FrameScanner};
use cpk_utf::Table;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input CPK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;

        let mut scanner = FrameScanner::new(f);
        let frames: Vec<Frame> = scanner.frames().collect::<Result<_, _>>()?;

        let find_table = |kind: FrameKind| -> Result<Option<Table>> {
            frames
                .iter()
                .find(|f| f.kind == kind)
                .map(|f| Table::parse(&f.body))
                .transpose()
                .map_err(Into::into)
        };

        let header =
            find_table(FrameKind::Cpk)?.ok_or_else(|| miette!("archive has no CPK root table"))?;
        let content =
            find_table(FrameKind::Toc)?.ok_or_else(|| miette!("archive has no TOC content table"))?;
        let file_index = find_table(FrameKind::Itoc)?;
        let extended_index = find_table(FrameKind::Etoc)?;

        let index = DirectoryIndex::build(
            ArchiveTables::builder()
                .header(&header)
                .content(&content)
                .maybe_file_index(file_index.as_ref())
                .maybe_extended_index(extended_index.as_ref())
                .build(),
        )?;

        let mut written = 0usize;
        let mut skipped = 0usize;
        for frame in frames.iter().filter(|f| f.kind == FrameKind::Crilayla) {
            let record = index.resolve(frame.offset)?;

            // One bad block should not sink the rest of the archive.
            let decoded = match checked_unpack(frame, record) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("skipping {} frame at {:#x}: {e}", frame.kind, frame.offset);
                    skipped += 1;
                    continue;
                }
            };

            let p = self.directory.join(&*record.dir).join(&*record.name);
            info!("writing {}", p.display());

            let _ = std::fs::create_dir_all(p.parent().unwrap());
            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            out.write_all(&decoded).into_diagnostic()?;
            written += 1;
        }

        info!("extracted {written} files, skipped {skipped}");
        Ok(())
    }
}

/// Decode one compressed frame, holding it against the sizes its file record
/// declares.
fn checked_unpack(frame: &Frame, record: &FileRecord) -> cpk_arc::error::Result<Vec<u8>> {
    let on_disk = 0x10 + frame.body.len() as u64 + 0x100;
    if record.file_size != on_disk {
        return Err(Error::SizeMismatch {
            offset: frame.offset,
            field: "FileSize",
            declared: record.file_size,
            actual: on_disk,
        });
    }

    let decoded = crilayla::unpack(frame)?;
    if record.extract_size != decoded.len() as u64 {
        return Err(Error::SizeMismatch {
            offset: frame.offset,
            field: "ExtractSize",
            declared: record.extract_size,
            actual: decoded.len() as u64,
        });
    }

    Ok(decoded)
}
