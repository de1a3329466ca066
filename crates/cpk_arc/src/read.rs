//! Types for reading CPK archives
//!

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::types::{
    cri_header, identify, Frame, FrameKind, EMBEDDED_TERMINATOR, PNG_TERMINATOR,
};

/// Byte alignment of frames and padding lines.
pub const FRAME_ALIGN: u64 = 0x10;

/// Fill `buf` from `reader`, returning how many bytes were available.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Lazy scanner producing the archive's frames in stream order.
///
/// The scanner holds no state across frames beyond the read position: every
/// call reads a 16 byte header line at the cursor, consumes all-zero lines as
/// padding without emitting a frame, extracts the payload for a recognized
/// marker, and realigns to the next 16 byte boundary. An unrecognized
/// non-zero header is a fatal format error, never skipped.
///
/// ```no_run
/// use std::fs::File;
///
/// fn count_frames(path: &str) -> cpk_arc::error::Result<usize> {
///     let mut scanner = cpk_arc::FrameScanner::new(File::open(path)?);
///
///     let mut count = 0;
///     while let Some(frame) = scanner.next_frame()? {
///         println!("{:#010x} {}", frame.offset, frame.kind);
///         count += 1;
///     }
///
///     Ok(count)
/// }
/// ```
pub struct FrameScanner<R> {
    reader: R,
}

impl<R> FrameScanner<R> {
    /// Wrap a reader positioned at the start of the archive.
    pub fn new(reader: R) -> FrameScanner<R> {
        FrameScanner { reader }
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> FrameScanner<R> {
    /// Seek back to the start of the archive so scanning can restart.
    pub fn rewind(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Produce the next frame, or `None` at a clean end of input.
    #[instrument(skip(self), err)]
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            let offset = self.reader.stream_position()?;

            let mut header = [0u8; 16];
            let n = read_full(&mut self.reader, &mut header)?;
            if n == 0 {
                return Ok(None);
            }
            if n < 16 {
                return Err(Error::TruncatedHeader { offset });
            }

            // Pure padding between frames.
            if header.iter().all(|b| *b == 0) {
                continue;
            }

            let kind = identify(&header).ok_or(Error::UnrecognizedFrame { offset, header })?;
            let frame = self.extract(offset, kind, header)?;
            debug!(offset, kind = %frame.kind, size = frame.body.len(), "frame");

            // Consume any slack up to the next 16 byte boundary.
            let pos = self.reader.stream_position()?;
            if pos % FRAME_ALIGN != 0 {
                self.reader
                    .seek(SeekFrom::Current((FRAME_ALIGN - pos % FRAME_ALIGN) as i64))?;
            }

            return Ok(Some(frame));
        }
    }

    /// Iterator adapter over [`FrameScanner::next_frame`], fused after an error.
    pub fn frames(&mut self) -> impl Iterator<Item = Result<Frame>> + '_ {
        let mut failed = false;
        std::iter::from_fn(move || {
            if failed {
                return None;
            }
            match self.next_frame() {
                Ok(Some(frame)) => Some(Ok(frame)),
                Ok(None) => None,
                Err(e) => {
                    failed = true;
                    Some(Err(e))
                }
            }
        })
    }

    fn extract(&mut self, offset: u64, kind: FrameKind, header: [u8; 16]) -> Result<Frame> {
        let mut frame = Frame {
            offset,
            kind,
            header,
            body: Vec::new(),
            trailer: None,
        };

        match kind {
            FrameKind::ZeroSentinel | FrameKind::Copyright => {}

            FrameKind::Crilayla => {
                let ch = frame.crilayla_header()?;
                frame.body = self.read_exact_vec(ch.compressed_size as usize)?;
                frame.trailer = Some(self.read_exact_vec(0x100)?.into_boxed_slice());
            }

            FrameKind::Cpk | FrameKind::Toc | FrameKind::Itoc | FrameKind::Etoc
            | FrameKind::Cri => {
                let (_, size) = cri_header(&header).ok_or(Error::BadCriHeader { offset })?;
                frame.body = self.read_exact_vec(size as usize)?;
            }

            FrameKind::Gim => {
                let reserved = self.reader.read_u32::<LittleEndian>()?;
                if reserved != 2 {
                    return Err(Error::BadGimHeader { offset });
                }
                let size = self.reader.read_u32::<LittleEndian>()?;

                frame.body.extend_from_slice(&reserved.to_le_bytes());
                frame.body.extend_from_slice(&size.to_le_bytes());
                frame.body.extend(self.read_exact_vec(size as usize)?);
            }

            FrameKind::Raw1 => {
                // No length field: the payload runs until the next marker.
                loop {
                    let mut line = [0u8; 16];
                    let n = read_full(&mut self.reader, &mut line)?;
                    if n < 16 {
                        frame.body.extend_from_slice(&line[..n]);
                        break;
                    }
                    if identify(&line).is_some() {
                        self.reader.seek(SeekFrom::Current(-16))?;
                        break;
                    }
                    frame.body.extend_from_slice(&line);
                }
            }

            FrameKind::Embedded24 => loop {
                let mut chunk = [0u8; 4];
                if read_full(&mut self.reader, &mut chunk)? < 4 {
                    return Err(Error::MissingTerminator { offset, kind });
                }
                frame.body.extend_from_slice(&chunk);
                if chunk == EMBEDDED_TERMINATOR {
                    break;
                }
            },

            FrameKind::Png => loop {
                let mut line = [0u8; 16];
                let n = read_full(&mut self.reader, &mut line)?;
                frame.body.extend_from_slice(&line[..n]);

                // The terminator may straddle two lines; check the tail.
                let tail_start = frame.body.len().saturating_sub(16 + n);
                let tail = &frame.body[tail_start..];
                if tail.windows(8).any(|w| w == PNG_TERMINATOR) {
                    break;
                }
                if n < 16 {
                    return Err(Error::MissingTerminator { offset, kind });
                }
            },
        }

        Ok(frame)
    }

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}
