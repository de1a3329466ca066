//! Base types for the structure of CPK archives.

use std::fmt;
use std::io::Cursor;

use binrw::BinRead;
use winnow::combinator::alt;
use winnow::token::literal;
use winnow::{PResult, Parser};

use crate::error::{Error, Result};

/// Padding sentinel stamped into the archive header region.
pub const ZERO_SENTINEL: &[u8; 16] = b"\xE5\x56\xD1\x9D\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00";

/// Copyright sentinel stamped into the archive header region.
pub const COPYRIGHT_SENTINEL: &[u8; 16] = b"\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00(c)CRI";

/// The 12 byte signature of the embedded binary sub-format.
pub const EMBEDDED_SIGNATURE: &[u8; 12] = b"\x80\x00\x00\x24\x03\x12\x04\x02\x00\x00\x56\x22";

/// Terminator chunk of the embedded binary sub-format.
pub const EMBEDDED_TERMINATOR: [u8; 4] = [0x80, 0x01, 0x00, 0x0e];

/// PNG stream signature.
pub const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\x0D\x0A\x1A\x0A";

/// Signature of the final PNG chunk, CRC included.
pub const PNG_TERMINATOR: [u8; 8] = [0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82];

/// The kind of a frame, decided by its leading header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Archive root table
    Cpk,
    /// Zero-length padding sentinel
    ZeroSentinel,
    /// Zero-length copyright stamp
    Copyright,
    /// Content table
    Toc,
    /// File index table
    Itoc,
    /// Extended file index table
    Etoc,
    /// Compressed file block
    Crilayla,
    /// Generic CRI sub-container
    Cri,
    /// Uncompressed GIM image
    Gim,
    /// Uncompressed raw block, delimited by the next marker
    Raw1,
    /// Embedded binary sub-format with a fixed terminator chunk
    Embedded24,
    /// Uncompressed PNG stream
    Png,
}

impl FrameKind {
    /// Short label used in logs and reports.
    pub const fn name(&self) -> &'static str {
        match self {
            FrameKind::Cpk => "CPK",
            FrameKind::ZeroSentinel => "ZERO",
            FrameKind::Copyright => "(c)CRI",
            FrameKind::Toc => "TOC",
            FrameKind::Itoc => "ITOC",
            FrameKind::Etoc => "ETOC",
            FrameKind::Crilayla => "CRILAYLA",
            FrameKind::Cri => "CRI",
            FrameKind::Gim => "GIM",
            FrameKind::Raw1 => "1raw",
            FrameKind::Embedded24 => "80 00 00 24",
            FrameKind::Png => "PNG",
        }
    }

    /// Whether the frame payload is a @UTF index table.
    pub const fn is_table(&self) -> bool {
        matches!(
            self,
            FrameKind::Cpk | FrameKind::Toc | FrameKind::Itoc | FrameKind::Etoc
        )
    }

    /// Whether the header encodes a CRI name-and-length layout.
    pub const fn is_cri_family(&self) -> bool {
        matches!(
            self,
            FrameKind::Cpk
                | FrameKind::Toc
                | FrameKind::Itoc
                | FrameKind::Etoc
                | FrameKind::Crilayla
                | FrameKind::Cri
        )
    }

    /// All kinds, in scanner priority order.
    pub const fn all() -> &'static [FrameKind] {
        &[
            FrameKind::Cpk,
            FrameKind::ZeroSentinel,
            FrameKind::Copyright,
            FrameKind::Toc,
            FrameKind::Itoc,
            FrameKind::Etoc,
            FrameKind::Crilayla,
            FrameKind::Cri,
            FrameKind::Gim,
            FrameKind::Raw1,
            FrameKind::Embedded24,
            FrameKind::Png,
        ]
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Match the frame kind from the leading header bytes.
///
/// Alternatives are ordered most specific first, so `CRILAYLA` wins over the
/// generic `CRI` prefix.
fn frame_kind(s: &mut &[u8]) -> PResult<FrameKind> {
    alt((
        literal(&b"CPK"[..]).value(FrameKind::Cpk),
        literal(&ZERO_SENTINEL[..]).value(FrameKind::ZeroSentinel),
        literal(&COPYRIGHT_SENTINEL[..]).value(FrameKind::Copyright),
        literal(&b"TOC"[..]).value(FrameKind::Toc),
        literal(&b"ITOC"[..]).value(FrameKind::Itoc),
        literal(&b"ETOC"[..]).value(FrameKind::Etoc),
        literal(&b"CRILAYLA"[..]).value(FrameKind::Crilayla),
        literal(&b"CRI"[..]).value(FrameKind::Cri),
        literal(&b"MIG.00.1PSP\x00"[..]).value(FrameKind::Gim),
        literal(&b"1raw"[..]).value(FrameKind::Raw1),
        literal(&EMBEDDED_SIGNATURE[..]).value(FrameKind::Embedded24),
        literal(&PNG_SIGNATURE[..]).value(FrameKind::Png),
    ))
    .parse_next(s)
}

/// Classify a 16 byte header line, if its leading bytes carry a known magic.
pub fn identify(header: &[u8; 16]) -> Option<FrameKind> {
    let mut input = &header[..];
    frame_kind(&mut input).ok()
}

/// Probe the CRI header alignments for a NUL-terminated marker and length.
///
/// The marker field is NUL-terminated and padded to a 4 byte boundary; the
/// little-endian payload length sits in the following word. The first
/// alignment whose terminator byte is zero wins.
pub(crate) fn cri_header(header: &[u8; 16]) -> Option<(usize, u32)> {
    (0..3).find_map(|i| {
        (header[i * 4 + 3] == 0).then(|| {
            let mut end = i * 4 + 3;
            while end > 0 && (header[end - 1] == 0 || header[end - 1] == b' ') {
                end -= 1;
            }
            let size = u32::from_le_bytes(header[(i + 1) * 4..(i + 2) * 4].try_into().unwrap());
            (end, size)
        })
    })
}

/// Header of a compressed file block.
///
/// The 16 byte prefix is followed by `compressed_size` bytes of compressed
/// body and a 256 byte verbatim trailer.
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little, magic = b"CRILAYLA")]
pub struct CrilaylaHeader {
    /// Size of the compressed body once decompressed
    pub uncompressed_size: u32,

    /// Size of the compressed body inside the frame
    pub compressed_size: u32,
}

/// A contiguous, magic-delimited region of the archive byte stream.
///
/// Frames are produced one at a time by [`crate::read::FrameScanner`] and are
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Byte position of the frame's magic header
    pub offset: u64,

    /// Classification of the frame
    pub kind: FrameKind,

    /// The raw 16 byte header line
    pub header: [u8; 16],

    /// The frame payload, header excluded
    pub body: Vec<u8>,

    /// The verbatim trailer of a compressed file block
    pub trailer: Option<Box<[u8]>>,
}

impl Frame {
    /// Parse the compressed-block header out of the raw header line.
    pub fn crilayla_header(&self) -> Result<CrilaylaHeader> {
        CrilaylaHeader::read(&mut Cursor::new(&self.header)).map_err(Error::from)
    }
}
