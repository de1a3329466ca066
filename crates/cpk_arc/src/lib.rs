//! This library handles reading from and extracting **CPK** archives.
//!
//! # CPK Archive Format Documentation
//!
//! A CPK archive is a block-structured container: a sequence of typed,
//! magic-delimited *frames* on a 16 byte grid, with all-zero 16 byte lines as
//! padding between them. Index and metadata frames carry @UTF tables (see the
//! `cpk_utf` crate); file content frames carry a bit-oriented LZ77 variant
//! ("CRILAYLA") or one of a few uncompressed sub-formats.
//!
//! ## Frame Markers
//!
//! Headers are matched against a fixed table of markers, most specific first:
//!
//! | Marker                     | Frame                  | Payload length            |
//! |----------------------------|------------------------|---------------------------|
//! | `CPK`                      | Archive root table     | Header length field       |
//! | `E5 56 D1 9D` + 12×`00`    | Padding sentinel       | None                      |
//! | 10×`00` + `(c)CRI`         | Copyright sentinel     | None                      |
//! | `TOC`                      | Content table          | Header length field       |
//! | `ITOC`                     | File index table       | Header length field       |
//! | `ETOC`                     | Extended index table   | Header length field       |
//! | `CRILAYLA`                 | Compressed file block  | Header field + trailer    |
//! | `CRI`                      | Generic sub-container  | Header length field       |
//! | `MIG.00.1PSP` `00`         | Uncompressed GIM image | Inline size word          |
//! | `1raw`                     | Uncompressed raw block | Runs to the next marker   |
//! | `80 00 00 24 03 12 ...`    | Embedded binary block  | Fixed terminator chunk    |
//! | `89 50 4E 47 0D 0A 1A 0A`  | Uncompressed PNG       | `IEND` chunk signature    |
//!
//! ### CRI-family Headers
//!
//! The 16 byte header line holds a NUL-terminated marker name padded to a
//! 4 byte boundary, followed by a little-endian 32-bit payload length. A
//! compressed file block additionally declares its decompressed size and is
//! followed by a fixed 256 byte verbatim trailer that is prepended unchanged
//! to the decompressed body.
//!
//! ## Directory Resolution
//!
//! The archive indexes itself: the root table's `ContentOffset`/`TocOffset`
//! fields and the content table's per-row `FileOffset` locate every file
//! frame, and [`resolver::DirectoryIndex`] maps a frame's byte offset back to
//! its directory, file name, declared sizes and ID.
//!
//! ## Additional Information
//!
//! - **Endianness**: Little-endian at the frame level; the embedded @UTF
//!   tables are big-endian
//! - **Alignment**: 16 bytes for frames and padding, 2048 bytes for dumped
//!   fragments
//!

pub mod crilayla;
pub mod error;
pub mod fragment;
pub mod read;
pub mod resolver;
pub mod types;

pub use fragment::Fragment;
pub use read::FrameScanner;
pub use resolver::{ArchiveTables, DirectoryIndex, FileRecord};
pub use types::{CrilaylaHeader, Frame, FrameKind};
