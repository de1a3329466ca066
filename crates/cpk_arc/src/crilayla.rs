//! Block decompression for compressed file frames.
//!
//! The encoder built its stream back to front: both the compressed input and
//! the produced output are processed in a reversed sense. The bit source
//! consumes the input buffer from its last byte toward its first (bits taken
//! high to low within each byte), output bytes accumulate in that same
//! reversed order, and the final step reverses the produced slice to recover
//! the true byte order.

use tracing::instrument;

use crate::error::{Error, Result};
use crate::types::Frame;

/// Minimum length of a back-reference match; also the bias added to the
/// 13-bit copy distance field.
const MIN_MATCH: usize = 3;

/// Byte length of the verbatim trailer following every compressed body.
pub const TRAILER_LEN: usize = 0x100;

/// Widths of the escape-coded length groups: 2, 3, 5, then 8 forever.
fn group_widths() -> impl Iterator<Item = u32> {
    [2u32, 3, 5].into_iter().chain(std::iter::repeat(8))
}

/// Bit read cursor over the reversed view of a byte buffer.
///
/// Bit 0 is the most significant bit of the buffer's *last* byte.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitCursor<'a> {
    /// Create a cursor at bit position 0 of the reversed view.
    pub fn new(data: &'a [u8]) -> Self {
        BitCursor { data, pos: 0 }
    }

    /// Current bit position.
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor to an absolute bit position.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Bits left in the source.
    pub fn remaining(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    /// Read `count` bits (at most 32) as an unsigned big-endian value.
    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        debug_assert!(count <= 32);
        if self.remaining() < count as usize {
            return Err(Error::BitsExhausted {
                bit: self.pos,
                want: count,
            });
        }

        let mut acc = 0u32;
        for _ in 0..count {
            let byte = self.data[self.data.len() - 1 - self.pos / 8];
            let bit = (byte >> (7 - self.pos % 8)) & 1;
            acc = (acc << 1) | u32::from(bit);
            self.pos += 1;
        }
        Ok(acc)
    }

    /// Read one 8-bit value.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.read_bits(8).map(|v| v as u8)
    }
}

/// Decompress `data` into exactly `target_len` bytes.
///
/// Decompression is all-or-nothing: exhausting the bit source mid-read or
/// producing fewer than `target_len` bytes is fatal for the block.
#[instrument(skip(data), fields(compressed = data.len()), err)]
pub fn decompress(data: &[u8], target_len: usize) -> Result<Vec<u8>> {
    let mut bits = BitCursor::new(data);
    let mut out: Vec<u8> = Vec::with_capacity(target_len);

    while out.len() < target_len {
        if bits.remaining() == 0 {
            return Err(Error::ShortOutput {
                produced: out.len(),
                expected: target_len,
            });
        }

        if bits.read_bits(1)? == 1 {
            let distance = bits.read_bits(13)? as usize + MIN_MATCH;

            let mut length = MIN_MATCH;
            for width in group_widths() {
                let group = bits.read_bits(width)?;
                length += group as usize;
                // Any group with a zero bit ends the chain.
                if group != (1 << width) - 1 {
                    break;
                }
            }

            // Copy byte by byte: the source may overlap the write head, and a
            // reference reaching past the start of the output reads zeroes.
            let mut src = out.len() as isize - distance as isize;
            for _ in 0..length {
                let byte = if src < 0 { 0 } else { out[src as usize] };
                out.push(byte);
                src += 1;
            }
        } else {
            let byte = bits.read_byte()?;
            out.push(byte);
        }
    }

    out.truncate(target_len);
    out.reverse();
    Ok(out)
}

/// Recover the original file bytes of a compressed frame.
///
/// The verbatim trailer is prepended unmodified to the decompressed body.
pub fn unpack(frame: &Frame) -> Result<Vec<u8>> {
    let header = frame.crilayla_header()?;

    if frame.body.len() != header.compressed_size as usize {
        return Err(Error::BodyLengthMismatch {
            offset: frame.offset,
            declared: header.compressed_size,
            actual: frame.body.len(),
        });
    }
    let trailer = frame
        .trailer
        .as_deref()
        .filter(|t| t.len() == TRAILER_LEN)
        .ok_or(Error::MissingTrailer {
            offset: frame.offset,
        })?;

    let data = decompress(&frame.body, header.uncompressed_size as usize)?;

    let mut out = Vec::with_capacity(TRAILER_LEN + data.len());
    out.extend_from_slice(trailer);
    out.extend_from_slice(&data);
    Ok(out)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{decompress, unpack, BitCursor};
    use crate::error::Error;
    use crate::types::{Frame, FrameKind};

    /// Builds a compressed bit source: bits are collected in stream order,
    /// packed high to low, and the byte order reversed at the end so the
    /// cursor's reversed view reads them back first to last.
    #[derive(Default)]
    struct RevBitWriter {
        bits: Vec<bool>,
    }

    impl RevBitWriter {
        fn push_bits(&mut self, value: u32, count: u32) {
            for i in (0..count).rev() {
                self.bits.push((value >> i) & 1 == 1);
            }
        }

        fn literal(&mut self, byte: u8) {
            self.push_bits(0, 1);
            self.push_bits(u32::from(byte), 8);
        }

        fn finish(self) -> Vec<u8> {
            let mut bytes = Vec::with_capacity(self.bits.len().div_ceil(8));
            for chunk in self.bits.chunks(8) {
                let mut byte = 0u8;
                for (i, bit) in chunk.iter().enumerate() {
                    if *bit {
                        byte |= 1 << (7 - i);
                    }
                }
                bytes.push(byte);
            }
            bytes.reverse();
            bytes
        }
    }

    #[test]
    fn bit_cursor_reads_the_reversed_view() {
        // Last byte first, high bits first.
        let data = [0b0000_0001u8, 0b1010_0000];
        let mut bits = BitCursor::new(&data);

        assert_eq!(bits.read_bits(3).unwrap(), 0b101);
        assert_eq!(bits.position(), 3);
        assert_eq!(bits.read_bits(13).unwrap(), 0b0_0000_0000_0001);
        assert_eq!(bits.remaining(), 0);

        bits.seek(8);
        assert_eq!(bits.read_byte().unwrap(), 0b0000_0001);
    }

    #[test]
    fn literals_come_back_in_true_order() {
        let mut w = RevBitWriter::default();
        // Output accumulates reversed, so literals are emitted back to front.
        for byte in b"CBA" {
            w.literal(*byte);
        }

        assert_eq!(decompress(&w.finish(), 3).unwrap(), b"ABC");
    }

    #[test]
    fn overlapping_back_reference_copies_in_lockstep() {
        let mut w = RevBitWriter::default();
        w.literal(b'X');
        w.literal(b'Y');
        w.literal(b'Z');
        w.push_bits(1, 1); // back-reference
        w.push_bits(0, 13); // distance 0 + 3
        w.push_bits(0b11, 2); // all ones, keep reading
        w.push_bits(0b001, 3); // stop; length 3 + 3 + 1 = 7

        // Distance 3, length 7: the copy rereads bytes it just wrote.
        let expected: Vec<u8> = b"XYZXYZXYZX".iter().rev().copied().collect();
        assert_eq!(decompress(&w.finish(), 10).unwrap(), expected);
    }

    #[test]
    fn length_escape_accumulates_group_values() {
        let mut w = RevBitWriter::default();
        w.literal(b'X');
        w.literal(b'Y');
        w.literal(b'Z');
        w.push_bits(1, 1);
        w.push_bits(0, 13);
        // An all-ones 2-bit group forces a 3-bit group; `101` ends the chain.
        w.push_bits(0b11, 2);
        w.push_bits(0b101, 3);

        // Accumulated length 3 + 3 + 5 = 11, on top of the 3 literals.
        let out = decompress(&w.finish(), 14).unwrap();
        assert_eq!(out.len(), 14);

        let expected: Vec<u8> = b"XYZXYZXYZXYZXY".iter().rev().copied().collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn references_before_the_start_read_zeroes() {
        let mut w = RevBitWriter::default();
        w.literal(b'A');
        w.push_bits(1, 1);
        w.push_bits(0, 13); // distance 3 against a single produced byte
        w.push_bits(0b00, 2); // length 3

        let out = decompress(&w.finish(), 4).unwrap();
        assert_eq!(out, [b'A', 0, 0, b'A']);
    }

    #[test]
    fn overshooting_matches_are_clipped_to_the_target() {
        let mut w = RevBitWriter::default();
        w.literal(b'X');
        w.literal(b'Y');
        w.literal(b'Z');
        w.push_bits(1, 1);
        w.push_bits(0, 13);
        w.push_bits(0b11, 2);
        w.push_bits(0b001, 3); // length 7, but only 5 more bytes are wanted

        let expected: Vec<u8> = b"XYZXYZXY".iter().rev().copied().collect();
        assert_eq!(decompress(&w.finish(), 8).unwrap(), expected);
    }

    #[test]
    fn decompression_is_deterministic() {
        let mut w = RevBitWriter::default();
        for byte in b"tenretni" {
            w.literal(*byte);
        }
        let data = w.finish();

        assert_eq!(
            decompress(&data, 8).unwrap(),
            decompress(&data, 8).unwrap()
        );
    }

    #[test]
    fn exhausting_bits_mid_read_is_fatal() {
        let mut w = RevBitWriter::default();
        w.push_bits(1, 1); // back-reference announced...
        w.push_bits(0b10101, 5); // ...but the 13-bit distance is cut short

        assert!(matches!(
            decompress(&w.finish(), 5).unwrap_err(),
            Error::BitsExhausted { want: 13, .. }
        ));
    }

    #[test]
    fn short_output_is_fatal() {
        let mut w = RevBitWriter::default();
        // 16 literals fill exactly 18 bytes of bit source.
        for byte in 0..16u8 {
            w.literal(byte);
        }

        assert!(matches!(
            decompress(&w.finish(), 17).unwrap_err(),
            Error::ShortOutput {
                produced: 16,
                expected: 17,
            }
        ));
    }

    #[test]
    fn unpack_prepends_the_verbatim_trailer() {
        let mut w = RevBitWriter::default();
        for byte in [8u8, 7, 6, 5, 4, 3, 2, 1] {
            w.literal(byte);
        }
        let body = w.finish();

        let mut header = [0u8; 16];
        header[..8].copy_from_slice(b"CRILAYLA");
        header[8..12].copy_from_slice(&8u32.to_le_bytes());
        header[12..16].copy_from_slice(&(body.len() as u32).to_le_bytes());

        let trailer: Vec<u8> = (0..=255u8).collect();
        let frame = Frame {
            offset: 0x800,
            kind: FrameKind::Crilayla,
            header,
            body,
            trailer: Some(trailer.clone().into_boxed_slice()),
        };

        let out = unpack(&frame).unwrap();
        assert_eq!(out.len(), 0x108);
        assert_eq!(&out[..0x100], &trailer[..]);
        assert_eq!(&out[0x100..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn unpack_rejects_body_length_disagreement() {
        let mut header = [0u8; 16];
        header[..8].copy_from_slice(b"CRILAYLA");
        header[8..12].copy_from_slice(&8u32.to_le_bytes());
        header[12..16].copy_from_slice(&9u32.to_le_bytes());

        let frame = Frame {
            offset: 0,
            kind: FrameKind::Crilayla,
            header,
            body: vec![0; 4],
            trailer: Some(vec![0; 0x100].into_boxed_slice()),
        };

        assert!(matches!(
            unpack(&frame).unwrap_err(),
            Error::BodyLengthMismatch {
                declared: 9,
                actual: 4,
                ..
            }
        ));
    }
}
