//! Raw archive fragments, dumped at the archive-level block alignment.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::Result;

/// Byte alignment of top-level dumped fragments.
pub const FRAGMENT_ALIGN: u64 = 0x800;

/// A contiguous run of raw archive bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// Byte position the fragment was read from or written to
    pub offset: u64,

    /// The raw bytes
    pub data: Vec<u8>,
}

impl Fragment {
    /// Read `length` bytes starting at `offset`.
    pub fn parse<R: Read + Seek>(reader: &mut R, offset: u64, length: usize) -> Result<Fragment> {
        reader.seek(SeekFrom::Start(offset))?;

        let mut data = vec![0u8; length];
        reader.read_exact(&mut data)?;

        Ok(Fragment { offset, data })
    }

    /// Write the fragment at the writer's position, zero-padded out to the
    /// next [`FRAGMENT_ALIGN`] boundary, and record where it landed.
    pub fn dump<W: Write + Seek>(&mut self, writer: &mut W) -> Result<u64> {
        self.offset = writer.stream_position()?;

        writer.write_all(&self.data)?;

        let pos = self.offset + self.data.len() as u64;
        if pos % FRAGMENT_ALIGN != 0 {
            let padding = (FRAGMENT_ALIGN - pos % FRAGMENT_ALIGN) as usize;
            writer.write_all(&vec![0u8; padding])?;
        }

        Ok(self.offset)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::{Fragment, FRAGMENT_ALIGN};

    #[test]
    fn dump_pads_to_the_block_grid() {
        let mut out = Cursor::new(Vec::new());

        let mut first = Fragment {
            offset: 0,
            data: vec![0x11; 24],
        };
        first.dump(&mut out).unwrap();

        let mut second = Fragment {
            offset: 0,
            data: vec![0x22; 8],
        };
        let offset = second.dump(&mut out).unwrap();

        assert_eq!(offset, FRAGMENT_ALIGN);
        assert_eq!(out.get_ref().len() as u64, 2 * FRAGMENT_ALIGN);
    }

    #[test]
    fn parse_reads_back_what_dump_wrote() {
        let mut out = Cursor::new(Vec::new());
        let mut fragment = Fragment {
            offset: 0,
            data: b"fragment payload".to_vec(),
        };
        fragment.dump(&mut out).unwrap();

        let read = Fragment::parse(&mut out, 0, fragment.data.len()).unwrap();
        assert_eq!(read, fragment);
    }
}
