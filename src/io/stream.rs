//! Little-endian byte streams over in-memory buffers.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::format::pad4;
use crate::util::{Error, Result};

/// Growable output buffer with padding helpers.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current write position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn write_u32(&mut self, value: u32) {
        // Writing into a Vec cannot fail.
        let _ = self.buf.write_u32::<LittleEndian>(value);
    }

    /// Pad with `fill` up to the next 4-byte boundary.
    pub fn align4(&mut self, fill: u8) {
        let target = pad4(self.buf.len());
        self.buf.resize(target, fill);
    }

    /// Pad with `fill` up to `pos`; no-op when already past it.
    pub fn pad_to(&mut self, pos: usize, fill: u8) {
        if pos > self.buf.len() {
            self.buf.resize(pos, fill);
        }
    }

    /// Mutable access for component writers.
    #[inline]
    pub fn inner_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over a byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Take the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(Error::UnexpectedEof(self.data.len() as u64))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// Skip to the next 4-byte boundary, clamped to the end of data.
    pub fn align4(&mut self) {
        self.pos = pad4(self.pos).min(self.data.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_alignment() {
        let mut w = ByteWriter::new();
        w.write_bytes(b"{}");
        w.align4(b' ');
        assert_eq!(w.into_inner(), b"{}  ");
    }

    #[test]
    fn test_reader_eof() {
        let mut r = ByteReader::new(&[1, 0, 0, 0, 2]);
        assert_eq!(r.read_u32().unwrap(), 1);
        assert!(matches!(r.read_u32(), Err(Error::UnexpectedEof(5))));
        assert_eq!(r.remaining(), 1);
    }
}
