//! Bounds-checked access to a borrowed image buffer.

use crate::{DumpError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Cursor;

/// Byte order of the fields in an image, as detected from its magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Endian {
    Little,
    Big,
}

/// A read-only view over the bytes of one image.
///
/// Every access goes through [`ImageView::bytes_at`], which refuses to read
/// past the end of the view instead of trusting offsets stored in the image.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> ImageView<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, endian }
    }

    /// Returns `len` bytes starting at `offset`, or `MalformedRecord` if any
    /// of them lie outside the view.
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| DumpError::malformed(offset, "offset overflows"))?;
        self.data.get(offset..end).ok_or_else(|| {
            DumpError::malformed(
                offset,
                format!(
                    "{len} bytes exceed image of {} bytes",
                    self.data.len()
                ),
            )
        })
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let bytes = self.bytes_at(offset, 4)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        })
    }

    /// Opens a field reader over `[offset, offset + len)`.
    pub fn fields(&self, offset: usize, len: usize) -> Result<Fields<'a>> {
        let bytes = self.bytes_at(offset, len)?;
        Ok(Fields {
            cursor: Cursor::new(bytes),
            endian: self.endian,
            base: offset,
        })
    }

    /// Returns the NUL-terminated string starting at `offset`, which must end
    /// before `limit`. The terminator is not included.
    pub fn cstr_at(&self, offset: usize, limit: usize) -> Result<&'a [u8]> {
        let limit = limit.min(self.data.len());
        if offset >= limit {
            return Err(DumpError::malformed(offset, "string starts outside its table"));
        }
        let region = &self.data[offset..limit];
        let end = region
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| DumpError::malformed(offset, "string is not NUL-terminated"))?;
        Ok(&region[..end])
    }
}

/// Sequential reader over one fixed-size structure inside an image.
pub struct Fields<'a> {
    cursor: Cursor<&'a [u8]>,
    endian: Endian,
    base: usize,
}

impl<'a> Fields<'a> {
    fn offset(&self) -> usize {
        self.base + self.cursor.position() as usize
    }

    pub fn u8(&mut self) -> Result<u8> {
        let at = self.offset();
        self.cursor.read_u8().map_err(|_| truncated(at, 1))
    }

    pub fn u16(&mut self) -> Result<u16> {
        let at = self.offset();
        match self.endian {
            Endian::Little => self.cursor.read_u16::<LittleEndian>(),
            Endian::Big => self.cursor.read_u16::<BigEndian>(),
        }
        .map_err(|_| truncated(at, 2))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let at = self.offset();
        match self.endian {
            Endian::Little => self.cursor.read_u32::<LittleEndian>(),
            Endian::Big => self.cursor.read_u32::<BigEndian>(),
        }
        .map_err(|_| truncated(at, 4))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let at = self.offset();
        match self.endian {
            Endian::Little => self.cursor.read_u64::<LittleEndian>(),
            Endian::Big => self.cursor.read_u64::<BigEndian>(),
        }
        .map_err(|_| truncated(at, 8))
    }

    /// Reads a fixed 16-byte name field.
    pub fn name16(&mut self) -> Result<[u8; 16]> {
        let at = self.offset();
        let mut name = [0u8; 16];
        std::io::Read::read_exact(&mut self.cursor, &mut name).map_err(|_| truncated(at, 16))?;
        Ok(name)
    }
}

fn truncated(offset: usize, width: usize) -> DumpError {
    DumpError::malformed(offset, format!("truncated {width}-byte field"))
}

/// Decodes a fixed-size name field up to its first NUL.
pub fn fixed_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).to_string()
}
