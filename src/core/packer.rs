//! Little-endian binary packer for timeline files.
//!
//! # Primitives
//! ```text
//! byte     u8
//! bool     1 byte, 0 or 1
//! int      i32 LE
//! float    f32 LE
//! bytes    int length prefix + raw bytes
//! string   bytes holding UTF-16LE code units
//! ```

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{self, Cursor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("unexpected end of data at offset {offset}: needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },
    #[error("negative length {0}")]
    NegativeLength(i32),
    #[error("string is not valid UTF-16")]
    InvalidUtf16,
    #[error("unknown node type tag {0}")]
    UnknownNodeType(u8),
    #[error("unknown variable type tag {0}")]
    UnknownValueType(u8),
    #[error("unknown comparison tag {0}")]
    UnknownComparison(u8),
    #[error("unknown operator tag {0}")]
    UnknownOperator(u8),
    #[error("{0} trailing bytes after end of data")]
    TrailingBytes(usize),
    #[error("read error: {0}")]
    Io(#[from] io::Error),
}

/// Types with a binary representation.
pub trait Packable: Sized {
    fn pack(&self, packer: &mut BinaryPacker);
    fn unpack(unpacker: &mut BinaryUnpacker<'_>) -> Result<Self, PackError>;
}

/// Append-only output buffer.
#[derive(Debug, Default)]
pub struct BinaryPacker {
    buffer: Vec<u8>,
}

impl BinaryPacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Encode a fixed-size primitive into `N` fresh bytes at the end.
    fn put<const N: usize>(&mut self, encode: impl FnOnce(&mut [u8])) {
        let mut bytes = [0u8; N];
        encode(&mut bytes);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn pack_u8(&mut self, b: u8) {
        self.buffer.push(b);
    }

    pub fn pack_bool(&mut self, b: bool) {
        self.buffer.push(u8::from(b));
    }

    pub fn pack_i32(&mut self, i: i32) {
        self.put::<4>(|bytes| LittleEndian::write_i32(bytes, i));
    }

    pub fn pack_f32(&mut self, f: f32) {
        self.put::<4>(|bytes| LittleEndian::write_f32(bytes, f));
    }

    /// Collection lengths share the `int` encoding.
    pub fn pack_len(&mut self, len: usize) {
        self.pack_i32(len as i32);
    }

    pub fn pack_bytes(&mut self, bytes: &[u8]) {
        self.pack_len(bytes.len());
        self.buffer.extend_from_slice(bytes);
    }

    pub fn pack_str(&mut self, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        let mut encoded = vec![0u8; units.len() * 2];
        LittleEndian::write_u16_into(&units, &mut encoded);
        self.pack_bytes(&encoded);
    }

    pub fn pack<T: Packable>(&mut self, value: &T) {
        value.pack(self);
    }

    /// Length-prefixed sequence.
    pub fn pack_all<'a, T, I>(&mut self, items: I)
    where
        T: Packable + 'a,
        I: ExactSizeIterator<Item = &'a T>,
    {
        self.pack_len(items.len());
        for item in items {
            item.pack(self);
        }
    }
}

/// Reader over packed bytes.
#[derive(Debug)]
pub struct BinaryUnpacker<'a> {
    reader: Cursor<&'a [u8]>,
}

impl<'a> BinaryUnpacker<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            reader: Cursor::new(buffer),
        }
    }

    pub fn offset(&self) -> usize {
        self.reader.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.reader.get_ref().len().saturating_sub(self.offset())
    }

    /// Fail if any bytes are left unread.
    pub fn finish(self) -> Result<(), PackError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(PackError::TrailingBytes(n)),
        }
    }

    fn eof(&self, size: usize) -> PackError {
        PackError::UnexpectedEof {
            offset: self.offset(),
            needed: size.saturating_sub(self.remaining()),
        }
    }

    /// Read one `size`-byte primitive, reporting a short read as EOF.
    fn read<T>(
        &mut self,
        size: usize,
        read: impl FnOnce(&mut Cursor<&'a [u8]>) -> io::Result<T>,
    ) -> Result<T, PackError> {
        if self.remaining() < size {
            return Err(self.eof(size));
        }
        read(&mut self.reader).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => self.eof(size),
            _ => PackError::Io(e),
        })
    }

    pub fn unpack_u8(&mut self) -> Result<u8, PackError> {
        self.read(1, |r| r.read_u8())
    }

    /// Any non-zero byte reads as `true`.
    pub fn unpack_bool(&mut self) -> Result<bool, PackError> {
        Ok(self.unpack_u8()? != 0)
    }

    pub fn unpack_i32(&mut self) -> Result<i32, PackError> {
        self.read(4, |r| r.read_i32::<LittleEndian>())
    }

    pub fn unpack_f32(&mut self) -> Result<f32, PackError> {
        self.read(4, |r| r.read_f32::<LittleEndian>())
    }

    pub fn unpack_len(&mut self) -> Result<usize, PackError> {
        let len = self.unpack_i32()?;
        usize::try_from(len).map_err(|_| PackError::NegativeLength(len))
    }

    /// Borrow the next length-prefixed byte run without copying.
    pub fn unpack_bytes(&mut self) -> Result<&'a [u8], PackError> {
        let len = self.unpack_len()?;
        if self.remaining() < len {
            return Err(self.eof(len));
        }
        let start = self.offset();
        let buffer: &'a [u8] = *self.reader.get_ref();
        self.reader.set_position((start + len) as u64);
        Ok(&buffer[start..start + len])
    }

    pub fn unpack_string(&mut self) -> Result<String, PackError> {
        let bytes = self.unpack_bytes()?;
        if bytes.len() % 2 != 0 {
            return Err(PackError::InvalidUtf16);
        }
        let mut units = vec![0u16; bytes.len() / 2];
        LittleEndian::read_u16_into(bytes, &mut units);
        String::from_utf16(&units).map_err(|_| PackError::InvalidUtf16)
    }

    pub fn unpack<T: Packable>(&mut self) -> Result<T, PackError> {
        T::unpack(self)
    }

    /// Length-prefixed sequence.
    pub fn unpack_all<T: Packable>(&mut self) -> Result<Vec<T>, PackError> {
        let len = self.unpack_len()?;
        // Cap the preallocation: a corrupt length must fail on read, not on alloc.
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(T::unpack(self)?);
        }
        Ok(items)
    }
}
