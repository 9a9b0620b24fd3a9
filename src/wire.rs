//! Bounds-checked reader for offset-table encoded buffers
//!
//! Buffers follow the flatbuffer layout: a table starts with an `i32` pointing
//! back to its vtable, the vtable lists a `u16` offset per field slot, and
//! strings and vectors hang off `u32` offsets relative to the field that
//! references them. Every read goes through [`slice`], so a corrupt offset
//! becomes [`DecodeError::OutOfBounds`] instead of a panic.

use crate::decoder::{DecodeError, DecodeResult};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::marker::PhantomData;

pub const UOFFSET_SIZE: usize = 4;
pub const SOFFSET_SIZE: usize = 4;
pub const VOFFSET_SIZE: usize = 2;

/// vtable header: vtable length + table length
pub const VTABLE_HEADER_SIZE: usize = 2 * VOFFSET_SIZE;

/// A fixed-size value stored inline: scalars, or structs inside vectors.
///
/// `read` is always handed exactly `SIZE` bytes.
pub trait Inline: Copy {
    const SIZE: usize;

    fn read(bytes: &[u8]) -> Self;
}

impl Inline for u16 {
    const SIZE: usize = 2;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_u16(bytes)
    }
}

impl Inline for u32 {
    const SIZE: usize = 4;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_u32(bytes)
    }
}

impl Inline for i32 {
    const SIZE: usize = 4;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_i32(bytes)
    }
}

impl Inline for f32 {
    const SIZE: usize = 4;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_f32(bytes)
    }
}

/// Borrow `len` bytes at `offset`, or fail if any of them lie past the end.
pub fn slice(buf: &[u8], offset: usize, len: usize) -> DecodeResult<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or(DecodeError::OutOfBounds { offset, len })
}

/// Read an inline value at `offset`.
pub fn read<T: Inline>(buf: &[u8], offset: usize) -> DecodeResult<T> {
    slice(buf, offset, T::SIZE).map(T::read)
}

/// Verified handle on one table inside a buffer.
///
/// Construction checks that the vtable and the table body are in bounds;
/// field reads check their own targets.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    buf: &'a [u8],
    loc: usize,
    vtable: usize,
    vtable_len: usize,
}

impl<'a> Table<'a> {
    pub fn at(buf: &'a [u8], loc: usize) -> DecodeResult<Self> {
        let soffset: i32 = read(buf, loc)?;
        let vtable = i64::try_from(loc)
            .ok()
            .map(|loc| loc - i64::from(soffset))
            .and_then(|v| usize::try_from(v).ok())
            .ok_or(DecodeError::OutOfBounds {
                offset: loc,
                len: SOFFSET_SIZE,
            })?;

        let vtable_len = usize::from(read::<u16>(buf, vtable)?);
        let table_len = usize::from(read::<u16>(buf, vtable + VOFFSET_SIZE)?);

        if vtable_len < VTABLE_HEADER_SIZE || table_len < SOFFSET_SIZE {
            return Err(DecodeError::OutOfBounds {
                offset: vtable,
                len: VTABLE_HEADER_SIZE,
            });
        }
        slice(buf, vtable, vtable_len)?;
        slice(buf, loc, table_len)?;

        Ok(Table {
            buf,
            loc,
            vtable,
            vtable_len,
        })
    }

    /// Absolute position of a field, `None` when the slot is absent.
    fn field_pos(&self, slot: u16) -> DecodeResult<Option<usize>> {
        let entry = VTABLE_HEADER_SIZE + usize::from(slot) * VOFFSET_SIZE;
        if entry + VOFFSET_SIZE > self.vtable_len {
            // written by an older schema
            return Ok(None);
        }
        match read::<u16>(self.buf, self.vtable + entry)? {
            0 => Ok(None),
            voffset => Ok(Some(self.loc + usize::from(voffset))),
        }
    }

    pub fn scalar<T: Inline>(&self, slot: u16, default: T) -> DecodeResult<T> {
        match self.field_pos(slot)? {
            Some(pos) => read(self.buf, pos),
            None => Ok(default),
        }
    }

    /// Follow a `u32` offset field to the object it references.
    fn indirect(&self, slot: u16) -> DecodeResult<Option<usize>> {
        let Some(pos) = self.field_pos(slot)? else {
            return Ok(None);
        };
        let uoffset: u32 = read(self.buf, pos)?;
        let target = pos
            .checked_add(uoffset as usize)
            .filter(|&t| t < self.buf.len())
            .ok_or(DecodeError::OutOfBounds {
                offset: pos,
                len: UOFFSET_SIZE,
            })?;
        Ok(Some(target))
    }

    pub fn string(&self, slot: u16) -> DecodeResult<Option<&'a str>> {
        let Some(target) = self.indirect(slot)? else {
            return Ok(None);
        };
        let len: u32 = read(self.buf, target)?;
        let start = target + UOFFSET_SIZE;
        let bytes = slice(self.buf, start, len as usize)?;
        std::str::from_utf8(bytes)
            .map(Some)
            .map_err(|_| DecodeError::InvalidUtf8 { offset: start })
    }

    pub fn vector<T: Inline>(&self, slot: u16) -> DecodeResult<Option<Vector<'a, T>>> {
        let Some(target) = self.indirect(slot)? else {
            return Ok(None);
        };
        let len = read::<u32>(self.buf, target)? as usize;
        let start = target + UOFFSET_SIZE;
        let byte_len = len.checked_mul(T::SIZE).ok_or(DecodeError::OutOfBounds {
            offset: start,
            len: usize::MAX,
        })?;
        let bytes = slice(self.buf, start, byte_len)?;
        Ok(Some(Vector::new(bytes, len)))
    }
}

/// Zero-copy view over a vector of inline elements.
pub struct Vector<'a, T> {
    bytes: &'a [u8],
    len: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Inline> Vector<'a, T> {
    fn new(bytes: &'a [u8], len: usize) -> Self {
        debug_assert_eq!(bytes.len(), len * T::SIZE);
        Vector {
            bytes,
            len,
            _marker: PhantomData,
        }
    }

    pub fn empty() -> Self {
        Vector::new(&[], 0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let start = index * T::SIZE;
        self.bytes.get(start..start + T::SIZE).map(T::read)
    }

    pub fn first(&self) -> Option<T> {
        self.get(0)
    }

    pub fn iter(&self) -> VectorIter<'a, T> {
        VectorIter {
            chunks: self.bytes.chunks_exact(T::SIZE),
            _marker: PhantomData,
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

impl<T> Clone for Vector<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Vector<'_, T> {}

impl<T: Inline + PartialEq> PartialEq for Vector<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Inline + fmt::Debug> fmt::Debug for Vector<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T: Inline> IntoIterator for Vector<'a, T> {
    type Item = T;
    type IntoIter = VectorIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct VectorIter<'a, T> {
    chunks: std::slice::ChunksExact<'a, u8>,
    _marker: PhantomData<T>,
}

impl<T: Inline> Iterator for VectorIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.chunks.next().map(T::read)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T: Inline> ExactSizeIterator for VectorIter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    // table at 8 with one i32 field (slot 0) = 7, vtable at 0
    fn single_field_table() -> Vec<u8> {
        let mut buf = vec![0u8; 16];
        LittleEndian::write_u16(&mut buf[0..2], 6); // vtable len
        LittleEndian::write_u16(&mut buf[2..4], 8); // table len
        LittleEndian::write_u16(&mut buf[4..6], 4); // slot 0 at +4
        LittleEndian::write_i32(&mut buf[8..12], 8); // soffset -> vtable at 0
        LittleEndian::write_i32(&mut buf[12..16], 7);
        buf
    }

    #[test]
    fn test_slice_bounds() {
        let buf = [1u8, 2, 3, 4];
        assert_eq!(slice(&buf, 1, 3).unwrap(), &[2, 3, 4]);
        assert_eq!(
            slice(&buf, 2, 3),
            Err(DecodeError::OutOfBounds { offset: 2, len: 3 })
        );
        assert!(slice(&buf, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_scalar_and_default() {
        let buf = single_field_table();
        let table = Table::at(&buf, 8).unwrap();
        assert_eq!(table.scalar::<i32>(0, -1).unwrap(), 7);
        // slot 1 is beyond the vtable
        assert_eq!(table.scalar::<f32>(1, 2.5).unwrap(), 2.5);
    }

    #[test]
    fn test_vtable_outside_buffer() {
        let mut buf = single_field_table();
        LittleEndian::write_i32(&mut buf[8..12], 100);
        assert!(matches!(
            Table::at(&buf, 8),
            Err(DecodeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_table_body_past_end() {
        let mut buf = single_field_table();
        LittleEndian::write_u16(&mut buf[2..4], 64);
        assert!(matches!(
            Table::at(&buf, 8),
            Err(DecodeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_empty_vector() {
        let v: Vector<'_, u32> = Vector::empty();
        assert!(v.is_empty());
        assert_eq!(v.get(0), None);
        assert_eq!(v.iter().count(), 0);
    }
}
