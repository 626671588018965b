//! Utility functions for PE parsing

use crate::core::address::AddressPointer;
use crate::formats::pe::types::{PeError, Result};

/// Extension trait for reading primitive types from byte slices
pub trait ReadExt {
    fn read_u8_at(&self, offset: usize) -> Option<u8>;
    fn read_u16_le_at(&self, offset: usize) -> Option<u16>;
    fn read_u32_le_at(&self, offset: usize) -> Option<u32>;
    fn read_u64_le_at(&self, offset: usize) -> Option<u64>;
    fn read_slice_at(&self, offset: usize, len: usize) -> Option<&[u8]>;
    fn read_array_at<const N: usize>(&self, offset: usize) -> Option<[u8; N]>;
}

impl ReadExt for [u8] {
    #[inline(always)]
    fn read_u8_at(&self, offset: usize) -> Option<u8> {
        self.get(offset).copied()
    }

    #[inline(always)]
    fn read_u16_le_at(&self, offset: usize) -> Option<u16> {
        self.read_array_at(offset).map(u16::from_le_bytes)
    }

    #[inline(always)]
    fn read_u32_le_at(&self, offset: usize) -> Option<u32> {
        self.read_array_at(offset).map(u32::from_le_bytes)
    }

    #[inline(always)]
    fn read_u64_le_at(&self, offset: usize) -> Option<u64> {
        self.read_array_at(offset).map(u64::from_le_bytes)
    }

    #[inline(always)]
    fn read_slice_at(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.get(offset..end)
    }

    #[inline(always)]
    fn read_array_at<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        self.read_slice_at(offset, N)
            .and_then(|b| b.try_into().ok())
    }
}

/// Sequential little-endian reader over a fixed-layout record.
///
/// Callers size-check the record up front, so every field read after that
/// is infallible in practice; a short read still surfaces as `None`.
pub struct FieldCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn u8(&mut self) -> Option<u8> {
        let v = self.data.read_u8_at(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    pub fn u16(&mut self) -> Option<u16> {
        let v = self.data.read_u16_le_at(self.pos)?;
        self.pos += 2;
        Some(v)
    }

    pub fn u32(&mut self) -> Option<u32> {
        let v = self.data.read_u32_le_at(self.pos)?;
        self.pos += 4;
        Some(v)
    }

    pub fn u64(&mut self) -> Option<u64> {
        let v = self.data.read_u64_le_at(self.pos)?;
        self.pos += 8;
        Some(v)
    }

    pub fn bytes<const N: usize>(&mut self) -> Option<[u8; N]> {
        let v = self.data.read_array_at::<N>(self.pos)?;
        self.pos += N;
        Some(v)
    }
}

/// Read a NUL-terminated ASCII string of at most `max_len` bytes.
///
/// A string that runs to the end of `data` or past `max_len` without a NUL
/// is rejected rather than truncated.
pub fn read_cstring(data: &[u8], pointer: AddressPointer, max_len: usize) -> Result<String> {
    let end = max_len.min(data.len());
    let len = data[..end]
        .iter()
        .position(|&b| b == 0)
        .ok_or(PeError::InvalidString { pointer })?;
    Ok(String::from_utf8_lossy(&data[..len]).into_owned())
}

/// Format bytes as space-separated uppercase hex pairs.
pub fn hex_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, b) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", b));
    }
    out
}

/// Number of uppercase hex digits needed to print `value`.
pub fn hex_width(value: u32) -> usize {
    format!("{:X}", value).len()
}
