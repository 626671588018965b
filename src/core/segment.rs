//! Span descriptions anchored at an `AddressPointer`.
//!
//! A `ByteSegment` is a fixed-size span; an `ArraySegment<T>` is a span of
//! wire-format elements whose length may only be discovered by reading up to
//! a terminator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use crate::core::address::AddressPointer;

/// A type with a fixed little-endian wire size.
pub trait WireElement {
    /// Size of one element in bytes.
    const SIZE: u32;
}

impl WireElement for u8 {
    const SIZE: u32 = 1;
}

impl WireElement for u16 {
    const SIZE: u32 = 2;
}

impl WireElement for u32 {
    const SIZE: u32 = 4;
}

/// A fixed-size span of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteSegment {
    pub pointer: AddressPointer,
    pub size: u32,
}

impl ByteSegment {
    pub fn new(pointer: AddressPointer, size: u32) -> Self {
        Self { pointer, size }
    }

    /// Exclusive end address, saturating at `u32::MAX`.
    pub fn end(&self) -> u32 {
        self.pointer.address.saturating_add(self.size)
    }

    /// Check whether `p` falls inside this span (same space, half-open range).
    pub fn contains(&self, p: AddressPointer) -> bool {
        p.space == self.pointer.space
            && self.pointer.address <= p.address
            && (p.address as u64) < self.pointer.address as u64 + self.size as u64
    }
}

impl fmt::Display for ByteSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [0x{:X}, 0x{:X}]",
            self.pointer.space,
            self.pointer.address,
            self.pointer.address as u64 + self.size as u64
        )
    }
}

/// A span of `T` elements, optionally of known byte length.
#[derive(Debug)]
pub struct ArraySegment<T> {
    pub pointer: AddressPointer,
    pub byte_length: Option<u32>,
    _element: PhantomData<T>,
}

// Manual impls: derives would require `T: Clone`/`T: Copy`/`T: PartialEq`.
impl<T> Clone for ArraySegment<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArraySegment<T> {}

impl<T> PartialEq for ArraySegment<T> {
    fn eq(&self, other: &Self) -> bool {
        self.pointer == other.pointer && self.byte_length == other.byte_length
    }
}

impl<T> Eq for ArraySegment<T> {}

impl<T: WireElement> ArraySegment<T> {
    /// An array whose length must be discovered by a terminator.
    pub fn unbounded(pointer: AddressPointer) -> Self {
        Self {
            pointer,
            byte_length: None,
            _element: PhantomData,
        }
    }

    /// An array with a known byte length.
    pub fn with_byte_length(pointer: AddressPointer, byte_length: u32) -> Self {
        Self {
            pointer,
            byte_length: Some(byte_length),
            _element: PhantomData,
        }
    }

    /// An array of `count` elements.
    pub fn with_count(pointer: AddressPointer, count: u32) -> Option<Self> {
        count
            .checked_mul(T::SIZE)
            .map(|len| Self::with_byte_length(pointer, len))
    }

    pub fn element_size(&self) -> u32 {
        T::SIZE
    }

    /// Number of whole elements, or `None` when unbounded.
    pub fn element_count(&self) -> Option<u32> {
        self.byte_length.map(|len| len / T::SIZE)
    }

    /// Pointer to the element at `index`, or `None` on overflow or when the
    /// index is past a known length.
    pub fn element(&self, index: u32) -> Option<AddressPointer> {
        if let Some(count) = self.element_count() {
            if index >= count {
                return None;
            }
        }
        index
            .checked_mul(T::SIZE)
            .and_then(|offset| self.pointer.checked_add(offset))
    }

    /// The byte span covered, when the length is known.
    pub fn as_byte_segment(&self) -> Option<ByteSegment> {
        self.byte_length
            .map(|size| ByteSegment::new(self.pointer, size))
    }
}
