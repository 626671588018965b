//! Address types for PE image analysis.
//!
//! This module provides the `AddressPointer` and `AddressSpace` types that
//! serve as the foundation for all location references: every header field,
//! import record and listing entry is keyed by one of these.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// The address space a pointer value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum AddressSpace {
    /// Relative virtual address (offset from the image base once loaded)
    Virtual,
    /// Offset within the file on disk
    Raw,
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpace::Virtual => write!(f, "Virtual"),
            AddressSpace::Raw => write!(f, "Raw"),
        }
    }
}

/// A 32-bit address tagged with the space it lives in.
///
/// Equality and hashing cover both fields, so `Virtual(0x1000)` and
/// `Raw(0x1000)` are distinct keys in any map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressPointer {
    /// The numeric value of the address
    pub address: u32,
    /// The space the value is expressed in
    pub space: AddressSpace,
}

impl AddressPointer {
    /// Create a pointer in the given space.
    pub const fn new(address: u32, space: AddressSpace) -> Self {
        Self { address, space }
    }

    /// Create a virtual (RVA) pointer.
    pub const fn virtual_address(address: u32) -> Self {
        Self::new(address, AddressSpace::Virtual)
    }

    /// Create a raw (file offset) pointer.
    pub const fn raw(address: u32) -> Self {
        Self::new(address, AddressSpace::Raw)
    }

    pub fn is_virtual(&self) -> bool {
        self.space == AddressSpace::Virtual
    }

    pub fn is_raw(&self) -> bool {
        self.space == AddressSpace::Raw
    }

    /// Add an offset, returning `None` on overflow.
    pub fn checked_add(self, offset: u32) -> Option<Self> {
        self.address
            .checked_add(offset)
            .map(|address| Self::new(address, self.space))
    }

    /// Subtract an offset, returning `None` on underflow.
    pub fn checked_sub(self, offset: u32) -> Option<Self> {
        self.address
            .checked_sub(offset)
            .map(|address| Self::new(address, self.space))
    }
}

impl Add<u32> for AddressPointer {
    type Output = AddressPointer;

    fn add(self, offset: u32) -> Self::Output {
        Self::new(self.address.wrapping_add(offset), self.space)
    }
}

impl Sub<u32> for AddressPointer {
    type Output = AddressPointer;

    fn sub(self, offset: u32) -> Self::Output {
        Self::new(self.address.wrapping_sub(offset), self.space)
    }
}

impl fmt::Display for AddressPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0x{:X}", self.space, self.address)
    }
}

impl Ord for AddressPointer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Primary: compare by value
        match self.address.cmp(&other.address) {
            std::cmp::Ordering::Equal => {}
            ord => return ord,
        }

        // Secondary: compare by space (arbitrary but consistent ordering)
        self.space.cmp(&other.space)
    }
}

impl PartialOrd for AddressPointer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
