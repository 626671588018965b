//! Core data types.
//!
//! `AddressPointer` is the key for every location in an image; segments
//! describe spans anchored at one.

pub mod address;
pub mod segment;
