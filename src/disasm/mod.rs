//! Instruction decoding.
//!
//! The listing driver only sees the `InstructionDecoder` trait: one decoded
//! instruction per call, with its length, Intel-syntax text and any branch
//! or absolute memory target. `IcedDecoder` is the x86 backend.

use std::fmt;

pub mod iced;

pub use self::iced::IcedDecoder;

/// Errors that can occur while decoding one instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Bytes do not form a valid instruction
    InvalidInstruction { address: u32 },
    /// No bytes left to decode at this address
    InsufficientBytes { address: u32 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidInstruction { address } => {
                write!(f, "undecodable byte sequence at 0x{:X}", address)
            }
            DecodeError::InsufficientBytes { address } => {
                write!(f, "no bytes to decode at 0x{:X}", address)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Result type for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// One decoded instruction, reduced to what the listing needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Encoded length in bytes
    pub length: usize,
    /// Formatted instruction, e.g. `push ebp`
    pub text: String,
    /// Opcode variant name, e.g. `Call_rel32_32`
    pub code: String,
    /// Target RVA of a relative jump or call
    pub near_branch_target: Option<u32>,
    pub is_call: bool,
    /// Absolute address of a `[disp32]` memory operand
    pub memory_target: Option<u32>,
}

/// Decodes a single instruction at an address.
pub trait InstructionDecoder {
    /// Decode the first instruction in `bytes`, which start at `address`.
    fn decode(&self, address: u32, bytes: &[u8]) -> DecodeResult<DecodedInstruction>;

    /// Longest encoding; callers pass at most this many bytes to `decode`.
    fn max_instruction_length(&self) -> usize;

    /// Backend name, for logs
    fn name(&self) -> &str;
}
