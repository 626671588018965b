use iced_x86::{
    Decoder, DecoderOptions, FlowControl, Formatter, Instruction, IntelFormatter, OpKind, Register,
};

use crate::disasm::{DecodeError, DecodeResult, DecodedInstruction, InstructionDecoder};

/// 32-bit x86 decoder with Intel-syntax output
pub struct IcedDecoder {
    bits: u32,
}

impl IcedDecoder {
    pub fn new() -> Self {
        Self { bits: 32 }
    }

    fn near_branch_target(instr: &Instruction) -> Option<u32> {
        (0..instr.op_count())
            .any(|i| {
                matches!(
                    instr.op_kind(i),
                    OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64
                )
            })
            .then(|| instr.near_branch_target() as u32)
    }

    /// `[disp32]` with no base or index register
    fn memory_target(instr: &Instruction) -> Option<u32> {
        let has_memory = (0..instr.op_count()).any(|i| instr.op_kind(i) == OpKind::Memory);
        if has_memory
            && instr.memory_base() == Register::None
            && instr.memory_index() == Register::None
        {
            Some(instr.memory_displacement32())
        } else {
            None
        }
    }
}

impl Default for IcedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionDecoder for IcedDecoder {
    fn decode(&self, address: u32, bytes: &[u8]) -> DecodeResult<DecodedInstruction> {
        if bytes.is_empty() {
            return Err(DecodeError::InsufficientBytes { address });
        }

        let mut decoder = Decoder::new(self.bits, bytes, DecoderOptions::NONE);
        decoder.set_ip(address as u64);

        let instr = decoder.decode();
        if instr.is_invalid() {
            return Err(DecodeError::InvalidInstruction { address });
        }

        let mut formatter = IntelFormatter::new();
        let mut text = String::new();
        formatter.format(&instr, &mut text);

        Ok(DecodedInstruction {
            length: instr.len(),
            text,
            code: format!("{:?}", instr.code()),
            near_branch_target: Self::near_branch_target(&instr),
            is_call: instr.flow_control() == FlowControl::Call,
            memory_target: Self::memory_target(&instr),
        })
    }

    fn max_instruction_length(&self) -> usize {
        15
    }

    fn name(&self) -> &str {
        "iced-x86"
    }
}
