//! Opcodes, operands and the fixed 11-byte instruction shape shared by the
//! emitter, the container format and the disassembler.

/// Named register indices into the VM's 32-slot register file.
pub mod registers {
    pub const GPR0A: u8 = 0x00;
    pub const GPR0B: u8 = 0x01;
    pub const GPR0C: u8 = 0x02;
    pub const GPR0D: u8 = 0x03;
    pub const GPR1A: u8 = 0x04;
    pub const GPR1B: u8 = 0x05;
    pub const GPR1C: u8 = 0x06;
    pub const GPR1D: u8 = 0x07;
    pub const MIA: u8 = 0x08;
    pub const MIR: u8 = 0x09;
    pub const MID0: u8 = 0x0a;
    pub const MID1: u8 = 0x0b;
    pub const SP: u8 = 0x0c;
    pub const FP: u8 = 0x0d;
    pub const PC: u8 = 0x0e;
    pub const FLAGS: u8 = 0x0f;
    pub const TMP0: u8 = 0x10;
    pub const TMP1: u8 = 0x11;
    pub const TMP2: u8 = 0x12;
    pub const TMP3: u8 = 0x13;
    /// Convention register a callee leaves its return value in. Not part of
    /// the 32-slot indexed file proper (see `EXC`), but addressed the same
    /// way by operand encoding.
    pub const FNR: u8 = 0x14;
    /// The VM's exception/fault register. Addressed out-of-band from the
    /// 32-slot file (its index does not fit a `u8` register-file slot);
    /// the VM stores it as a side field and accepts this sentinel as the
    /// operand encoding for it.
    pub const EXC: u8 = 0xff;

    pub const TMP_SLOTS: [u8; 4] = [TMP0, TMP1, TMP2, TMP3];
    pub const REGISTER_FILE_LEN: usize = 0x15;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    Push = 1,
    Pop = 2,
    Add = 3,
    Sub = 4,
    Mul = 5,
    Div = 6,
    Mov = 7,
    Ld = 8,
    St = 9,
    Jmp = 10,
    Jz = 11,
    Call = 12,
    Ret = 13,
    Halt = 14,
}

impl Opcode {
    pub fn from_u8(v: u8) -> Option<Self> {
        use Opcode::*;
        Some(match v {
            0 => Nop,
            1 => Push,
            2 => Pop,
            3 => Add,
            4 => Sub,
            5 => Mul,
            6 => Div,
            7 => Mov,
            8 => Ld,
            9 => St,
            10 => Jmp,
            11 => Jz,
            12 => Call,
            13 => Ret,
            14 => Halt,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperandType {
    Null = 0,
    Immediate = 1,
    Constant = 2,
    Reference = 3,
    Register = 4,
}

impl OperandType {
    pub fn from_u8(v: u8) -> Option<Self> {
        use OperandType::*;
        Some(match v {
            0 => Null,
            1 => Immediate,
            2 => Constant,
            3 => Reference,
            4 => Register,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub ty: OperandType,
    pub data: u32,
}

impl Operand {
    pub const NULL: Operand = Operand { ty: OperandType::Null, data: 0 };

    pub fn immediate(v: u32) -> Self {
        Self { ty: OperandType::Immediate, data: v }
    }

    pub fn constant(v: u32) -> Self {
        Self { ty: OperandType::Constant, data: v }
    }

    /// A heap offset, interpreted by the VM as `heap_base + data`.
    pub fn reference(offset: u32) -> Self {
        Self { ty: OperandType::Reference, data: offset }
    }

    pub fn register(reg: u8) -> Self {
        Self { ty: OperandType::Register, data: reg as u32 }
    }

    pub fn is_null(&self) -> bool {
        self.ty == OperandType::Null
    }
}

/// Fixed 11-byte instruction: `opcode:u8` followed by two `(type:u8,
/// data:u32 LE)` operand slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub a: Operand,
    pub b: Operand,
}

pub const INSTRUCTION_SIZE: usize = 11;

impl Instruction {
    pub fn new(opcode: Opcode, a: Operand, b: Operand) -> Self {
        Self { opcode, a, b }
    }

    pub fn encode(&self) -> [u8; INSTRUCTION_SIZE] {
        let mut buf = [0u8; INSTRUCTION_SIZE];
        buf[0] = self.opcode as u8;
        buf[1] = self.a.ty as u8;
        buf[2..6].copy_from_slice(&self.a.data.to_le_bytes());
        buf[6] = self.b.ty as u8;
        buf[7..11].copy_from_slice(&self.b.data.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; INSTRUCTION_SIZE]) -> Option<Self> {
        let opcode = Opcode::from_u8(buf[0])?;
        let a = Operand { ty: OperandType::from_u8(buf[1])?, data: u32::from_le_bytes(buf[2..6].try_into().unwrap()) };
        let b = Operand { ty: OperandType::from_u8(buf[6])?, data: u32::from_le_bytes(buf[7..11].try_into().unwrap()) };
        Some(Self { opcode, a, b })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_round_trips_through_its_byte_encoding() {
        let ins = Instruction::new(Opcode::Add, Operand::register(registers::TMP0), Operand::immediate(7));
        let bytes = ins.encode();
        assert_eq!(bytes.len(), INSTRUCTION_SIZE);
        assert_eq!(Instruction::decode(&bytes), Some(ins));
    }

    #[test]
    fn unknown_opcode_byte_fails_to_decode() {
        let mut buf = [0u8; INSTRUCTION_SIZE];
        buf[0] = 200;
        assert!(Instruction::decode(&buf).is_none());
    }
}
