use crate::u4;

/// CHIP-8 instruction opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// 0nnn: machine code routine call, ignored by modern interpreters
    Sys { nnn: u16 },
    ClearDisplay,
    Return,

    Jump { nnn: u16 },
    JumpWithOffset { nnn: u16 },
    Call { nnn: u16 },

    SkipRegEqualImm { x: u4, kk: u8 },
    SkipRegNotEqualImm { x: u4, kk: u8 },
    SkipRegEqualReg { x: u4, y: u4 },
    SkipRegNotEqualReg { x: u4, y: u4 },

    SetRegImm { x: u4, kk: u8 },
    AddRegImm { x: u4, kk: u8 },
    SetIndexImm { nnn: u16 },
    AddIndexReg { x: u4 },

    Alu { x: u4, y: u4, op: AluOp },
    Random { x: u4, kk: u8 },

    Draw { x: u4, y: u4, n: u4 },

    SkipIfPressed { x: u4 },
    SkipIfNotPressed { x: u4 },
    WaitForKey { x: u4 },

    ReadDelayTimer { x: u4 },
    SetDelayTimer { x: u4 },
    SetSoundTimer { x: u4 },

    FontChar { x: u4 },
    Bcd { x: u4 },

    StoreRegs { x: u4 },
    LoadRegs { x: u4 },

    Unknown(u16),
}

/// Register-register operations of the 8xyN family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Set,
    Or,
    And,
    Xor,
    Add,
    Sub,
    ShiftRight,
    SubReverse,
    ShiftLeft,
}

/// Operand fields of a raw instruction word
#[derive(Clone, Copy)]
struct Fields {
    x: u4,
    y: u4,
    n: u4,
    kk: u8,
    nnn: u16,
}

impl Fields {
    fn of(opcode: u16) -> Self {
        Self {
            x: u4::from_low_bits((opcode >> 8) as u8),
            y: u4::from_low_bits((opcode >> 4) as u8),
            n: u4::from_low_bits(opcode as u8),
            kk: (opcode & 0x00FF) as u8,
            nnn: opcode & 0x0FFF,
        }
    }
}

impl Opcode {
    /// Decode a 16-bit raw opcode into an Opcode enum variant.
    ///
    /// The top nibble selects the instruction family. Families 0, 8, E and F
    /// are overloaded and go through a second lookup on the low bits.
    pub fn decode(opcode: u16) -> Self {
        let f = Fields::of(opcode);

        match opcode >> 12 {
            0x0 => Self::decode_system(opcode, f),
            0x1 => Opcode::Jump { nnn: f.nnn },
            0x2 => Opcode::Call { nnn: f.nnn },
            0x3 => Opcode::SkipRegEqualImm { x: f.x, kk: f.kk },
            0x4 => Opcode::SkipRegNotEqualImm { x: f.x, kk: f.kk },
            0x5 if f.n.get() == 0 => Opcode::SkipRegEqualReg { x: f.x, y: f.y },
            0x6 => Opcode::SetRegImm { x: f.x, kk: f.kk },
            0x7 => Opcode::AddRegImm { x: f.x, kk: f.kk },
            0x8 => Self::decode_alu(opcode, f),
            0x9 if f.n.get() == 0 => Opcode::SkipRegNotEqualReg { x: f.x, y: f.y },
            0xA => Opcode::SetIndexImm { nnn: f.nnn },
            0xB => Opcode::JumpWithOffset { nnn: f.nnn },
            0xC => Opcode::Random { x: f.x, kk: f.kk },
            0xD => Opcode::Draw {
                x: f.x,
                y: f.y,
                n: f.n,
            },
            0xE => Self::decode_key(opcode, f),
            0xF => Self::decode_misc(opcode, f),
            _ => Opcode::Unknown(opcode),
        }
    }

    fn decode_system(opcode: u16, f: Fields) -> Self {
        match opcode {
            0x00E0 => Opcode::ClearDisplay,
            0x00EE => Opcode::Return,
            _ => Opcode::Sys { nnn: f.nnn },
        }
    }

    fn decode_alu(opcode: u16, f: Fields) -> Self {
        let op = match f.n.get() {
            0x0 => AluOp::Set,
            0x1 => AluOp::Or,
            0x2 => AluOp::And,
            0x3 => AluOp::Xor,
            0x4 => AluOp::Add,
            0x5 => AluOp::Sub,
            0x6 => AluOp::ShiftRight,
            0x7 => AluOp::SubReverse,
            0xE => AluOp::ShiftLeft,
            _ => return Opcode::Unknown(opcode),
        };

        Opcode::Alu { x: f.x, y: f.y, op }
    }

    fn decode_key(opcode: u16, f: Fields) -> Self {
        match f.kk {
            0x9E => Opcode::SkipIfPressed { x: f.x },
            0xA1 => Opcode::SkipIfNotPressed { x: f.x },
            _ => Opcode::Unknown(opcode),
        }
    }

    fn decode_misc(opcode: u16, f: Fields) -> Self {
        let x = f.x;
        match f.kk {
            0x07 => Opcode::ReadDelayTimer { x },
            0x0A => Opcode::WaitForKey { x },
            0x15 => Opcode::SetDelayTimer { x },
            0x18 => Opcode::SetSoundTimer { x },
            0x1E => Opcode::AddIndexReg { x },
            0x29 => Opcode::FontChar { x },
            0x33 => Opcode::Bcd { x },
            0x55 => Opcode::StoreRegs { x },
            0x65 => Opcode::LoadRegs { x },
            _ => Opcode::Unknown(opcode),
        }
    }
}
