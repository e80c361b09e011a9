use super::basics::{Address, Register, Value};

/// A fetched opcode split into its nibble fields. Decoding never fails;
/// whether the combination names a real instruction is decided by
/// [`Operation::resolve`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Instruction {
    pub opcode: u16,
    pub kind: u8,
    pub x: Register,
    pub y: Register,
    pub n: Value,
    pub nn: Value,
    pub nnn: Address,
}

impl Instruction {
    pub fn decode(opcode: u16) -> Instruction {
        Instruction {
            opcode,
            kind: ((opcode & 0xF000) >> 12) as u8,
            x: Register(((opcode & 0x0F00) >> 8) as u8),
            y: Register(((opcode & 0x00F0) >> 4) as u8),
            n: Value((opcode & 0x000F) as u8),
            nn: Value((opcode & 0x00FF) as u8),
            nnn: Address(opcode & 0x0FFF),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Operation {
    ClearDisplay,
    ReturnSubroutine,
    Jump(Address),
    CallSubroutine(Address),
    SkipIfEqualConst(Register, Value),
    SkipIfNotEqualConst(Register, Value),
    SkipIfEqual(Register, Register),
    SetConst(Register, Value),
    AddConst(Register, Value),
    Set(Register, Register),
    Or(Register, Register),
    And(Register, Register),
    Xor(Register, Register),
    Add(Register, Register),
    Sub(Register, Register),
    RightShift(Register, Register),
    NegSub(Register, Register),
    LeftShift(Register, Register),
    SkipIfNotEqual(Register, Register),
    SetI(Address),
    JumpAdd(Address),
    Rand(Register, Value),
    Draw(Register, Register, Value),
    SkipIfKey(Register),
    SkipIfNotKey(Register),
    GetDelayTimer(Register),
    WaitKey(Register),
    SetDelayTimer(Register),
    SetSoundTimer(Register),
    AddToI(Register),
    SpriteAddr(Register),
    Decimal(Register),
    StoreRegisters(Register),
    LoadRegisters(Register),
}

impl Operation {
    /// Maps a decoded instruction onto the operation it names, or `None`
    /// if the opcode is not part of the instruction set.
    pub fn resolve(instruction: &Instruction) -> Option<Operation> {
        let Instruction {
            opcode,
            kind,
            x,
            y,
            n,
            nn,
            nnn,
        } = *instruction;
        let operation = match kind {
            0x0 => match opcode {
                0x00E0 => Operation::ClearDisplay,
                0x00EE => Operation::ReturnSubroutine,
                _ => return None,
            },
            0x1 => Operation::Jump(nnn),
            0x2 => Operation::CallSubroutine(nnn),
            0x3 => Operation::SkipIfEqualConst(x, nn),
            0x4 => Operation::SkipIfNotEqualConst(x, nn),
            0x5 => Operation::SkipIfEqual(x, y),
            0x6 => Operation::SetConst(x, nn),
            0x7 => Operation::AddConst(x, nn),
            0x8 => match n.0 {
                0x0 => Operation::Set(x, y),
                0x1 => Operation::Or(x, y),
                0x2 => Operation::And(x, y),
                0x3 => Operation::Xor(x, y),
                0x4 => Operation::Add(x, y),
                0x5 => Operation::Sub(x, y),
                0x6 => Operation::RightShift(x, y),
                0x7 => Operation::NegSub(x, y),
                0xE => Operation::LeftShift(x, y),
                _ => return None,
            },
            0x9 => Operation::SkipIfNotEqual(x, y),
            0xA => Operation::SetI(nnn),
            0xB => Operation::JumpAdd(nnn),
            0xC => Operation::Rand(x, nn),
            0xD => Operation::Draw(x, y, n),
            0xE => match nn.0 {
                0x9E => Operation::SkipIfKey(x),
                0xA1 => Operation::SkipIfNotKey(x),
                _ => return None,
            },
            0xF => match nn.0 {
                0x07 => Operation::GetDelayTimer(x),
                0x0A => Operation::WaitKey(x),
                0x15 => Operation::SetDelayTimer(x),
                0x18 => Operation::SetSoundTimer(x),
                0x1E => Operation::AddToI(x),
                0x29 => Operation::SpriteAddr(x),
                0x33 => Operation::Decimal(x),
                0x55 => Operation::StoreRegisters(x),
                0x65 => Operation::LoadRegisters(x),
                _ => return None,
            },
            _ => return None,
        };
        Some(operation)
    }
}
