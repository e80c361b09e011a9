pub const MEMORY_SIZE: usize = 4096;
pub const PROGRAM_START: u16 = 0x200;
pub const PROGRAM_CAPACITY: usize = MEMORY_SIZE - PROGRAM_START as usize;
pub const SCREEN_WIDTH: u8 = 64;
pub const SCREEN_HEIGHT: u8 = 32;
pub const FONT_OFFSET: u16 = 0;
pub const FONT_SPRITE_SIZE: u16 = 5;
pub const STACK_DEPTH: usize = 16;
pub const REGISTER_COUNT: usize = 16;
pub const KEYPAD_SIZE: usize = 16;

/// Index of the flag register VF.
pub const FLAG_REGISTER: Register = Register(0xF);

/// Built-in hexadecimal digit sprites, five rows per digit 0-F.
pub const FONT_SPRITES: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// The 64x32 pixel grid, indexed as `frame[x][y]`.
pub type FrameBuffer = [[bool; SCREEN_HEIGHT as usize]; SCREEN_WIDTH as usize];

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Address(pub u16);

impl Address {
    /// Moves past one 16-bit instruction word.
    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(2);
    }

    /// Steps back over one 16-bit instruction word.
    pub fn rewind(&mut self) {
        self.0 = self.0.wrapping_sub(2);
    }

    pub fn offset(self, by: u16) -> Address {
        Address(self.0.wrapping_add(by))
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Register(pub u8);

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Value(pub u8);

/// Boot-time behaviour switches that differ between CHIP-8 interpreters.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct Quirks {
    /// `8XY6`/`8XYE` copy VY into VX before shifting, as the COSMAC VIP did.
    pub legacy_shift: bool,
}
