use super::basics::{
    Address, FrameBuffer, Quirks, Register, Value, FLAG_REGISTER, FONT_OFFSET, FONT_SPRITES,
    FONT_SPRITE_SIZE, KEYPAD_SIZE, MEMORY_SIZE, PROGRAM_CAPACITY, PROGRAM_START, REGISTER_COUNT,
    SCREEN_HEIGHT, SCREEN_WIDTH, STACK_DEPTH,
};
use super::error::VmError;
use super::program::{Instruction, Operation};
use arrayvec::ArrayVec;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::ops::Range;

/// Holds the logic of a virtual machine in action, including things like the
/// program counter and the memory.
///
/// The machine never talks to the outside world on its own. A host calls
/// [`step`](VirtualMachine::step) at the clock rate and
/// [`tick_timers`](VirtualMachine::tick_timers) at 60 Hz, pushes key state in
/// through [`set_key`](VirtualMachine::set_key) and reads the
/// [`display`](VirtualMachine::display) and
/// [`sound_active`](VirtualMachine::sound_active) flag back out.
pub struct VirtualMachine {
    quirks: Quirks,
    program_counter: Address,
    stack: ArrayVec<[Address; STACK_DEPTH]>,
    registers: [Value; REGISTER_COUNT],
    register_i: Address,
    delay_timer: Value,
    sound_timer: Value,
    memory: [u8; MEMORY_SIZE],
    keypad: [bool; KEYPAD_SIZE],
    display: FrameBuffer,
    rng: Box<dyn RngCore + Send>,
}

impl VirtualMachine {
    /// Creates a new VM instance with all registers and memory set accordingly.
    /// Random numbers come from an entropy-seeded generator.
    pub fn new(quirks: Quirks) -> VirtualMachine {
        VirtualMachine::with_rng(quirks, StdRng::from_entropy())
    }

    /// Like [`new`](VirtualMachine::new), but `CXNN` draws its bytes from `rng`.
    pub fn with_rng<R: RngCore + Send + 'static>(quirks: Quirks, rng: R) -> VirtualMachine {
        let mut vm = VirtualMachine {
            quirks,
            program_counter: Address(PROGRAM_START),
            stack: ArrayVec::new(),
            registers: [Value(0); REGISTER_COUNT],
            register_i: Address(0),
            delay_timer: Value(0),
            sound_timer: Value(0),
            memory: [0; MEMORY_SIZE],
            keypad: [false; KEYPAD_SIZE],
            display: [[false; SCREEN_HEIGHT as usize]; SCREEN_WIDTH as usize],
            rng: Box::new(rng),
        };
        vm.reset();
        vm
    }

    /// Puts the machine back into its power-on state: everything zeroed, the
    /// font reloaded and the program counter at 0x200. The quirks and the
    /// random source survive; a loaded program does not.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        let font_start = FONT_OFFSET as usize;
        self.memory[font_start..font_start + FONT_SPRITES.len()].copy_from_slice(&FONT_SPRITES);
        self.program_counter = Address(PROGRAM_START);
        self.stack.clear();
        self.registers = [Value(0); REGISTER_COUNT];
        self.register_i = Address(0);
        self.delay_timer = Value(0);
        self.sound_timer = Value(0);
        self.keypad = [false; KEYPAD_SIZE];
        self.clear_display();
    }

    /// Copies a program image verbatim to 0x200. Nothing else in memory is
    /// touched.
    pub fn load_program(&mut self, image: &[u8]) -> Result<(), VmError> {
        if image.len() > PROGRAM_CAPACITY {
            return Err(VmError::ProgramTooLarge {
                size: image.len(),
                capacity: PROGRAM_CAPACITY,
            });
        }
        let start = PROGRAM_START as usize;
        self.memory[start..start + image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Reads the big-endian opcode at the program counter and moves the
    /// program counter past it.
    pub fn fetch(&mut self) -> Result<u16, VmError> {
        let opcode = self.peek_opcode()?;
        self.program_counter.advance();
        Ok(opcode)
    }

    /// The opcode the next [`fetch`](VirtualMachine::fetch) would return,
    /// without moving the program counter.
    pub fn peek_opcode(&self) -> Result<u16, VmError> {
        let address = self.program_counter.0 as usize;
        let high = self.read_memory(address)?;
        let low = self.read_memory(address + 1)?;
        Ok(u16::from_be_bytes([high, low]))
    }

    /// Runs one fetch-decode-execute cycle.
    pub fn step(&mut self) -> Result<(), VmError> {
        let opcode = self.fetch()?;
        self.execute(&Instruction::decode(opcode))
    }

    /// Counts both timers down by one, stopping at zero. Meant to be called
    /// at 60 Hz independently of the instruction rate.
    pub fn tick_timers(&mut self) {
        self.delay_timer.0 = self.delay_timer.0.saturating_sub(1);
        self.sound_timer.0 = self.sound_timer.0.saturating_sub(1);
    }

    /// Whether the buzzer should currently be sounding.
    pub fn sound_active(&self) -> bool {
        self.sound_timer.0 > 0
    }

    pub fn display(&self) -> &FrameBuffer {
        &self.display
    }

    /// Returns false for coordinates outside the screen.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.display
            .get(x)
            .and_then(|column| column.get(y))
            .copied()
            .unwrap_or(false)
    }

    /// Records the state of one hex key. Indices above 0xF are ignored.
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        if let Some(state) = self.keypad.get_mut(key as usize) {
            *state = pressed;
        }
    }

    pub fn key_pressed(&self, key: u8) -> bool {
        self.keypad.get(key as usize).copied().unwrap_or(false)
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    pub fn program_counter(&self) -> Address {
        self.program_counter
    }

    pub fn index(&self) -> Address {
        self.register_i
    }

    /// Returns the value of one of the registers. Only the low nibble of
    /// `reg` is significant.
    pub fn register(&self, reg: Register) -> Value {
        self.registers[(reg.0 & 0xF) as usize]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer.0
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer.0
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Executes a single decoded instruction. The program counter is expected
    /// to already point past it, as it does right after [`fetch`].
    ///
    /// [`fetch`]: VirtualMachine::fetch
    pub fn execute(&mut self, instruction: &Instruction) -> Result<(), VmError> {
        let operation = match Operation::resolve(instruction) {
            Some(operation) => operation,
            None => {
                return Err(VmError::UnknownOpcode {
                    opcode: instruction.opcode,
                    address: self.instruction_address(),
                })
            }
        };

        match operation {
            // Jumps
            Operation::CallSubroutine(addr) => self.call_subroutine(addr)?,
            Operation::ReturnSubroutine => self.return_subroutine()?,
            Operation::Jump(addr) => self.program_counter = addr,
            Operation::JumpAdd(addr) => {
                let offset = self.reg(Register(0)) as u16;
                self.program_counter = addr.offset(offset);
            }

            // Conditionals
            Operation::SkipIfEqualConst(vx, n) => self.skip_if(self.reg(vx) == n.0),
            Operation::SkipIfNotEqualConst(vx, n) => self.skip_if(self.reg(vx) != n.0),
            Operation::SkipIfEqual(vx, vy) => self.skip_if(self.reg(vx) == self.reg(vy)),
            Operation::SkipIfNotEqual(vx, vy) => self.skip_if(self.reg(vx) != self.reg(vy)),

            // Register arithmetic
            Operation::SetConst(vx, n) => self.set_reg(vx, n.0),
            Operation::AddConst(vx, n) => self.set_reg(vx, self.reg(vx).wrapping_add(n.0)),
            Operation::Set(vx, vy) => self.set_reg(vx, self.reg(vy)),
            Operation::Or(vx, vy) => self.set_reg(vx, self.reg(vx) | self.reg(vy)),
            Operation::And(vx, vy) => self.set_reg(vx, self.reg(vx) & self.reg(vy)),
            Operation::Xor(vx, vy) => self.set_reg(vx, self.reg(vx) ^ self.reg(vy)),
            Operation::Add(vx, vy) => {
                let carry = self.reg(vx) as u16 + self.reg(vy) as u16 > 0xFF;
                self.set_vf(carry as u8);
                self.set_reg(vx, self.reg(vx).wrapping_add(self.reg(vy)));
            }
            Operation::Sub(vx, vy) => {
                self.set_vf((self.reg(vx) >= self.reg(vy)) as u8);
                self.set_reg(vx, self.reg(vx).wrapping_sub(self.reg(vy)));
            }
            Operation::NegSub(vx, vy) => {
                self.set_vf((self.reg(vy) > self.reg(vx)) as u8);
                self.set_reg(vx, self.reg(vy).wrapping_sub(self.reg(vx)));
            }
            Operation::RightShift(vx, vy) => {
                self.load_shift_source(vx, vy);
                self.set_vf(self.reg(vx) & 0x01);
                self.set_reg(vx, self.reg(vx) >> 1);
            }
            Operation::LeftShift(vx, vy) => {
                self.load_shift_source(vx, vy);
                self.set_vf(self.reg(vx) >> 7);
                self.set_reg(vx, self.reg(vx) << 1);
            }

            // Key presses
            Operation::SkipIfKey(vx) => self.skip_if(self.key_pressed(self.reg(vx))),
            Operation::SkipIfNotKey(vx) => self.skip_if(!self.key_pressed(self.reg(vx))),
            Operation::WaitKey(vx) => match self.keypad.iter().position(|&pressed| pressed) {
                Some(key) => self.set_reg(vx, key as u8),
                // Run this instruction again on the next cycle.
                None => self.program_counter.rewind(),
            },

            // Graphics
            Operation::ClearDisplay => self.clear_display(),
            Operation::Draw(vx, vy, n) => self.draw_sprite(self.reg(vx), self.reg(vy), n.0)?,
            Operation::SpriteAddr(vx) => {
                let digit = self.reg(vx) as u16;
                self.register_i = Address(FONT_OFFSET + digit * FONT_SPRITE_SIZE);
            }

            // Timers
            Operation::GetDelayTimer(vx) => self.set_reg(vx, self.delay_timer.0),
            Operation::SetDelayTimer(vx) => self.delay_timer = Value(self.reg(vx)),
            Operation::SetSoundTimer(vx) => self.sound_timer = Value(self.reg(vx)),

            // I register
            Operation::SetI(addr) => self.register_i = addr,
            Operation::AddToI(vx) => {
                self.register_i = self.register_i.offset(self.reg(vx) as u16);
                self.set_vf((self.register_i.0 > 0x0FFF) as u8);
            }
            Operation::Decimal(vx) => {
                let value = self.reg(vx);
                let range = self.memory_range(self.register_i, 3)?;
                self.memory[range].copy_from_slice(&[value / 100, value / 10 % 10, value % 10]);
            }
            Operation::StoreRegisters(vx) => {
                let count = vx.0 as usize + 1;
                let range = self.memory_range(self.register_i, count)?;
                for (cell, value) in self.memory[range].iter_mut().zip(self.registers.iter()) {
                    *cell = value.0;
                }
            }
            Operation::LoadRegisters(vx) => {
                let count = vx.0 as usize + 1;
                let range = self.memory_range(self.register_i, count)?;
                for (value, cell) in self.registers.iter_mut().zip(self.memory[range].iter()) {
                    *value = Value(*cell);
                }
            }

            // Misc
            Operation::Rand(vx, n) => {
                let byte: u8 = self.rng.gen();
                self.set_reg(vx, byte & n.0);
            }
        }
        Ok(())
    }

    /// Address of the instruction currently executing.
    fn instruction_address(&self) -> u16 {
        self.program_counter.0.wrapping_sub(2)
    }

    /// Calls a subroutine. Fails if the stack depth is exceeded.
    fn call_subroutine(&mut self, addr: Address) -> Result<(), VmError> {
        let address = self.instruction_address();
        self.stack
            .try_push(self.program_counter)
            .map_err(|_| VmError::StackOverflow { address })?;
        self.program_counter = addr;
        Ok(())
    }

    /// Returns the control flow from a subroutine.
    fn return_subroutine(&mut self) -> Result<(), VmError> {
        match self.stack.pop() {
            Some(addr) => {
                self.program_counter = addr;
                Ok(())
            }
            None => Err(VmError::StackUnderflow {
                address: self.instruction_address(),
            }),
        }
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.program_counter.advance();
        }
    }

    fn reg(&self, reg: Register) -> u8 {
        self.registers[reg.0 as usize].0
    }

    fn set_reg(&mut self, reg: Register, value: u8) {
        self.registers[reg.0 as usize] = Value(value);
    }

    /// Sets the VF register to a given value. Flag-producing instructions
    /// write VF before their result, so the result wins when VF is also the
    /// destination.
    fn set_vf(&mut self, value: u8) {
        self.set_reg(FLAG_REGISTER, value);
    }

    fn load_shift_source(&mut self, vx: Register, vy: Register) {
        if self.quirks.legacy_shift {
            self.set_reg(vx, self.reg(vy));
        }
    }

    fn read_memory(&self, address: usize) -> Result<u8, VmError> {
        self.memory
            .get(address)
            .copied()
            .ok_or(VmError::MemoryOutOfBounds { address })
    }

    /// Validates `len` bytes starting at `start` against the memory bound.
    fn memory_range(&self, start: Address, len: usize) -> Result<Range<usize>, VmError> {
        let begin = start.0 as usize;
        let end = begin + len;
        if len > 0 && end > MEMORY_SIZE {
            return Err(VmError::MemoryOutOfBounds {
                address: begin.max(MEMORY_SIZE),
            });
        }
        Ok(begin..end)
    }

    /// Clears the entire display of a running VM to black.
    fn clear_display(&mut self) {
        for column in self.display.iter_mut() {
            for pixel in column.iter_mut() {
                *pixel = false;
            }
        }
    }

    /// XORs an 8-pixel-wide sprite of `height` rows read from I onto the
    /// screen. The origin wraps, the sprite itself is clipped at the edges.
    /// VF ends up 1 if any lit pixel was switched off.
    fn draw_sprite(&mut self, x: u8, y: u8, height: u8) -> Result<(), VmError> {
        let x0 = (x % SCREEN_WIDTH) as usize;
        let y0 = (y % SCREEN_HEIGHT) as usize;
        self.set_vf(0);

        let mut collision = false;
        for row in 0..height as usize {
            let y = y0 + row;
            if y >= SCREEN_HEIGHT as usize {
                break;
            }
            let sprite = self.read_memory(self.register_i.0 as usize + row)?;
            for col in 0..8 {
                let x = x0 + col;
                if x >= SCREEN_WIDTH as usize {
                    break;
                }
                if (sprite >> (7 - col)) & 1 == 1 {
                    let pixel = &mut self.display[x][y];
                    collision |= *pixel;
                    *pixel = !*pixel;
                }
            }
        }
        self.set_vf(collision as u8);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn vm_with(quirks: Quirks, program: &[u16]) -> VirtualMachine {
        let mut vm = VirtualMachine::with_rng(quirks, StepRng::new(0xA5, 0));
        let image: Vec<u8> = program.iter().flat_map(|op| op.to_be_bytes().to_vec()).collect();
        vm.load_program(&image).unwrap();
        vm
    }

    fn machine(program: &[u16]) -> VirtualMachine {
        vm_with(Quirks::default(), program)
    }

    fn run(vm: &mut VirtualMachine, cycles: usize) {
        for _ in 0..cycles {
            vm.step().unwrap();
        }
    }

    #[test]
    fn test_vm_new() {
        let vm = VirtualMachine::new(Quirks::default());
        assert_eq!(vm.program_counter, Address(0x200));
        assert!(vm.stack.is_empty());
        for r in vm.registers.iter() {
            assert_eq!(*r, Value(0));
        }
        assert_eq!(vm.register_i, Address(0));
        assert_eq!(vm.delay_timer, Value(0));
        assert_eq!(vm.sound_timer, Value(0));
        assert_eq!(&vm.memory[..80], &FONT_SPRITES[..]);
        for x in vm.memory.iter().skip(80) {
            assert_eq!(*x, 0);
        }
        assert!(vm.keypad.iter().all(|k| !k));
        for column in vm.display.iter() {
            assert!(column.iter().all(|p| !p));
        }
    }

    #[test]
    fn test_fetch_big_endian() {
        let mut vm = VirtualMachine::new(Quirks::default());
        vm.load_program(&[0xA2, 0xF0]).unwrap();
        assert_eq!(vm.fetch(), Ok(0xA2F0));
        assert_eq!(vm.program_counter, Address(0x202));
    }

    #[test]
    fn test_fetch_out_of_bounds() {
        let mut vm = machine(&[0x1FFF]);
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0xFFF));
        assert_eq!(
            vm.fetch(),
            Err(VmError::MemoryOutOfBounds { address: MEMORY_SIZE })
        );
        assert_eq!(vm.program_counter, Address(0xFFF));
    }

    #[test]
    fn test_subroutines() {
        let mut vm = machine(&[0x2206, 0x0000, 0x0000, 0x220A, 0x6000, 0x00EE]);
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x206));
        assert_eq!(vm.stack.len(), 1);
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x20A));
        assert_eq!(vm.stack.len(), 2);
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x208));
        assert_eq!(vm.stack.len(), 1);
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x20A));
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x202));
        assert!(vm.stack.is_empty());
    }

    #[test]
    fn test_stack_overflow() {
        // Every call lands on itself.
        let mut vm = machine(&[0x2200]);
        run(&mut vm, STACK_DEPTH);
        assert_eq!(vm.stack.len(), STACK_DEPTH);
        assert_eq!(vm.step(), Err(VmError::StackOverflow { address: 0x200 }));
    }

    #[test]
    fn test_stack_empty() {
        let mut vm = machine(&[0x00EE]);
        assert_eq!(vm.step(), Err(VmError::StackUnderflow { address: 0x200 }));
    }

    #[test]
    fn test_jumps() {
        let mut vm = machine(&[0x6004, 0xB300]);
        vm.step().unwrap();
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x304));

        let mut vm = machine(&[0x1ABC]);
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0xABC));
    }

    #[test]
    fn test_conditionals() {
        let mut vm = machine(&[0x6112, 0x3112]);
        run(&mut vm, 2);
        assert_eq!(vm.program_counter, Address(0x206));

        let mut vm = machine(&[0x6112, 0x4112]);
        run(&mut vm, 2);
        assert_eq!(vm.program_counter, Address(0x204));

        let mut vm = machine(&[0x6112, 0x6212, 0x5120, 0x0000, 0x9120]);
        run(&mut vm, 3);
        assert_eq!(vm.program_counter, Address(0x208));
        run(&mut vm, 1);
        assert_eq!(vm.program_counter, Address(0x20A));
    }

    #[test]
    fn test_arithmetic() {
        let mut vm = machine(&[0x6A05, 0x7A02]);
        run(&mut vm, 2);
        assert_eq!(vm.reg(Register(0xA)), 7);
        assert_eq!(vm.reg(FLAG_REGISTER), 0);

        let mut vm = machine(&[0x61FF, 0x6201, 0x8124]);
        run(&mut vm, 3);
        assert_eq!(vm.reg(Register(1)), 0x00);
        assert_eq!(vm.reg(FLAG_REGISTER), 1);

        let mut vm = machine(&[0x6105, 0x6205, 0x8125]);
        run(&mut vm, 3);
        assert_eq!(vm.reg(Register(1)), 0);
        assert_eq!(vm.reg(FLAG_REGISTER), 1);

        let mut vm = machine(&[0x6105, 0x6203, 0x8127]);
        run(&mut vm, 3);
        assert_eq!(vm.reg(Register(1)), 0xFE);
        assert_eq!(vm.reg(FLAG_REGISTER), 0);
    }

    #[test]
    fn test_flag_register_as_destination() {
        // VF takes the carry first, then the sum of the carry and V1.
        let mut vm = machine(&[0x6FFF, 0x6101, 0x8F14]);
        run(&mut vm, 3);
        assert_eq!(vm.reg(FLAG_REGISTER), 2);

        let mut vm = machine(&[0x6F05, 0x6103, 0x8F15]);
        run(&mut vm, 3);
        assert_eq!(vm.reg(FLAG_REGISTER), 0xFE);

        let mut vm = machine(&[0x6F03, 0x8F06]);
        run(&mut vm, 2);
        assert_eq!(vm.reg(FLAG_REGISTER), 0);

        let mut vm = machine(&[0x6F81, 0x8F0E]);
        run(&mut vm, 2);
        assert_eq!(vm.reg(FLAG_REGISTER), 2);
    }

    #[test]
    fn test_shifts() {
        let mut vm = machine(&[0x6103, 0x8106]);
        run(&mut vm, 2);
        assert_eq!(vm.reg(Register(1)), 0x01);
        assert_eq!(vm.reg(FLAG_REGISTER), 1);

        let mut vm = machine(&[0x6181, 0x810E]);
        run(&mut vm, 2);
        assert_eq!(vm.reg(Register(1)), 0x02);
        assert_eq!(vm.reg(FLAG_REGISTER), 1);

        let legacy = Quirks { legacy_shift: true };
        let mut vm = vm_with(legacy, &[0x6101, 0x6240, 0x812E]);
        run(&mut vm, 3);
        assert_eq!(vm.reg(Register(1)), 0x80);
        assert_eq!(vm.reg(FLAG_REGISTER), 0);
    }

    #[test]
    fn test_rand_uses_injected_source() {
        let mut vm = machine(&[0xC30F]);
        vm.step().unwrap();
        assert_eq!(vm.reg(Register(3)), 0x05);
    }

    #[test]
    fn test_unknown_opcode() {
        let mut vm = machine(&[0x6000, 0x800D]);
        vm.step().unwrap();
        assert_eq!(
            vm.step(),
            Err(VmError::UnknownOpcode {
                opcode: 0x800D,
                address: 0x202
            })
        );
    }

    #[test]
    fn test_bcd_and_register_block() {
        let mut vm = machine(&[0x60FE, 0xA300, 0xF033, 0xF265, 0xA310, 0xF255]);
        run(&mut vm, 4);
        assert_eq!(&vm.memory[0x300..0x303], &[2, 5, 4]);
        assert_eq!(vm.reg(Register(0)), 2);
        assert_eq!(vm.reg(Register(1)), 5);
        assert_eq!(vm.reg(Register(2)), 4);
        run(&mut vm, 2);
        assert_eq!(&vm.memory[0x310..0x313], &[2, 5, 4]);
    }

    #[test]
    fn test_bcd_out_of_bounds() {
        let mut vm = machine(&[0xAFFE, 0xF033]);
        vm.step().unwrap();
        assert_eq!(
            vm.step(),
            Err(VmError::MemoryOutOfBounds { address: MEMORY_SIZE })
        );
    }

    #[test]
    fn test_store_registers_out_of_bounds() {
        let mut vm = machine(&[0x6011, 0x6122, 0x6233, 0xAFFE, 0xF255]);
        run(&mut vm, 4);
        assert_eq!(
            vm.step(),
            Err(VmError::MemoryOutOfBounds { address: MEMORY_SIZE })
        );
        assert_eq!(&vm.memory[0xFFE..], &[0, 0]);
    }

    #[test]
    fn test_load_registers_out_of_bounds() {
        let mut vm = machine(&[0xAFFE, 0xF265]);
        vm.memory[0xFFE] = 0x44;
        vm.memory[0xFFF] = 0x55;
        vm.step().unwrap();
        assert_eq!(
            vm.step(),
            Err(VmError::MemoryOutOfBounds { address: MEMORY_SIZE })
        );
        assert_eq!(vm.reg(Register(0)), 0);
        assert_eq!(vm.reg(Register(1)), 0);
    }

    #[test]
    fn test_draw_sprite_out_of_bounds() {
        let mut vm = machine(&[0x6000, 0x6100, 0xAFFE, 0xD015]);
        run(&mut vm, 3);
        assert_eq!(
            vm.step(),
            Err(VmError::MemoryOutOfBounds { address: MEMORY_SIZE })
        );
    }

    #[test]
    fn test_peek_opcode_keeps_program_counter() {
        let mut vm = machine(&[0x6A05]);
        assert_eq!(vm.peek_opcode(), Ok(0x6A05));
        assert_eq!(vm.program_counter, Address(0x200));
        assert_eq!(vm.fetch(), Ok(0x6A05));
        assert_eq!(vm.program_counter, Address(0x202));
    }

    #[test]
    fn test_add_to_i_flag() {
        let mut vm = machine(&[0xAFFF, 0x6001, 0xF01E]);
        run(&mut vm, 3);
        assert_eq!(vm.register_i, Address(0x1000));
        assert_eq!(vm.reg(FLAG_REGISTER), 1);
    }

    #[test]
    fn test_sprite_addr() {
        let mut vm = machine(&[0x600A, 0xF029]);
        run(&mut vm, 2);
        assert_eq!(vm.register_i, Address(FONT_OFFSET + 50));
    }

    #[test]
    fn test_draw_collision() {
        // Draw the "0" glyph twice at (1, 2).
        let mut vm = machine(&[0x6001, 0x6102, 0xA000, 0xD015, 0xD015]);
        run(&mut vm, 4);
        assert_eq!(vm.reg(FLAG_REGISTER), 0);
        assert!(vm.display[1][2]);
        assert!(vm.display[4][2]);
        assert!(!vm.display[2][3]);
        run(&mut vm, 1);
        assert_eq!(vm.reg(FLAG_REGISTER), 1);
        assert!(vm.display.iter().all(|column| column.iter().all(|p| !p)));
    }

    #[test]
    fn test_draw_clips_at_edges() {
        // A full row at x=60 and a 5 row glyph at y=30.
        let mut vm = machine(&[0x603C, 0x611E, 0xA300, 0xD011]);
        vm.memory[0x300] = 0xFF;
        run(&mut vm, 4);
        for x in 60..64 {
            assert!(vm.display[x][30]);
        }
        for x in 0..4 {
            assert!(!vm.display[x][30]);
        }
        assert_eq!(vm.reg(FLAG_REGISTER), 0);

        let mut vm = machine(&[0x6000, 0x611E, 0xA000, 0xD015]);
        run(&mut vm, 4);
        assert!(vm.display[0][30]);
        assert!(vm.display[0][31]);
        assert!(!vm.display[0][0]);
        assert!(!vm.display[0][1]);
    }

    #[test]
    fn test_draw_wraps_origin() {
        let mut vm = machine(&[0x6042, 0x6121, 0xA300, 0xD011]);
        vm.memory[0x300] = 0x80;
        run(&mut vm, 4);
        assert!(vm.display[2][1]);
    }

    #[test]
    fn test_wait_key() {
        let mut vm = machine(&[0xF30A]);
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x200));
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x200));
        vm.set_key(0xB, true);
        vm.set_key(0x7, true);
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x202));
        assert_eq!(vm.reg(Register(3)), 0x7);
    }

    #[test]
    fn test_key_skips() {
        let mut vm = machine(&[0x6005, 0xE09E, 0x0000, 0xE0A1]);
        vm.set_key(5, true);
        run(&mut vm, 2);
        assert_eq!(vm.program_counter, Address(0x206));
        vm.step().unwrap();
        assert_eq!(vm.program_counter, Address(0x208));
    }

    #[test]
    fn test_set_key_ignores_out_of_range() {
        let mut vm = VirtualMachine::new(Quirks::default());
        vm.set_key(16, true);
        vm.set_key(200, true);
        assert!(vm.keypad.iter().all(|k| !k));
    }

    #[test]
    fn test_timers() {
        let mut vm = machine(&[0x6002, 0xF015, 0xF018]);
        run(&mut vm, 3);
        assert!(vm.sound_active());
        vm.tick_timers();
        assert_eq!(vm.delay_timer(), 1);
        assert!(vm.sound_active());
        vm.tick_timers();
        assert_eq!(vm.delay_timer(), 0);
        assert!(!vm.sound_active());
        vm.tick_timers();
        assert_eq!(vm.delay_timer(), 0);
        assert_eq!(vm.sound_timer(), 0);
    }

    #[test]
    fn test_load_program_capacity() {
        let mut vm = VirtualMachine::new(Quirks::default());
        assert!(vm.load_program(&vec![0xAB; PROGRAM_CAPACITY]).is_ok());
        assert_eq!(vm.memory[MEMORY_SIZE - 1], 0xAB);
        assert_eq!(
            vm.load_program(&vec![0; PROGRAM_CAPACITY + 1]),
            Err(VmError::ProgramTooLarge {
                size: PROGRAM_CAPACITY + 1,
                capacity: PROGRAM_CAPACITY
            })
        );
    }

    #[test]
    fn test_reset() {
        let mut vm = machine(&[0x6A05, 0xA123, 0x2300]);
        vm.set_key(3, true);
        run(&mut vm, 3);
        vm.reset();
        assert_eq!(vm.program_counter, Address(0x200));
        assert_eq!(vm.reg(Register(0xA)), 0);
        assert_eq!(vm.register_i, Address(0));
        assert!(vm.stack.is_empty());
        assert!(!vm.key_pressed(3));
        assert_eq!(vm.memory[0x200], 0);
        assert_eq!(&vm.memory[..80], &FONT_SPRITES[..]);
    }
}
