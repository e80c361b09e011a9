use thiserror::Error;

/// Fatal machine conditions. Once a cycle returns one of these the machine
/// state is no longer trustworthy and the run must stop.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum VmError {
    #[error("stack overflow: call at {address:#05X} exceeds the 16-entry call stack")]
    StackOverflow { address: u16 },

    #[error("stack underflow: return at {address:#05X} with an empty call stack")]
    StackUnderflow { address: u16 },

    #[error("memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: usize },

    #[error("program image is {size} bytes, at most {capacity} bytes fit")]
    ProgramTooLarge { size: usize, capacity: usize },

    #[error("unknown opcode {opcode:#06X} at {address:#05X}")]
    UnknownOpcode { opcode: u16, address: u16 },
}

impl VmError {
    /// True for errors caused by running out of stack or memory space, as
    /// opposed to a malformed instruction stream.
    pub fn is_resource_exhaustion(&self) -> bool {
        !matches!(self, VmError::UnknownOpcode { .. })
    }
}

/// Why a paced run stopped early.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Machine(#[from] VmError),

    #[error("frontend failure: {0}")]
    Frontend(#[from] std::io::Error),
}
