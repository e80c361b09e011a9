pub mod ascii_display;
pub mod basics;
pub mod error;
pub mod executor;
pub mod program;
pub mod vm;
