mod rom_config;

use anyhow::{Context, Result};
use chip8::emulator::ascii_display::AsciiDisplay;
use clap::Parser;
use log::info;
use std::{io, path::PathBuf};

/// Runs a CHIP-8 ROM and prints the screen to the terminal.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the ROM image to run
    rom: PathBuf,

    /// Quirk and speed profile: modern, cosmac or fast
    #[arg(short, long, default_value = rom_config::DEFAULT_PROFILE)]
    profile: String,

    /// Copy VY into VX before shifting, whatever the profile says
    #[arg(long)]
    legacy_shift: bool,

    /// Instructions per second, overriding the profile
    #[arg(long)]
    clock_hz: Option<u32>,

    /// Stop after this many instructions
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Append frames instead of redrawing in place
    #[arg(long)]
    no_clear: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = rom_config::profile(&args.profile)?;
    if let Some(hz) = args.clock_hz {
        config = config.with_clock_hz(hz)?;
    }
    if args.legacy_shift {
        config.quirks.legacy_shift = true;
    }
    info!("loading {} with {:?}", args.rom.display(), config);

    let mut executor = rom_config::load_rom(&args.rom, config)?;
    let stdout = io::stdout();
    let mut display = AsciiDisplay::new(stdout.lock(), !args.no_clear);
    executor
        .run(&mut display, args.max_cycles)
        .with_context(|| format!("{} halted", args.rom.display()))?;
    Ok(())
}
