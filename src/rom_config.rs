use anyhow::{bail, Context, Result};
use chip8::emulator::basics::Quirks;
use chip8::emulator::executor::{Executor, TIMER_INTERVAL};
use chip8::emulator::vm::VirtualMachine;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::{fs, path::Path, time::Duration};

pub const DEFAULT_PROFILE: &str = "modern";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    pub quirks: Quirks,
    pub instruction_sleep: Duration,
}

impl Config {
    pub fn with_clock_hz(mut self, hz: u32) -> Result<Config> {
        if hz == 0 {
            bail!("clock rate must be at least 1 Hz");
        }
        self.instruction_sleep = Duration::from_nanos(1_000_000_000 / hz as u64);
        Ok(self)
    }
}

lazy_static! {
    static ref PROFILES: HashMap<&'static str, Config> = vec![
        ("modern", Config {
            quirks: Quirks { legacy_shift: false },
            instruction_sleep: Duration::from_micros(1429),
        }),
        ("cosmac", Config {
            quirks: Quirks { legacy_shift: true },
            instruction_sleep: Duration::from_millis(2),
        }),
        ("fast", Config {
            quirks: Quirks { legacy_shift: false },
            instruction_sleep: Duration::from_micros(100),
        }),
    ]
    .into_iter()
    .collect();
}

pub fn profile(name: &str) -> Result<Config> {
    match PROFILES.get(name) {
        Some(config) => Ok(*config),
        None => {
            let mut known: Vec<&str> = PROFILES.keys().copied().collect();
            known.sort_unstable();
            bail!("unknown profile '{}', expected one of: {}", name, known.join(", "))
        }
    }
}

fn load_rom_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read ROM file {}", path.display()))
}

pub fn load_rom(path: &Path, config: Config) -> Result<Executor> {
    let mut vm = VirtualMachine::new(config.quirks);
    vm.load_program(&load_rom_file(path)?)
        .with_context(|| format!("failed to load ROM file {}", path.display()))?;
    Ok(Executor::new(config.instruction_sleep, TIMER_INTERVAL, vm))
}
