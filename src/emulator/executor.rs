use super::basics::FrameBuffer;
use super::error::RunError;
use super::vm::VirtualMachine;
use log::{debug, error, info, trace};
use std::{
    io, thread,
    time::{Duration, Instant},
};

pub const TIMER_INTERVAL: Duration = Duration::from_micros(16667);

/// The host side of a running machine: shows frames, plays the buzzer and
/// reports key changes.
pub trait Frontend {
    /// Receives the frame buffer and sound flag after every cycle.
    fn present(&mut self, frame: &FrameBuffer, sound_active: bool) -> io::Result<()>;

    /// Key transitions since the last call, as `(key, pressed)` pairs.
    fn poll_keys(&mut self) -> io::Result<Vec<(u8, bool)>> {
        Ok(Vec::new())
    }

    fn should_stop(&self) -> bool {
        false
    }
}

/// Paces a [`VirtualMachine`] on the calling thread: one cycle per
/// instruction interval and one timer tick per timer interval, catching up
/// on missed ticks so the timers keep to wall-clock time.
pub struct Executor {
    instruction_interval: Duration,
    timer_interval: Duration,
    last_tick: Option<Instant>,
    cycles: u64,
    vm: VirtualMachine,
}

impl Executor {
    pub fn new(
        instruction_interval: Duration,
        timer_interval: Duration,
        vm: VirtualMachine,
    ) -> Executor {
        Executor {
            instruction_interval,
            timer_interval,
            last_tick: None,
            cycles: 0,
            vm,
        }
    }

    pub fn vm(&self) -> &VirtualMachine {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut VirtualMachine {
        &mut self.vm
    }

    /// Number of cycles executed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// One round of the host loop as of `now`: tick the timers that fell
    /// due, execute one cycle, hand the frame out, then apply input.
    pub fn step<F: Frontend>(&mut self, frontend: &mut F, now: Instant) -> Result<(), RunError> {
        self.tick_due_timers(now);

        if let Ok(opcode) = self.vm.peek_opcode() {
            trace!(
                "cycle {} at {:#05X}: {:#06X}",
                self.cycles,
                self.vm.program_counter().0,
                opcode
            );
        }
        self.vm.step()?;
        self.cycles += 1;

        frontend.present(self.vm.display(), self.vm.sound_active())?;
        for (key, pressed) in frontend.poll_keys()? {
            debug!("key {:X} {}", key, if pressed { "down" } else { "up" });
            self.vm.set_key(key, pressed);
        }
        Ok(())
    }

    /// Runs until the frontend asks to stop, `cycle_limit` cycles have been
    /// executed, or the machine fails. Returns the number of cycles run.
    pub fn run<F: Frontend>(
        &mut self,
        frontend: &mut F,
        cycle_limit: Option<u64>,
    ) -> Result<u64, RunError> {
        info!(
            "running at {:?} per instruction, timers every {:?}",
            self.instruction_interval, self.timer_interval
        );
        let start = self.cycles;
        let mut next_cycle = Instant::now();
        while !frontend.should_stop() {
            if let Some(limit) = cycle_limit {
                if self.cycles - start >= limit {
                    break;
                }
            }
            let now = Instant::now();
            if now < next_cycle {
                thread::sleep(next_cycle - now);
            }
            if let Err(err) = self.step(frontend, Instant::now()) {
                error!("stopped after {} cycles: {}", self.cycles - start, err);
                return Err(err);
            }
            next_cycle += self.instruction_interval;
        }
        info!("stopped after {} cycles", self.cycles - start);
        Ok(self.cycles - start)
    }

    fn tick_due_timers(&mut self, now: Instant) {
        let mut last_tick = match self.last_tick {
            Some(last_tick) => last_tick,
            None => {
                self.last_tick = Some(now);
                return;
            }
        };
        while now.duration_since(last_tick) >= self.timer_interval {
            self.vm.tick_timers();
            last_tick += self.timer_interval;
        }
        self.last_tick = Some(last_tick);
    }
}
