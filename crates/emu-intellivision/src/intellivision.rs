//! Top-level Intellivision system.
//!
//! One machine tick is one CP-1610 time slot: the bus counter advances,
//! the CPU acts for the new slot, and every attached device observes the
//! result, in that fixed order. Four ticks make a bus micro-cycle. The
//! real part runs at the NTSC crystal / 4; the host simply calls `tick()`
//! at whatever pace it wants.

use emu_core::{MasterClock, Observable, Tickable, Value};
use gi_cp1610::{Bus, BusDevice, Cp1610};

use crate::config::{
    CPU_DIVIDER, CRYSTAL_HZ, INTERRUPT_VECTOR, IntellivisionConfig, RESET_VECTOR, SCRATCH_BASE,
    SCRATCH_WORDS, SYSTEM_RAM_BASE, SYSTEM_RAM_WORDS,
};
use crate::memory::{Ram, Rom};
use crate::vectors::VectorSource;

/// Safety limit for `step_instruction` (the longest legal sequence is a
/// prefixed read plus an interrupt acknowledge, far below this).
const MAX_STEP_TICKS: u64 = 256;

/// Intellivision system: CPU, bus, memory windows and vector source.
pub struct Intellivision {
    bus: Bus,
    cpu: Cp1610,
    /// Clocked in registration order after the CPU. The vector source
    /// stays last so its IAB drive settles any overlap.
    devices: Vec<Box<dyn BusDevice>>,
    cpu_clock: MasterClock,
}

impl Intellivision {
    /// Build the machine from a configuration. Scratch and system RAM are
    /// always present; ROM windows appear when their images are
    /// non-empty.
    #[must_use]
    pub fn new(config: &IntellivisionConfig) -> Self {
        let mut devices: Vec<Box<dyn BusDevice>> = vec![
            Box::new(Ram::new(SCRATCH_BASE, SCRATCH_WORDS)),
            Box::new(Ram::new(SYSTEM_RAM_BASE, SYSTEM_RAM_WORDS)),
        ];
        if !config.exec_rom.is_empty() {
            devices.push(Box::new(Rom::new(config.exec_base, &config.exec_rom)));
        }
        if !config.cart_rom.is_empty() {
            devices.push(Box::new(Rom::new(config.cart_base, &config.cart_rom)));
        }
        devices.push(Box::new(VectorSource::new(RESET_VECTOR, INTERRUPT_VECTOR)));

        Self {
            bus: Bus::new(),
            cpu: Cp1610::new(),
            devices,
            cpu_clock: MasterClock::new(CRYSTAL_HZ).divided(CPU_DIVIDER),
        }
    }

    /// Attach another bus device (STIC, PSG, extra RAM windows). It is
    /// clocked after the built-in memories, before the vector source.
    pub fn attach(&mut self, device: Box<dyn BusDevice>) {
        let before_vectors = self.devices.len() - 1;
        self.devices.insert(before_vectors, device);
        log::trace!("attached bus device #{before_vectors}");
    }

    #[must_use]
    pub fn cpu(&self) -> &Cp1610 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cp1610 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The CPU clock rate this machine models (crystal / 4).
    #[must_use]
    pub fn cpu_clock(&self) -> MasterClock {
        self.cpu_clock
    }

    /// Run `n` whole bus micro-cycles.
    pub fn run_micro_cycles(&mut self, n: u64) {
        for _ in 0..n * 4 {
            self.tick();
        }
    }

    /// Run to the first tick of the next instruction fetch. Returns the
    /// micro-cycles consumed; the first call after construction covers
    /// the reset sequence.
    pub fn step_instruction(&mut self) -> u64 {
        let target = self.cpu.fetch_count() + 1;
        let mut ticks = 0u64;
        while self.cpu.fetch_count() < target && !self.cpu.is_halted() {
            self.tick();
            ticks += 1;
            if ticks >= MAX_STEP_TICKS {
                break;
            }
        }
        ticks / 4
    }

    /// Side-effect-free read across every attached device.
    #[must_use]
    pub fn debug_read(&self, addr: u16) -> Option<u16> {
        self.devices.iter().find_map(|device| device.debug_read(addr))
    }
}

impl Tickable for Intellivision {
    fn tick(&mut self) {
        self.bus.clock();
        self.cpu.clock(&mut self.bus);
        for device in &mut self.devices {
            device.clock(&mut self.bus);
        }
    }
}

impl Observable for Intellivision {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "bus.data" => Some(self.bus.data().into()),
            "bus.tick" => Some(self.bus.tick().into()),
            "bus.phase" => Some(Value::String(format!("{:?}", self.bus.phase()))),
            _ => self.cpu.query(path),
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "bus.data", "bus.tick", "bus.phase",
            // CPU paths pass through.
            "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "pc", "sp",
            "flags.s", "flags.c", "flags.z", "flags.o", "flags.i", "flags.d",
            "halted", "ticks", "fetches", "opcode", "step", "slot",
        ]
    }
}
