//! Shared test rig: a CP-1610 wired to a flat word memory and a vector
//! source, clocked the way a machine would clock them.

#![allow(dead_code)] // Each test binary uses a different slice of the rig.

use gi_cp1610::{Bus, BusDevice, BusPhase, Cp1610};

/// Address the vector source delivers at power-on.
pub const RESET_VECTOR: u16 = 0x1000;

/// Address the vector source delivers after an interrupt acknowledge.
pub const INTERRUPT_VECTOR: u16 = 0x1004;

/// Flat 64K word memory answering every address. Follows the bus protocol:
/// latch on BAR/ADAR/INTAK, drive on ADAR/DTB, store on DWS.
pub struct FlatRam {
    words: Vec<u16>,
    selected: Option<usize>,
}

impl FlatRam {
    pub fn new() -> Self {
        Self {
            words: vec![0xFFFF; 0x1_0000],
            selected: None,
        }
    }

    pub fn load(&mut self, base: u16, words: &[u16]) {
        for (i, &word) in words.iter().enumerate() {
            self.words[base as usize + i] = word;
        }
    }

    pub fn peek(&self, addr: u16) -> u16 {
        self.words[addr as usize]
    }
}

impl BusDevice for FlatRam {
    fn clock(&mut self, bus: &mut Bus) {
        match (bus.phase(), bus.tick()) {
            (BusPhase::Bar | BusPhase::Intak, 3) => {
                self.selected = Some(bus.data() as usize);
            }
            (BusPhase::Adar | BusPhase::Dtb, 1) => {
                if let Some(i) = self.selected {
                    bus.set_data(self.words[i]);
                }
            }
            (BusPhase::Adar, 3) => {
                self.selected = Some(bus.data() as usize);
            }
            (BusPhase::Dws, 3) => {
                // The store ends the transaction; selection drops so the
                // following IAB (interrupt vector) is not contended.
                if let Some(i) = self.selected.take() {
                    self.words[i] = bus.data();
                }
            }
            _ => {}
        }
    }

    fn debug_read(&self, addr: u16) -> Option<u16> {
        Some(self.words[addr as usize])
    }
}

/// The external source that drives IAB cycles: the reset vector at
/// power-on, the interrupt vector once an INTAK has been seen.
pub struct Vectors {
    intak_seen: bool,
}

impl Vectors {
    pub fn new() -> Self {
        Self { intak_seen: false }
    }
}

impl BusDevice for Vectors {
    fn clock(&mut self, bus: &mut Bus) {
        match (bus.phase(), bus.tick()) {
            (BusPhase::Intak, 3) => self.intak_seen = true,
            (BusPhase::Iab, 1) => {
                let vector = if self.intak_seen {
                    INTERRUPT_VECTOR
                } else {
                    RESET_VECTOR
                };
                bus.set_data(vector);
            }
            _ => {}
        }
    }

    fn debug_read(&self, _addr: u16) -> Option<u16> {
        None
    }
}

/// CPU, bus, memory and vector source, clocked in machine order.
pub struct Rig {
    pub bus: Bus,
    pub cpu: Cp1610,
    pub ram: FlatRam,
    pub vectors: Vectors,
}

impl Rig {
    /// A rig with `program` loaded at the reset vector, not yet clocked.
    pub fn unbooted(program: &[u16]) -> Self {
        let mut ram = FlatRam::new();
        ram.load(RESET_VECTOR, program);
        Self {
            bus: Bus::new(),
            cpu: Cp1610::new(),
            ram,
            vectors: Vectors::new(),
        }
    }

    /// A rig that has completed reset and sits on the first tick of the
    /// first instruction fetch.
    pub fn with_program(program: &[u16]) -> Self {
        let mut rig = Self::unbooted(program);
        rig.boot();
        rig
    }

    /// One host tick: bus counter first, then CPU, then devices.
    pub fn tick(&mut self) {
        self.bus.clock();
        self.cpu.clock(&mut self.bus);
        self.ram.clock(&mut self.bus);
        self.vectors.clock(&mut self.bus);
    }

    /// Run the five-cycle reset sequence plus one tick, landing on the
    /// first tick of the first fetch.
    pub fn boot(&mut self) {
        for _ in 0..5 * 4 + 1 {
            self.tick();
        }
        assert_eq!(self.cpu.fetch_count(), 1, "first fetch should begin after reset");
        assert_eq!(self.cpu.regs.pc(), RESET_VECTOR, "reset vector should be latched");
    }

    /// Run to the first tick of the next instruction fetch. Returns the
    /// micro-cycles consumed by the instruction (and any interrupt
    /// acknowledge) that just completed.
    pub fn step_instruction(&mut self) -> u64 {
        let target = self.cpu.fetch_count() + 1;
        let mut ticks = 0u64;
        while self.cpu.fetch_count() < target && !self.cpu.is_halted() {
            self.tick();
            ticks += 1;
            assert!(ticks <= 256, "instruction did not complete");
        }
        ticks / 4
    }

    /// Run `n` whole micro-cycles.
    pub fn run_micro_cycles(&mut self, n: u64) {
        for _ in 0..n * 4 {
            self.tick();
        }
    }
}
