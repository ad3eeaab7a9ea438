//! The CP-1610 shared bus.
//!
//! A single 16-bit data path connects the CPU to every memory and
//! peripheral device. There are no separate address lines or read/write
//! strobes: the CPU drives three control lines (BDIR, BC2, BC1) whose
//! encoding names one of eight bus phases, and addresses and data take
//! turns on the same sixteen wires.
//!
//! # Phase encoding (BDIR BC2 BC1)
//!
//! | Code | Phase | Meaning |
//! |------|-------|---------|
//! | 000  | NACT  | No action; bus floats |
//! | 001  | ADAR  | Addressed device drives data as the next address |
//! | 010  | IAB   | External source asserts reset/interrupt vector |
//! | 011  | DTB   | Addressed device drives data; CPU reads |
//! | 100  | BAR   | CPU asserts address |
//! | 101  | DW    | CPU asserts data to write (first half) |
//! | 110  | DWS   | CPU continues asserting data (second half) |
//! | 111  | INTAK | Interrupt acknowledge; CPU asserts stack pointer |
//!
//! A phase lasts one micro-cycle of four ticks. Within the micro-cycle,
//! the time slot decides who touches the data lines: the CPU asserts the
//! phase at slot 0, addressed devices drive at slot 1 (ADAR/DTB/IAB), the
//! CPU drives addresses or samples data at slot 2 (BAR/INTAK, DTB/IAB),
//! and devices latch at slot 3 (BAR/ADAR/INTAK address latch, DWS store).

/// A bus phase, named by the BDIR/BC2/BC1 control line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BusPhase {
    /// No action. The bus floats back to `0xFFFF` when the cycle ends.
    Nact = 0,
    /// The addressed device drives its data, which every device then
    /// re-latches as the next address (chained addressing).
    Adar = 1,
    /// An external source drives the reset or interrupt vector.
    Iab = 2,
    /// The addressed device drives its data; the CPU samples it.
    Dtb = 3,
    /// The CPU drives an address; devices latch it.
    Bar = 4,
    /// The CPU drives write data (first half of a write).
    Dw = 5,
    /// The CPU keeps driving write data; devices store it.
    Dws = 6,
    /// Interrupt acknowledge. The CPU drives the stack pointer; devices
    /// treat it as BAR for address latching.
    Intak = 7,
}

impl BusPhase {
    /// The 3-bit BDIR/BC2/BC1 control code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a 3-bit control code. Values above 7 are not a phase.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Nact),
            1 => Some(Self::Adar),
            2 => Some(Self::Iab),
            3 => Some(Self::Dtb),
            4 => Some(Self::Bar),
            5 => Some(Self::Dw),
            6 => Some(Self::Dws),
            7 => Some(Self::Intak),
            _ => None,
        }
    }
}

/// The number of time slots in one micro-cycle.
pub(crate) const SLOTS_PER_MICRO_CYCLE: u8 = 4;

/// The shared 16-bit tri-stated bus.
///
/// The bus is a rendezvous, not an actor: it never moves data on its own.
/// The CPU drives `phase`; everyone reads and writes `data` according to
/// the `(phase, tick)` protocol. The only behaviour the bus itself models
/// is the float back to `0xFFFF` at the end of an idle (NACT) cycle.
#[derive(Debug)]
pub struct Bus {
    data: u16,
    phase: BusPhase,
    tick: u8,
}

impl Bus {
    /// Create a bus one tick before slot 0, so the first `clock()` lands
    /// every observer on slot 0 of the first micro-cycle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: 0xFFFF,
            phase: BusPhase::Nact,
            tick: SLOTS_PER_MICRO_CYCLE - 1,
        }
    }

    /// Advance the tick counter modulo 4. When the counter wraps at the
    /// end of a NACT cycle, the data lines relax to the floating value.
    pub fn clock(&mut self) {
        self.tick = (self.tick + 1) % SLOTS_PER_MICRO_CYCLE;
        if self.tick == 0 && self.phase == BusPhase::Nact {
            self.data = 0xFFFF;
        }
    }

    /// The 16-bit word currently on the data lines.
    #[must_use]
    pub const fn data(&self) -> u16 {
        self.data
    }

    /// Drive the data lines. The value occupies all sixteen bits.
    pub fn set_data(&mut self, value: u16) {
        self.data = value;
    }

    /// The phase currently asserted on the control lines.
    #[must_use]
    pub const fn phase(&self) -> BusPhase {
        self.phase
    }

    /// Assert a phase. Only the CPU drives the control lines; devices
    /// observe.
    pub fn set_phase(&mut self, phase: BusPhase) {
        self.phase = phase;
    }

    /// The current time slot (0..3) within the micro-cycle.
    #[must_use]
    pub const fn tick(&self) -> u8 {
        self.tick
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// A device attached to the shared bus.
///
/// Devices are clocked once per host tick, after the bus counter has
/// advanced and the CPU has acted. They observe `(phase, tick)` to decide
/// when to latch addresses, drive data, or accept writes. They never
/// drive the control lines.
pub trait BusDevice {
    /// Advance one host tick, reacting to the current bus state.
    fn clock(&mut self, bus: &mut Bus);

    /// Side-effect-free peek at an address, or `None` when the address is
    /// not in this device's window. Used only by tests and debug tooling.
    fn debug_read(&self, addr: u16) -> Option<u16>;
}
