//! Bus-phase templates for the CPU's logical steps.
//!
//! Every logical step the CPU performs (reset, fetch, address resolution,
//! branch, jump, execute padding, interrupt acknowledge) is a short fixed
//! list of bus phases. The sequencer walks one template at a time, one
//! phase per micro-cycle, and runs a transition rule when the template
//! completes.

use crate::bus::BusPhase;

use BusPhase::{Adar, Bar, Dtb, Dw, Dws, Iab, Intak, Nact};

/// A logical step: one entry per phase template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Power-on: latch the reset vector from the bus during IAB.
    Initialization,
    /// Fetch the next instruction word at R7.
    InstructionFetch,
    /// Read one word through a register-held address.
    IndirectRead,
    /// Read two 8-bit halves through consecutive addresses (SDBD).
    IndirectReadSdbd,
    /// Write one word through a register-held address.
    IndirectWrite,
    /// Read one word through an inline address (ADAR chains it).
    DirectRead,
    /// Write one word through an inline address.
    DirectWrite,
    /// Read the two operand words of a J-family instruction.
    Jump,
    /// Read the offset word and retarget R7.
    BranchTaken,
    /// Skip the offset word without touching the bus.
    BranchNotTaken,
    /// Two idle cycles while a register-only instruction completes.
    ExecPad2,
    /// Four idle cycles (doubled shifts, MOVR into R6/R7).
    ExecPad4,
    /// Acknowledge an interrupt: push R7, latch the new R7 from IAB.
    Interrupt,
}

impl Step {
    /// The phase template for this step, one phase per micro-cycle.
    #[must_use]
    pub const fn phases(self) -> &'static [BusPhase] {
        match self {
            Self::Initialization => &[Nact, Iab, Nact, Nact, Nact],
            Self::InstructionFetch => &[Bar, Nact, Dtb, Nact],
            Self::IndirectRead => &[Bar, Nact, Dtb, Nact],
            Self::IndirectReadSdbd => &[Bar, Nact, Dtb, Bar, Nact, Dtb],
            Self::IndirectWrite => &[Bar, Nact, Dw, Dws, Nact],
            Self::DirectRead => &[Bar, Nact, Adar, Nact, Dtb, Nact],
            Self::DirectWrite => &[Bar, Nact, Adar, Nact, Dw, Dws, Nact],
            Self::Jump => &[Bar, Nact, Dtb, Nact, Bar, Nact, Dtb, Nact, Nact],
            Self::BranchTaken => &[Bar, Nact, Dtb, Nact, Nact],
            Self::BranchNotTaken => &[Nact, Nact, Nact],
            Self::ExecPad2 => &[Nact, Nact],
            Self::ExecPad4 => &[Nact, Nact, Nact, Nact],
            Self::Interrupt => &[Intak, Nact, Dw, Dws, Nact, Iab, Nact],
        }
    }

    /// Template length in micro-cycles.
    #[must_use]
    pub const fn micro_cycles(self) -> u8 {
        self.phases().len() as u8
    }
}
