//! Intellivision machine core.
//!
//! Wires a CP-1610 to the shared bus together with the standard memory
//! windows and the reset/interrupt vector source. Video, audio and
//! controller hardware attach through the same [`gi_cp1610::BusDevice`]
//! contract; this crate carries only the CPU-visible core.

mod config;
mod intellivision;
mod memory;
mod vectors;

pub use config::{
    CPU_DIVIDER, CRYSTAL_HZ, INTERRUPT_VECTOR, IntellivisionConfig, RESET_VECTOR, SCRATCH_BASE,
    SCRATCH_WORDS, SYSTEM_RAM_BASE, SYSTEM_RAM_WORDS,
};
pub use intellivision::Intellivision;
pub use memory::{Ram, Rom};
pub use vectors::VectorSource;
