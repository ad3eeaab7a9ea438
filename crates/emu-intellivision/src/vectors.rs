//! The external source that answers IAB cycles.
//!
//! The CP-1610 has no vector constants of its own: whatever drives the
//! bus during an IAB cycle becomes the new R7. On the Intellivision the
//! EXEC glue delivers $1000 at power-on and $1004 after an interrupt
//! acknowledge; this device plays that role.

use gi_cp1610::{Bus, BusDevice, BusPhase};

/// Drives the reset vector on the first IAB and the interrupt vector on
/// every IAB that follows an INTAK.
pub struct VectorSource {
    reset: u16,
    interrupt: u16,
    intak_seen: bool,
}

impl VectorSource {
    #[must_use]
    pub fn new(reset: u16, interrupt: u16) -> Self {
        Self {
            reset,
            interrupt,
            intak_seen: false,
        }
    }
}

impl BusDevice for VectorSource {
    fn clock(&mut self, bus: &mut Bus) {
        match (bus.phase(), bus.tick()) {
            (BusPhase::Intak, 3) => self.intak_seen = true,
            (BusPhase::Iab, 1) => {
                let vector = if self.intak_seen {
                    self.interrupt
                } else {
                    self.reset
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
