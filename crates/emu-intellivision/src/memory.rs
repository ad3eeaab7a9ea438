//! Word memory attached to the shared bus.
//!
//! A memory device owns a base address and a fixed-size word array. It
//! watches the `(phase, tick)` pair: it latches a selection when the CPU
//! asserts an address in its window (BAR, INTAK, or a chained ADAR),
//! drives the selected word when asked (ADAR, DTB, IAB), and stores the
//! bus word on DWS. Addresses outside the window silently clear the
//! selection; the device simply does not participate.

use gi_cp1610::{Bus, BusDevice, BusPhase};

/// Address window, storage and latched selection shared by RAM and ROM.
struct Window {
    base: u16,
    words: Vec<u16>,
    selected: Option<usize>,
}

impl Window {
    fn new(base: u16, words: Vec<u16>) -> Self {
        Self {
            base,
            words,
            selected: None,
        }
    }

    fn latch(&mut self, addr: u16) {
        let offset = addr.wrapping_sub(self.base) as usize;
        self.selected = (offset < self.words.len()).then_some(offset);
    }

    /// React to the current bus state. `writable` gates the DWS store.
    fn clock(&mut self, bus: &mut Bus, writable: bool) {
        match (bus.phase(), bus.tick()) {
            // INTAK addresses the stack window exactly like BAR.
            (BusPhase::Bar | BusPhase::Intak, 3) => self.latch(bus.data()),
            (BusPhase::Adar | BusPhase::Dtb | BusPhase::Iab, 1) => {
                if let Some(i) = self.selected {
                    bus.set_data(self.words[i]);
                }
            }
            // Chained addressing: the word just driven becomes the next
            // selected address, for this and every other device.
            (BusPhase::Adar, 3) => self.latch(bus.data()),
            (BusPhase::Dws, 3) => {
                // The store ends the transaction; the selection drops so a
                // following IAB (interrupt vector) is not contended.
                if let Some(i) = self.selected.take()
                    && writable
                {
                    self.words[i] = bus.data();
                }
            }
            _ => {}
        }
    }

    fn peek(&self, addr: u16) -> Option<u16> {
        let offset = addr.wrapping_sub(self.base) as usize;
        self.words.get(offset).copied()
    }
}

/// Read/write word memory over an address window.
pub struct Ram {
    window: Window,
}

impl Ram {
    /// Zero-filled RAM of `size` words at `base`.
    #[must_use]
    pub fn new(base: u16, size: usize) -> Self {
        Self {
            window: Window::new(base, vec![0; size]),
        }
    }

    /// Copy `words` into the window starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the slice runs past the end of the window.
    pub fn load(&mut self, offset: usize, words: &[u16]) {
        self.window.words[offset..offset + words.len()].copy_from_slice(words);
    }
}

impl BusDevice for Ram {
    fn clock(&mut self, bus: &mut Bus) {
        self.window.clock(bus, true);
    }

    fn debug_read(&self, addr: u16) -> Option<u16> {
        self.window.peek(addr)
    }
}

/// Read-only word memory: latches addresses identically but ignores DWS.
pub struct Rom {
    window: Window,
}

impl Rom {
    #[must_use]
    pub fn new(base: u16, words: &[u16]) -> Self {
        Self {
            window: Window::new(base, words.to_vec()),
        }
    }
}

impl BusDevice for Rom {
    fn clock(&mut self, bus: &mut Bus) {
        self.window.clock(bus, false);
    }

    fn debug_read(&self, addr: u16) -> Option<u16> {
        self.window.peek(addr)
    }
}
