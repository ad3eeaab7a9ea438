//! CP-1610 CPU core with per-time-slot execution.
//!
//! The CPU does not own the bus. Instead, the bus is passed to `clock()`
//! on each time slot, so the same bus can be handed to every other device
//! the machine clocks. The CPU walks one phase template at a time
//! (see [`Step`]): it asserts the phase at slot 0, drives or samples the
//! data lines at that phase's fixed slot, and advances the template at
//! slot 3. When a template completes, a transition rule decodes, commits
//! side effects, or starts the next addressing step.

use emu_core::{Observable, Ticks, Value};

use crate::bus::{Bus, BusPhase};
use crate::flags::Flags;
use crate::isa::{self, opcodes};
use crate::registers::{Registers, SP};
use crate::sequence::Step;

/// The General Instrument CP-1610.
pub struct Cp1610 {
    /// The eight general registers (R7 = PC, R6 = SP).
    pub regs: Registers,
    /// The six condition flags.
    pub flags: Flags,
    /// Set by HLT; never cleared except by reset.
    halted: bool,

    /// Instruction register: the word most recently fetched.
    opcode: u16,
    /// Current logical step.
    step: Step,
    /// Position within the step's phase template.
    phase_index: usize,
    /// Time slot within the current micro-cycle (0..3).
    slot: u8,

    /// Effective address for the current addressing sequence.
    ea: u16,
    /// Data word in flight: read target or write source.
    data: u16,
    /// Operand slots for multi-word sequences (J target halves, branch
    /// offset).
    args: [u16; 2],
    arg_index: usize,
    /// SDBD state captured at decode for the instruction in progress.
    double: bool,
    /// R6 steps forward once the pending DWS completes (stack push).
    pending_sp_bump: bool,
    /// Whether an interrupt may be acknowledged after the instruction
    /// that just finished.
    last_interruptible: bool,
    /// Level-sensitive interrupt request line (INTRM).
    int_request: bool,

    /// Total time slots elapsed.
    total_ticks: Ticks,
    /// Instruction fetches begun (the step helpers and tests count these).
    fetch_count: u64,
    /// Observer fired with the fetch address at the start of every
    /// instruction fetch.
    on_fetch: Option<Box<dyn FnMut(u16)>>,
}

impl Cp1610 {
    /// Create a CPU at power-on: the reset sequence runs first and latches
    /// R7 from the bus during its IAB cycle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::default(),
            flags: Flags::default(),
            halted: false,
            opcode: 0,
            step: Step::Initialization,
            phase_index: 0,
            slot: 3,
            ea: 0,
            data: 0,
            args: [0; 2],
            arg_index: 0,
            double: false,
            pending_sp_bump: false,
            last_interruptible: true,
            int_request: false,
            total_ticks: Ticks::ZERO,
            fetch_count: 0,
            on_fetch: None,
        }
    }

    /// Return to the power-on state. Registers and flags clear and the
    /// reset sequence runs again.
    pub fn reset(&mut self) {
        let hook = self.on_fetch.take();
        *self = Self::new();
        self.on_fetch = hook;
    }

    /// Total time slots elapsed since power-on.
    #[must_use]
    pub const fn total_ticks(&self) -> Ticks {
        self.total_ticks
    }

    /// True once HLT has executed.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// The logical step the sequencer is in.
    #[must_use]
    pub const fn step(&self) -> Step {
        self.step
    }

    /// Number of instruction fetches begun since power-on.
    #[must_use]
    pub const fn fetch_count(&self) -> u64 {
        self.fetch_count
    }

    /// Drive the level-sensitive interrupt request line. The line is
    /// sampled at instruction boundaries while the I flag is set.
    pub fn interrupt_request(&mut self, asserted: bool) {
        self.int_request = asserted;
    }

    /// Install an observer fired with the fetch address at the start of
    /// every instruction fetch.
    pub fn set_fetch_observer(&mut self, hook: Box<dyn FnMut(u16)>) {
        self.on_fetch = Some(hook);
    }

    /// Advance one time slot.
    pub fn clock(&mut self, bus: &mut Bus) {
        if self.halted {
            return;
        }
        self.total_ticks += Ticks::new(1);
        self.slot = (self.slot + 1) & 3;

        let phases = self.step.phases();
        let Some(&phase) = phases.get(self.phase_index) else {
            panic!(
                "bus sequencer out of range: {:?} index {}",
                self.step, self.phase_index
            );
        };

        if self.slot == 0 {
            if self.step == Step::InstructionFetch && self.phase_index == 0 {
                self.begin_fetch();
            }
            bus.set_phase(phase);
        }

        match phase {
            BusPhase::Bar => {
                if self.slot == 2 {
                    let addr = self.bus_address();
                    bus.set_data(addr);
                }
            }
            BusPhase::Intak => {
                if self.slot == 2 {
                    bus.set_data(self.regs.sp());
                }
            }
            BusPhase::Dtb => {
                if self.slot == 2 {
                    self.sample(bus.data());
                }
            }
            BusPhase::Iab => {
                if self.slot == 2 {
                    self.regs.set_pc(bus.data());
                }
            }
            BusPhase::Dw | BusPhase::Dws => {
                // The CPU holds the write data on the bus for both halves.
                bus.set_data(self.data);
            }
            BusPhase::Adar | BusPhase::Nact => {}
        }

        if self.slot == 3 {
            if phase == BusPhase::Dws && self.pending_sp_bump {
                // Push semantics: the stack pointer steps past the word
                // just stored.
                self.pending_sp_bump = false;
                self.regs.r[SP] = self.regs.r[SP].wrapping_add(1);
            }
            self.phase_index += 1;
            if self.phase_index == phases.len() {
                self.complete_step();
            }
        }
    }

    fn begin_fetch(&mut self) {
        self.fetch_count += 1;
        let addr = self.regs.pc();
        if let Some(hook) = &mut self.on_fetch {
            hook(addr);
        }
    }

    /// The address the CPU asserts during the current BAR cycle.
    fn bus_address(&mut self) -> u16 {
        match self.step {
            // Fetches and inline operands come from the program counter,
            // which steps past the word being addressed.
            Step::InstructionFetch
            | Step::Jump
            | Step::BranchTaken
            | Step::DirectRead
            | Step::DirectWrite => self.regs.take_pc(),
            // Register-held addresses were resolved at decode.
            Step::IndirectRead | Step::IndirectReadSdbd | Step::IndirectWrite => self.ea,
            _ => unreachable!("BAR outside an addressing step"),
        }
    }

    /// Sample the data lines during a DTB cycle.
    fn sample(&mut self, word: u16) {
        match self.step {
            Step::InstructionFetch => self.opcode = word,
            Step::IndirectRead | Step::DirectRead => self.data = word,
            Step::IndirectReadSdbd => {
                // Two 8-bit fetches, low byte first, from consecutive
                // addresses.
                if self.phase_index == 2 {
                    self.data = word & 0x00FF;
                    self.ea = self.ea.wrapping_add(1);
                } else {
                    self.data |= (word & 0x00FF) << 8;
                }
            }
            Step::Jump | Step::BranchTaken => {
                self.args[self.arg_index] = word;
                self.arg_index += 1;
            }
            _ => unreachable!("DTB outside a read step"),
        }
    }

    /// Transition rule, run when the current template completes.
    fn complete_step(&mut self) {
        match self.step {
            Step::Initialization | Step::Interrupt => self.enter(Step::InstructionFetch),
            Step::InstructionFetch => self.decode(),
            Step::IndirectRead | Step::IndirectReadSdbd | Step::DirectRead => {
                self.commit_data_read();
                self.finish_instruction();
            }
            Step::IndirectWrite | Step::DirectWrite => self.finish_instruction(),
            Step::Jump => {
                self.commit_jump();
                self.finish_instruction();
            }
            Step::BranchTaken => {
                self.commit_branch();
                self.finish_instruction();
            }
            Step::BranchNotTaken => {
                // The offset word is skipped without a bus read.
                self.regs.take_pc();
                self.finish_instruction();
            }
            Step::ExecPad2 | Step::ExecPad4 => {
                self.execute_register_op();
                self.finish_instruction();
            }
        }
    }

    /// Decode the freshly fetched instruction register.
    fn decode(&mut self) {
        let op = self.opcode & 0x03FF;

        if op == opcodes::SDBD {
            // The prefix re-enters fetch immediately; D covers exactly the
            // next instruction and no interrupt may come between.
            self.flags.d = true;
            self.last_interruptible = false;
            self.enter(Step::InstructionFetch);
            return;
        }

        let Some(def) = isa::decode(op) else {
            log::trace!(
                "unknown opcode {:#06X} at {:#06X}; resuming fetch",
                self.opcode,
                self.regs.pc()
            );
            self.last_interruptible = true;
            self.finish_instruction();
            return;
        };
        self.last_interruptible = def.interruptible;

        // D applies to this one instruction: capture it and drop the flag.
        self.double = self.flags.d;
        self.flags.d = false;

        if isa::is_external(op) {
            self.decode_external(op);
        } else {
            self.decode_internal(op);
        }
    }

    fn decode_external(&mut self, op: u16) {
        let f1 = isa::field1(op) as usize;
        match isa::operation(op) {
            0 => {
                if self.branch_condition(op) {
                    self.enter(Step::BranchTaken);
                } else {
                    self.enter(Step::BranchNotTaken);
                }
            }
            1 => {
                // MVO: the SDBD prefix does not retarget writes.
                self.data = self.regs.r[isa::field2(op) as usize];
                if f1 == 0 {
                    self.enter(Step::DirectWrite);
                } else {
                    self.resolve_write_address(f1);
                    self.enter(Step::IndirectWrite);
                }
            }
            _ => {
                if f1 == 0 {
                    self.enter(Step::DirectRead);
                } else {
                    self.resolve_read_address(f1);
                    if self.double {
                        self.enter(Step::IndirectReadSdbd);
                    } else {
                        self.enter(Step::IndirectRead);
                    }
                }
            }
        }
    }

    fn decode_internal(&mut self, op: u16) {
        let class = isa::operation(op);
        match class {
            0 if isa::field1(op) == 0 => self.execute_control(op),
            0 => self.enter(Step::ExecPad2),
            1 => {
                // A doubled shift burns two extra cycles.
                if op & 0x004 != 0 {
                    self.enter(Step::ExecPad4);
                } else {
                    self.enter(Step::ExecPad2);
                }
            }
            _ => {
                // MOVR into R6 or R7 costs the long pad.
                let dst = isa::field2(op) as usize;
                if class == 2 && dst >= SP {
                    self.enter(Step::ExecPad4);
                } else {
                    self.enter(Step::ExecPad2);
                }
            }
        }
    }

    /// The fetch-only control group: HLT, EIS, DIS, J, TCI, CLRC, SETC.
    /// All but J commit here and resume fetch without padding.
    fn execute_control(&mut self, op: u16) {
        match op {
            opcodes::HLT => {
                self.halted = true;
                self.enter(Step::InstructionFetch);
            }
            opcodes::EIS => {
                self.flags.i = true;
                self.finish_instruction();
            }
            opcodes::DIS => {
                self.flags.i = false;
                self.finish_instruction();
            }
            opcodes::J => self.enter(Step::Jump),
            opcodes::TCI => self.finish_instruction(),
            opcodes::CLRC => {
                self.flags.c = false;
                self.finish_instruction();
            }
            opcodes::SETC => {
                self.flags.c = true;
                self.finish_instruction();
            }
            _ => unreachable!("SDBD is dispatched before decode"),
        }
    }

    /// Resolve the effective address for an indirect read (F1 = 1..7).
    fn resolve_read_address(&mut self, f1: usize) {
        let stride = if self.double { 2 } else { 1 };
        match f1 {
            1..=3 => self.ea = self.regs.r[f1],
            6 => {
                // Stack pull: R6 backs up before the read.
                self.regs.r[SP] = self.regs.r[SP].wrapping_sub(stride);
                self.ea = self.regs.r[SP];
            }
            _ => {
                // R4, R5 and R7 step past the word(s) they address.
                self.ea = self.regs.r[f1];
                self.regs.r[f1] = self.regs.r[f1].wrapping_add(stride);
            }
        }
    }

    /// Resolve the effective address for an indirect write (F1 = 1..7).
    fn resolve_write_address(&mut self, f1: usize) {
        match f1 {
            1..=3 => self.ea = self.regs.r[f1],
            6 => {
                // Stack push: write at R6, then step past it (applied when
                // the DWS cycle completes).
                self.ea = self.regs.r[SP];
                self.pending_sp_bump = true;
            }
            _ => {
                self.ea = self.regs.r[f1];
                self.regs.r[f1] = self.regs.r[f1].wrapping_add(1);
            }
        }
    }

    /// Evaluate a branch condition from the opcode's low five bits.
    fn branch_condition(&self, op: u16) -> bool {
        // Bit 4 selects BEXT: the low four bits pick an external-condition
        // pin, which this core does not model. The line reads as false.
        if op & 0x010 != 0 {
            return false;
        }
        let f = &self.flags;
        let base = match op & 0x007 {
            0 => true,
            1 => f.c,
            2 => f.o,
            3 => !f.s,
            4 => f.z,
            5 => f.s != f.o,
            6 => f.z || (f.s != f.o),
            _ => f.s != f.c,
        };
        base ^ (op & 0x008 != 0)
    }

    /// Retarget R7 after a taken branch. R7 already points past the
    /// offset word.
    fn commit_branch(&mut self) {
        let offset = self.args[0];
        let pc = self.regs.pc();
        let target = if self.opcode & 0x020 != 0 {
            // Backward branches land one word beyond the plain
            // subtraction.
            pc.wrapping_sub(offset).wrapping_add(1)
        } else {
            pc.wrapping_add(offset)
        };
        self.regs.set_pc(target);
    }

    /// Commit a J-family instruction from its two operand words.
    fn commit_jump(&mut self) {
        let hi = self.args[0];
        let lo = self.args[1];

        // Link register field: R4, R5, R6, or none.
        let rr = (hi >> 8) & 3;
        if rr != 3 {
            self.regs.r[4 + rr as usize] = self.regs.pc();
        }

        match hi & 3 {
            0 => {}
            1 => self.flags.i = true,
            2 => self.flags.i = false,
            _ => log::trace!(
                "J with interrupt-flag field 11 at {:#06X}; I left unchanged",
                self.regs.pc()
            ),
        }

        self.regs.set_pc(((hi & 0x00FC) << 8) | (lo & 0x03FF));
    }

    /// Start the next instruction, or acknowledge a pending interrupt.
    fn finish_instruction(&mut self) {
        if self.int_request && self.flags.i && self.last_interruptible {
            // Push the return address through the stack window, then
            // latch the new R7 from whoever drives the IAB cycle.
            self.data = self.regs.pc();
            self.pending_sp_bump = true;
            self.enter(Step::Interrupt);
        } else {
            self.enter(Step::InstructionFetch);
        }
    }

    fn enter(&mut self, step: Step) {
        self.step = step;
        self.phase_index = 0;
        self.arg_index = 0;
    }
}

impl Default for Cp1610 {
    fn default() -> Self {
        Self::new()
    }
}

/// All query paths supported by the CP-1610.
const CP1610_QUERY_PATHS: &[&str] = &[
    // Registers
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "pc", "sp",
    // Flags
    "flags.s", "flags.c", "flags.z", "flags.o", "flags.i", "flags.d",
    // CPU state
    "halted", "ticks", "fetches",
    // Current instruction state
    "opcode", "step", "slot",
];

impl Observable for Cp1610 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "r0" => Some(self.regs.r[0].into()),
            "r1" => Some(self.regs.r[1].into()),
            "r2" => Some(self.regs.r[2].into()),
            "r3" => Some(self.regs.r[3].into()),
            "r4" => Some(self.regs.r[4].into()),
            "r5" => Some(self.regs.r[5].into()),
            "r6" | "sp" => Some(self.regs.sp().into()),
            "r7" | "pc" => Some(self.regs.pc().into()),

            "flags.s" => Some(self.flags.s.into()),
            "flags.c" => Some(self.flags.c.into()),
            "flags.z" => Some(self.flags.z.into()),
            "flags.o" => Some(self.flags.o.into()),
            "flags.i" => Some(self.flags.i.into()),
            "flags.d" => Some(self.flags.d.into()),

            "halted" => Some(self.halted.into()),
            "ticks" => Some(self.total_ticks.get().into()),
            "fetches" => Some(self.fetch_count.into()),

            "opcode" => Some(self.opcode.into()),
            "step" => Some(Value::String(format!("{:?}", self.step))),
            "slot" => Some(self.slot.into()),

            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        CP1610_QUERY_PATHS
    }
}

// Instruction execution split into a separate file for readability.
mod execute;
