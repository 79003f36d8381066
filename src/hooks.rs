//! Host capability set invoked at engine and memory trigger points.
//!
//! Every method defaults to a no-op: a host that supplies nothing observes
//! execution silently continuing with sentinel or stale state, which is the
//! intended contract. Policy (logging, halting, device emulation) belongs
//! entirely to the embedding host.

use crate::cpu::Cpu;

/// Whether the engine keeps running after a hook fires.
///
/// The execute loop has no internal exit condition; a hook returning `Halt`
/// is the only way it ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Halt,
}

/// Trigger points the engine and the segment table call into.
#[allow(unused_variables)]
pub trait Hooks {
    /// BREAKPOINT opcode (byte 0x00).
    fn breakpoint(&mut self, cpu: &Cpu) -> Control {
        Control::Continue
    }

    /// Instruction byte matched no recognized category.
    fn illegal_opcode(&mut self, cpu: &Cpu) -> Control {
        Control::Continue
    }

    /// DIV or MOD popped a zero divisor. On `Continue` the instruction
    /// produces an unspecified result and the loop resumes.
    fn divide_by_zero(&mut self, cpu: &Cpu) -> Control {
        Control::Continue
    }

    /// CONFIG opcode stored a new opaque configuration token.
    fn config(&mut self, token: u32) {}

    /// Access at `va` resolved to no segment or failed a protection check.
    fn segv(&mut self, va: u32) {}

    /// A successful opcode fetch at `va`, fired on every fetch. Independent
    /// of the data-access override mechanism; meant for tracing and host
    /// breakpoints.
    fn opcode_fetch(&mut self, va: u32) {}

    /// Device-emulation override for a byte read. `Some` claims the access
    /// and the backing buffer is left untouched.
    fn override_get_u8(&mut self, va: u32) -> Option<u8> {
        None
    }

    /// Device-emulation override for a halfword read.
    fn override_get_u16(&mut self, va: u32) -> Option<u16> {
        None
    }

    /// Device-emulation override for a word read.
    fn override_get_u32(&mut self, va: u32) -> Option<u32> {
        None
    }

    /// Device-emulation override for a byte write. `true` claims the access.
    fn override_set_u8(&mut self, va: u32, value: u8) -> bool {
        false
    }

    /// Device-emulation override for a halfword write.
    fn override_set_u16(&mut self, va: u32, value: u16) -> bool {
        false
    }

    /// Device-emulation override for a word write.
    fn override_set_u32(&mut self, va: u32, value: u32) -> bool {
        false
    }
}

/// Default hook set: every trigger is a no-op and execution continues.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopHooks;

impl Hooks for NopHooks {}
