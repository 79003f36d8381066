//! ZPU decode-execute engine.
//!
//! # Execution Model
//!
//! The ZPU is a 32-bit stack machine: most opcodes implicitly act on the top
//! of the data stack. To minimize memory traffic the top-of-stack value lives
//! in the `tos` register cache and mirrors what the word at `sp` would be;
//! many opcodes never touch memory for the top element. `nos` caches the
//! next-on-stack operand during dispatch.
//!
//! One loop pass is: clear `pc_dirty`, fetch the opcode byte through the
//! segment table (execute permission enforced there), resolve the instruction
//! category in priority order (immediate-load, ADDSP, LOADSP, STORESP, exact
//! match), dispatch, then advance `pc` by one unless the opcode already
//! redirected it.
//!
//! The engine itself never terminates, logs, or unwinds: breakpoints, illegal
//! opcodes, division by zero and segmentation faults are all delegated to the
//! [`Hooks`] capability set, and the loop only ends when a hook answers
//! [`Control::Halt`].

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::decode::{opcode, Decoded};
use crate::hooks::{Control, Hooks};
use crate::memory::MemMap;
use crate::syscall::SyscallDispatcher;

/// ZPU register file plus its address space.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Program counter: ordinal index into the opcode stream.
    pub pc: u32,
    /// Stack pointer: byte offset into the data stack, word-aligned by
    /// convention. Decreases on push, increases on pop.
    pub sp: u32,
    /// Top-of-stack cache.
    pub tos: u32,
    /// Next-on-stack operand cache.
    pub nos: u32,
    /// Most recently fetched opcode byte.
    pub instruction: u8,
    /// Opaque configuration token, set only by CONFIG and never interpreted
    /// by the engine.
    pub cpu: u32,
    /// True when the current opcode already redirected `pc`, suppressing the
    /// end-of-cycle auto-increment.
    pub pc_dirty: bool,
    /// True while a multi-byte immediate is being accumulated.
    pub decode_mask: bool,
    /// Memory segment table.
    pub memory: MemMap,
}

impl Cpu {
    /// Create a CPU over the given address space, in reset state with `sp=0`.
    pub fn new(memory: MemMap) -> Self {
        Self {
            pc: 0,
            sp: 0,
            tos: 0,
            nos: 0,
            instruction: 0,
            cpu: 0,
            pc_dirty: true,
            decode_mask: false,
            memory,
        }
    }

    /// Re-initialize the register file for a fresh run. Memory contents and
    /// the CONFIG token are left alone.
    pub fn reset(&mut self, initial_sp: u32) {
        self.pc = 0;
        self.sp = initial_sp;
        self.tos = 0;
        self.nos = 0;
        self.instruction = 0;
        self.pc_dirty = true;
        self.decode_mask = false;
    }

    /// Write `value` to the word at `sp`, then step `sp` down.
    pub fn push(&mut self, hooks: &mut dyn Hooks, value: u32) {
        self.memory.set_u32(hooks, self.sp, value);
        self.sp = self.sp.wrapping_sub(4);
    }

    /// Step `sp` up, then read the word there.
    pub fn pop(&mut self, hooks: &mut dyn Hooks) -> u32 {
        self.sp = self.sp.wrapping_add(4);
        self.memory.get_u32(hooks, self.sp)
    }

    /// Run fetch-decode-dispatch cycles until a hook answers `Halt`.
    ///
    /// With no-op hooks this never returns; termination is entirely the
    /// hooks' responsibility.
    pub fn execute(&mut self, hooks: &mut dyn Hooks, syscalls: &mut dyn SyscallDispatcher) {
        while self.step(hooks, syscalls) == Control::Continue {}
    }

    /// One fetch-decode-dispatch cycle.
    pub fn step(&mut self, hooks: &mut dyn Hooks, syscalls: &mut dyn SyscallDispatcher) -> Control {
        self.pc_dirty = false;
        self.instruction = self.memory.get_opcode(hooks, self.pc);
        trace!(
            pc = self.pc,
            sp = self.sp,
            tos = self.tos,
            op = self.instruction,
            "step"
        );

        let mut control = Control::Continue;
        match Decoded::classify(self.instruction) {
            Decoded::Im { payload } => {
                if self.decode_mask {
                    self.tos = (self.tos << 7) | u32::from(payload);
                } else {
                    self.push(hooks, self.tos);
                    // low 7 bits, sign-extended to 32
                    self.tos = ((u32::from(payload) << 25) as i32 >> 25) as u32;
                }
                self.decode_mask = true;
            }
            Decoded::AddSp { offset } => {
                self.decode_mask = false;
                let addr = self.sp.wrapping_add(offset);
                if addr == self.sp {
                    // The slot at sp shadows the tos cache, so offset zero
                    // degenerates to doubling. This does happen in practice.
                    self.tos = self.tos.wrapping_add(self.tos);
                } else {
                    let word = self.memory.get_u32(hooks, addr);
                    self.tos = self.tos.wrapping_add(word);
                }
            }
            Decoded::LoadSp { index } => {
                self.decode_mask = false;
                let addr = self.sp.wrapping_add(index * 4);
                self.push(hooks, self.tos);
                self.tos = self.memory.get_u32(hooks, addr);
            }
            Decoded::StoreSp { index } => {
                self.decode_mask = false;
                let addr = self.sp.wrapping_add(index * 4);
                self.memory.set_u32(hooks, addr, self.tos);
                self.tos = self.pop(hooks);
            }
            Decoded::Op(op) => {
                self.decode_mask = false;
                control = self.dispatch(op, hooks, syscalls);
            }
        }

        if !self.pc_dirty {
            self.pc = self.pc.wrapping_add(1);
            self.pc_dirty = true;
        }
        control
    }

    /// Exact-match dispatch for the fixed single-byte opcodes.
    fn dispatch(
        &mut self,
        op: u8,
        hooks: &mut dyn Hooks,
        syscalls: &mut dyn SyscallDispatcher,
    ) -> Control {
        match op {
            opcode::BREAKPOINT => return hooks.breakpoint(self),
            opcode::PUSHSP => {
                self.push(hooks, self.tos);
                self.tos = self.sp.wrapping_add(4);
            }
            opcode::POPPC => {
                self.pc = self.tos;
                self.tos = self.pop(hooks);
                self.pc_dirty = true;
            }
            opcode::ADD => {
                self.nos = self.pop(hooks);
                self.tos = self.tos.wrapping_add(self.nos);
            }
            opcode::AND => {
                self.nos = self.pop(hooks);
                self.tos &= self.nos;
            }
            opcode::OR => {
                self.nos = self.pop(hooks);
                self.tos |= self.nos;
            }
            opcode::LOAD => {
                self.tos = self.memory.get_u32(hooks, self.tos);
            }
            opcode::NOT => {
                self.tos = !self.tos;
            }
            opcode::FLIP => {
                self.tos = self.tos.reverse_bits();
            }
            opcode::NOP => {}
            opcode::STORE => {
                self.nos = self.pop(hooks);
                self.memory.set_u32(hooks, self.tos, self.nos);
                self.tos = self.pop(hooks);
            }
            opcode::POPSP => {
                self.sp = self.tos;
                self.tos = self.memory.get_u32(hooks, self.sp);
            }
            opcode::LOADH => {
                self.tos = u32::from(self.memory.get_u16(hooks, self.tos));
            }
            opcode::STOREH => {
                self.nos = self.pop(hooks);
                self.memory.set_u16(hooks, self.tos, self.nos as u16);
                self.tos = self.pop(hooks);
            }
            opcode::LESSTHAN => {
                self.nos = self.pop(hooks);
                self.tos = ((self.tos as i32) < (self.nos as i32)) as u32;
            }
            opcode::LESSTHANOREQUAL => {
                self.nos = self.pop(hooks);
                self.tos = ((self.tos as i32) <= (self.nos as i32)) as u32;
            }
            opcode::ULESSTHAN => {
                self.nos = self.pop(hooks);
                self.tos = (self.tos < self.nos) as u32;
            }
            opcode::ULESSTHANOREQUAL => {
                self.nos = self.pop(hooks);
                self.tos = (self.tos <= self.nos) as u32;
            }
            opcode::SWAP => {
                self.tos = self.tos.rotate_left(16);
            }
            opcode::MULT => {
                self.nos = self.pop(hooks);
                self.tos = self.tos.wrapping_mul(self.nos);
            }
            opcode::LSHIFTRIGHT => {
                self.nos = self.pop(hooks);
                let shamt = self.tos & 0x3F;
                self.tos = (u64::from(self.nos) >> shamt) as u32;
            }
            opcode::ASHIFTLEFT => {
                self.nos = self.pop(hooks);
                let shamt = self.tos & 0x3F;
                self.tos = (u64::from(self.nos) << shamt) as u32;
            }
            opcode::ASHIFTRIGHT => {
                self.nos = self.pop(hooks);
                let shamt = self.tos & 0x3F;
                self.tos = (i64::from(self.nos as i32) >> shamt) as u32;
            }
            opcode::CALL => {
                self.nos = self.tos;
                self.tos = self.pc.wrapping_add(1);
                self.pc = self.nos;
                self.pc_dirty = true;
            }
            opcode::EQ => {
                self.nos = self.pop(hooks);
                self.tos = (self.nos == self.tos) as u32;
            }
            opcode::NEQ => {
                self.nos = self.pop(hooks);
                self.tos = (self.nos != self.tos) as u32;
            }
            opcode::NEG => {
                self.tos = self.tos.wrapping_neg();
            }
            opcode::SUB => {
                self.nos = self.pop(hooks);
                self.tos = self.nos.wrapping_sub(self.tos);
            }
            opcode::XOR => {
                self.nos = self.pop(hooks);
                self.tos ^= self.nos;
            }
            opcode::LOADB => {
                self.tos = u32::from(self.memory.get_u8(hooks, self.tos));
            }
            opcode::STOREB => {
                self.nos = self.pop(hooks);
                self.memory.set_u8(hooks, self.tos, self.nos as u8);
                self.tos = self.pop(hooks);
            }
            opcode::DIV => {
                self.nos = self.pop(hooks);
                if self.nos == 0 {
                    // result unspecified; tos keeps its value
                    return hooks.divide_by_zero(self);
                }
                self.tos = (self.tos as i32).wrapping_div(self.nos as i32) as u32;
            }
            opcode::MOD => {
                self.nos = self.pop(hooks);
                if self.nos == 0 {
                    return hooks.divide_by_zero(self);
                }
                self.tos = (self.tos as i32).wrapping_rem(self.nos as i32) as u32;
            }
            opcode::EQBRANCH => {
                self.nos = self.pop(hooks);
                if self.nos == 0 {
                    self.pc = self.pc.wrapping_add(self.tos);
                    self.pc_dirty = true;
                }
                self.tos = self.pop(hooks);
            }
            opcode::NEQBRANCH => {
                self.nos = self.pop(hooks);
                if self.nos != 0 {
                    self.pc = self.pc.wrapping_add(self.tos);
                    self.pc_dirty = true;
                }
                self.tos = self.pop(hooks);
            }
            opcode::POPPCREL => {
                self.pc = self.pc.wrapping_add(self.tos);
                self.tos = self.pop(hooks);
                self.pc_dirty = true;
            }
            opcode::CONFIG => {
                self.cpu = self.tos;
                self.tos = self.pop(hooks);
                hooks.config(self.cpu);
            }
            opcode::PUSHPC => {
                self.push(hooks, self.tos);
                self.tos = self.pc;
            }
            opcode::SYSCALL => {
                // flush the tos cache to the real stack before handing over
                self.memory.set_u32(hooks, self.sp, self.tos);
                syscalls.dispatch(&mut self.memory, hooks, self.sp);
            }
            opcode::PUSHSPADD => {
                self.tos = self.tos.wrapping_mul(4).wrapping_add(self.sp);
            }
            opcode::MULT16X16 => {
                self.nos = self.pop(hooks);
                self.tos = (self.nos & 0xFFFF).wrapping_mul(self.tos & 0xFFFF);
            }
            opcode::CALLPCREL => {
                self.nos = self.tos;
                self.tos = self.pc.wrapping_add(1);
                self.pc = self.pc.wrapping_add(self.nos);
                self.pc_dirty = true;
            }
            _ => return hooks.illegal_opcode(self),
        }
        Control::Continue
    }
}
