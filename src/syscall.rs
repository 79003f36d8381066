//! Syscall dispatch for guest programs.
//!
//! The SYSCALL opcode flushes the top-of-stack cache to memory and hands the
//! dispatcher the stack pointer. The syscall frame lives on the data stack:
//!
//! - `sp + 8`: syscall id
//! - `sp + 16`: buffer virtual address
//! - `sp + 20`: length in bytes
//!
//! Recognized calls stream bytes one at a time through the segment table (so
//! protection and override hooks apply) and report the transferred length by
//! writing it to virtual address 0, the guest ABI's return-value slot.

use std::io::{self, Read, Write};

use crate::hooks::Hooks;
use crate::memory::MemMap;

/// Read a byte stream from the host into guest memory.
pub const SYS_READ: u32 = 4;
/// Write a byte stream from guest memory to the host.
pub const SYS_WRITE: u32 = 5;

/// Invoked once per SYSCALL opcode with the current stack pointer.
pub trait SyscallDispatcher {
    fn dispatch(&mut self, memory: &mut MemMap, hooks: &mut dyn Hooks, sp: u32);
}

/// Dispatcher wired to the host terminal: SYS_WRITE to stdout, SYS_READ from
/// stdin. Unrecognized ids are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct Console;

impl SyscallDispatcher for Console {
    fn dispatch(&mut self, memory: &mut MemMap, hooks: &mut dyn Hooks, sp: u32) {
        let id = memory.get_u32(hooks, sp.wrapping_add(8));
        let buffer = memory.get_u32(hooks, sp.wrapping_add(16));
        let length = memory.get_u32(hooks, sp.wrapping_add(20));

        match id {
            SYS_WRITE => {
                let mut out = io::stdout().lock();
                for i in 0..length {
                    let byte = memory.get_u8(hooks, buffer.wrapping_add(i));
                    let _ = out.write_all(&[byte]);
                }
                let _ = out.flush();
                memory.set_u32(hooks, 0, length);
            }
            SYS_READ => {
                let mut input = io::stdin().lock();
                for i in 0..length {
                    let mut byte = [0u8; 1];
                    if input.read_exact(&mut byte).is_err() {
                        byte[0] = 0;
                    }
                    memory.set_u8(hooks, buffer.wrapping_add(i), byte[0]);
                }
                memory.set_u32(hooks, 0, length);
            }
            _ => {}
        }
    }
}
