//! zpu-core: emulator for the ZPU 32-bit stack-machine architecture.
//!
//! This crate provides:
//! - A decode-execute engine with a cached top-of-stack register
//! - Segmented virtual memory with protection checks and device-override hooks
//! - A pluggable host hook interface (breakpoints, faults, memory overrides)
//! - Syscall dispatch and a raw program-image loader

pub mod cpu;
pub mod decode;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod memory;
pub mod syscall;

pub use cpu::Cpu;
pub use error::ZpuError;
pub use hooks::{Control, Hooks, NopHooks};
pub use loader::load_image;
pub use memory::{attr, MemMap, Segment, MEM_BAD};
pub use syscall::{Console, SyscallDispatcher, SYS_READ, SYS_WRITE};
