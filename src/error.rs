//! Host-facing errors.
//!
//! Guest-visible fault conditions (segmentation fault, illegal opcode,
//! divide by zero, breakpoint) are not errors here; they are delegated to the
//! hook interface. This type covers the host concerns around bringing a
//! machine up.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZpuError {
    #[error("memory map has no segments to load into")]
    NoRootSegment,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
