//! Segmented virtual memory for the ZPU.
//!
//! An address space is an ordered, append-only list of named segments, each
//! backed by a caller-allocated byte buffer and carrying access-permission
//! attributes. Lookup is first-match-wins in insertion order; overlapping
//! ranges are accepted without validation because guest programs may rely on
//! overlay semantics.
//!
//! # Byte ordering
//!
//! The ZPU is big-endian. Backing buffers hold words in host (little-endian)
//! layout; byte accessors XOR the low two address bits with `0b11` and
//! halfword accessors with `0b10` before indexing, which presents the
//! architecturally-defined byte order within each 32-bit word without
//! reformatting the storage. Word accesses use the address unmodified.
//!
//! # Faults
//!
//! A read that resolves to no segment, fails a protection check, or runs off
//! the end of a backing buffer fires the segv hook and yields the sentinel
//! [`MEM_BAD`] truncated to the access width; the matching write is a no-op.
//! The table never terminates or unwinds on a fault.

use serde::{Deserialize, Serialize};

use crate::hooks::Hooks;

/// Sentinel returned for faulting reads, truncated to the access width.
pub const MEM_BAD: u32 = 0xFEFE_FEFE;

/// Segment attribute bits.
pub mod attr {
    /// Readable.
    pub const RD: u8 = 0x01;
    /// Writable.
    pub const WR: u8 = 0x02;
    /// Executable (opcode fetch allowed).
    pub const EX: u8 = 0x04;
    /// Memory-mapped I/O region.
    pub const IO: u8 = 0x08;
}

/// One contiguous virtual address range `[virtual_base, virtual_base+size)`
/// backed by a fixed-size buffer.
#[derive(Clone, Serialize, Deserialize)]
pub struct Segment {
    name: String,
    backing: Vec<u8>,
    virtual_base: u32,
    attr: u8,
    prot_enabled: bool,
}

impl Segment {
    /// Create a segment over a caller-allocated buffer. The segment never
    /// resizes the buffer; its length fixes the segment size. Protection
    /// starts disabled.
    pub fn new(name: impl Into<String>, backing: Vec<u8>, virtual_base: u32, attr: u8) -> Self {
        Self {
            name: name.into(),
            backing,
            virtual_base,
            attr,
            prot_enabled: false,
        }
    }

    /// Diagnostic label.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn virtual_base(&self) -> u32 {
        self.virtual_base
    }

    pub fn size(&self) -> u32 {
        self.backing.len() as u32
    }

    pub fn attr(&self) -> u8 {
        self.attr
    }

    /// Enable or disable attribute checks. With protection disabled every
    /// access succeeds regardless of attributes (early-boot configurations).
    pub fn set_protection(&mut self, enabled: bool) {
        self.prot_enabled = enabled;
    }

    pub fn protection(&self) -> bool {
        self.prot_enabled
    }

    /// Whether `va` falls inside this segment's virtual range.
    pub fn contains(&self, va: u32) -> bool {
        va >= self.virtual_base && (u64::from(va) < u64::from(self.virtual_base) + self.backing.len() as u64)
    }

    fn can_read(&self) -> bool {
        !self.prot_enabled || self.attr & attr::RD != 0
    }

    fn can_write(&self) -> bool {
        !self.prot_enabled || self.attr & attr::WR != 0
    }

    fn can_fetch(&self) -> bool {
        !self.prot_enabled || (self.attr & attr::RD != 0 && self.attr & attr::EX != 0)
    }

    /// Translate a (possibly swizzled) VA to a backing-buffer offset.
    fn offset(&self, va: u32) -> Option<usize> {
        va.checked_sub(self.virtual_base).map(|delta| delta as usize)
    }

    fn read_u8(&self, va: u32) -> Option<u8> {
        let off = self.offset(va ^ 0b11)?;
        self.backing.get(off).copied()
    }

    fn read_u16(&self, va: u32) -> Option<u16> {
        let off = self.offset(va ^ 0b10)?;
        let b = self.backing.get(off..off + 2)?;
        Some(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&self, va: u32) -> Option<u32> {
        let off = self.offset(va)?;
        let b = self.backing.get(off..off + 4)?;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn write_u8(&mut self, va: u32, value: u8) -> Option<()> {
        let off = self.offset(va ^ 0b11)?;
        let slot = self.backing.get_mut(off)?;
        *slot = value;
        Some(())
    }

    fn write_u16(&mut self, va: u32, value: u16) -> Option<()> {
        let off = self.offset(va ^ 0b10)?;
        let b = self.backing.get_mut(off..off + 2)?;
        b.copy_from_slice(&value.to_le_bytes());
        Some(())
    }

    fn write_u32(&mut self, va: u32, value: u32) -> Option<()> {
        let off = self.offset(va)?;
        let b = self.backing.get_mut(off..off + 4)?;
        b.copy_from_slice(&value.to_le_bytes());
        Some(())
    }
}

/// Ordered collection of segments forming one address space.
///
/// The first segment added is the root. Segments are appended once during
/// machine setup, never removed or reordered.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MemMap {
    segments: Vec<Segment>,
}

impl MemMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment. Insertion order fixes lookup priority; overlap with
    /// existing segments is not validated (first match wins on access).
    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// The first segment in the list, if any.
    pub fn root(&self) -> Option<&Segment> {
        self.segments.first()
    }

    /// Linear scan in list order for the first segment containing `va`.
    pub fn lookup(&self, va: u32) -> Option<&Segment> {
        self.segments.iter().find(|seg| seg.contains(va))
    }

    fn lookup_idx(&self, va: u32) -> Option<usize> {
        self.segments.iter().position(|seg| seg.contains(va))
    }

    /// Read a byte at `va` (big-endian swizzle applied).
    pub fn get_u8(&self, hooks: &mut dyn Hooks, va: u32) -> u8 {
        let Some(seg) = self.lookup(va) else {
            hooks.segv(va);
            return MEM_BAD as u8;
        };
        if !seg.can_read() {
            hooks.segv(va);
            return MEM_BAD as u8;
        }
        if let Some(value) = hooks.override_get_u8(va) {
            return value;
        }
        match seg.read_u8(va) {
            Some(value) => value,
            None => {
                hooks.segv(va);
                MEM_BAD as u8
            }
        }
    }

    /// Read a halfword at `va` (big-endian swizzle applied).
    pub fn get_u16(&self, hooks: &mut dyn Hooks, va: u32) -> u16 {
        let Some(seg) = self.lookup(va) else {
            hooks.segv(va);
            return MEM_BAD as u16;
        };
        if !seg.can_read() {
            hooks.segv(va);
            return MEM_BAD as u16;
        }
        if let Some(value) = hooks.override_get_u16(va) {
            return value;
        }
        match seg.read_u16(va) {
            Some(value) => value,
            None => {
                hooks.segv(va);
                MEM_BAD as u16
            }
        }
    }

    /// Read a word at `va`.
    pub fn get_u32(&self, hooks: &mut dyn Hooks, va: u32) -> u32 {
        let Some(seg) = self.lookup(va) else {
            hooks.segv(va);
            return MEM_BAD;
        };
        if !seg.can_read() {
            hooks.segv(va);
            return MEM_BAD;
        }
        if let Some(value) = hooks.override_get_u32(va) {
            return value;
        }
        match seg.read_u32(va) {
            Some(value) => value,
            None => {
                hooks.segv(va);
                MEM_BAD
            }
        }
    }

    /// Fetch an opcode byte at `va`. Requires both read and execute
    /// permission when protection is enabled and fires the fetch-notify hook
    /// on every successful fetch.
    pub fn get_opcode(&self, hooks: &mut dyn Hooks, va: u32) -> u8 {
        let Some(seg) = self.lookup(va) else {
            hooks.segv(va);
            return MEM_BAD as u8;
        };
        if !seg.can_fetch() {
            hooks.segv(va);
            return MEM_BAD as u8;
        }
        hooks.opcode_fetch(va);
        match seg.read_u8(va) {
            Some(value) => value,
            None => {
                hooks.segv(va);
                MEM_BAD as u8
            }
        }
    }

    /// Write a byte at `va` (big-endian swizzle applied).
    pub fn set_u8(&mut self, hooks: &mut dyn Hooks, va: u32, value: u8) {
        let Some(idx) = self.lookup_idx(va) else {
            hooks.segv(va);
            return;
        };
        if !self.segments[idx].can_write() {
            hooks.segv(va);
            return;
        }
        if hooks.override_set_u8(va, value) {
            return;
        }
        if self.segments[idx].write_u8(va, value).is_none() {
            hooks.segv(va);
        }
    }

    /// Write a halfword at `va` (big-endian swizzle applied).
    pub fn set_u16(&mut self, hooks: &mut dyn Hooks, va: u32, value: u16) {
        let Some(idx) = self.lookup_idx(va) else {
            hooks.segv(va);
            return;
        };
        if !self.segments[idx].can_write() {
            hooks.segv(va);
            return;
        }
        if hooks.override_set_u16(va, value) {
            return;
        }
        if self.segments[idx].write_u16(va, value).is_none() {
            hooks.segv(va);
        }
    }

    /// Write a word at `va`.
    pub fn set_u32(&mut self, hooks: &mut dyn Hooks, va: u32, value: u32) {
        let Some(idx) = self.lookup_idx(va) else {
            hooks.segv(va);
            return;
        };
        if !self.segments[idx].can_write() {
            hooks.segv(va);
            return;
        }
        if hooks.override_set_u32(va, value) {
            return;
        }
        if self.segments[idx].write_u32(va, value).is_none() {
            hooks.segv(va);
        }
    }
}
