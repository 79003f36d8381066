//! Raw program-image loading.
//!
//! A ZPU program image is a flat byte stream compiled for the architecture's
//! big-endian address space. It is copied into the root segment starting at
//! that segment's virtual base, stopping at end-of-image or segment capacity,
//! whichever comes first; the rest of the segment keeps whatever it was
//! initialized to. Bytes go through the table's byte accessor so the
//! big-endian swizzle applies, matching what the opcode-fetch path will read
//! back.

use tracing::info;

use crate::error::ZpuError;
use crate::hooks::Hooks;
use crate::memory::MemMap;

/// Copy `image` into the root segment. Returns the number of bytes loaded.
pub fn load_image(
    memory: &mut MemMap,
    hooks: &mut dyn Hooks,
    image: &[u8],
) -> Result<u32, ZpuError> {
    let (base, capacity) = {
        let root = memory.root().ok_or(ZpuError::NoRootSegment)?;
        (root.virtual_base(), root.size() as usize)
    };
    let count = image.len().min(capacity);
    for (i, &byte) in image[..count].iter().enumerate() {
        memory.set_u8(hooks, base.wrapping_add(i as u32), byte);
    }
    info!(bytes = count, base, "loaded program image");
    Ok(count as u32)
}
