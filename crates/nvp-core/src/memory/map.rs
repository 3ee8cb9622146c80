//! Physical memory-region map and layout validation.

use thiserror::Error;

/// Default base address of the code region.
pub const DEFAULT_CODE_BASE: u32 = 0x0000_0000;
/// Default size in bytes of the code region (1 MiB).
pub const DEFAULT_CODE_SIZE: u32 = 0x0010_0000;
/// Default base address of the data region.
pub const DEFAULT_DATA_BASE: u32 = 0x4000_0000;
/// Default size in bytes of the data region (1 MiB).
pub const DEFAULT_DATA_SIZE: u32 = 0x0010_0000;

/// Region classification for mapped addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Instruction memory, read-only after load.
    Code,
    /// Data memory, read-write.
    Data,
}

/// Half-open `[base, base + size)` region of the physical address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionDescriptor {
    /// Region classification.
    pub kind: RegionKind,
    /// First mapped address.
    pub base: u32,
    /// Region size in bytes.
    pub size: u32,
}

impl RegionDescriptor {
    /// Returns `true` when `addr` falls inside this region.
    #[must_use]
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.base && (addr - self.base) < self.size
    }

    /// Returns the byte offset of `addr` into this region's backing store.
    #[must_use]
    pub const fn offset_of(&self, addr: u32) -> Option<usize> {
        if self.contains(addr) {
            Some((addr - self.base) as usize)
        } else {
            None
        }
    }
}

/// Rejected memory layout configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LayoutError {
    /// A region has zero size.
    #[error("{0:?} region has zero size")]
    EmptyRegion(RegionKind),
    /// A region base or size is not word-aligned.
    #[error("{0:?} region is not word-aligned")]
    MisalignedRegion(RegionKind),
    /// A region wraps past the end of the 32-bit address space.
    #[error("{0:?} region wraps the address space")]
    RegionOverflow(RegionKind),
    /// The code and data regions overlap.
    #[error("code and data regions overlap")]
    OverlappingRegions,
}

/// Placement of the two mapped regions in the flat address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryLayout {
    /// Code region descriptor.
    pub code: RegionDescriptor,
    /// Data region descriptor.
    pub data: RegionDescriptor,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            code: RegionDescriptor {
                kind: RegionKind::Code,
                base: DEFAULT_CODE_BASE,
                size: DEFAULT_CODE_SIZE,
            },
            data: RegionDescriptor {
                kind: RegionKind::Data,
                base: DEFAULT_DATA_BASE,
                size: DEFAULT_DATA_SIZE,
            },
        }
    }
}

impl MemoryLayout {
    /// Builds a validated layout from raw region bounds.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError`] when either region is empty, misaligned,
    /// wraps the address space, or the regions overlap.
    pub fn new(
        code_base: u32,
        code_size: u32,
        data_base: u32,
        data_size: u32,
    ) -> Result<Self, LayoutError> {
        let code = RegionDescriptor {
            kind: RegionKind::Code,
            base: code_base,
            size: code_size,
        };
        let data = RegionDescriptor {
            kind: RegionKind::Data,
            base: data_base,
            size: data_size,
        };

        for region in [code, data] {
            if region.size == 0 {
                return Err(LayoutError::EmptyRegion(region.kind));
            }
            if region.base % 4 != 0 || region.size % 4 != 0 {
                return Err(LayoutError::MisalignedRegion(region.kind));
            }
            if region.base.checked_add(region.size - 1).is_none() {
                return Err(LayoutError::RegionOverflow(region.kind));
            }
        }

        let overlaps = code.base < data.base + data.size && data.base < code.base + code.size;
        if overlaps {
            return Err(LayoutError::OverlappingRegions);
        }

        Ok(Self { code, data })
    }

    /// Classifies a mapped address, or `None` for a bus fault.
    #[must_use]
    pub fn region_of(&self, addr: u32) -> Option<RegionKind> {
        if self.code.contains(addr) {
            Some(RegionKind::Code)
        } else if self.data.contains(addr) {
            Some(RegionKind::Data)
        } else {
            None
        }
    }
}
