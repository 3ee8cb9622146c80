//! Flat two-region physical memory with word-granular access primitives.
//!
//! The memory interface is 32-bit and word-aligned; sub-word loads and
//! stores are composed at the executor layer from word operations.

/// Region map and layout validation.
pub mod map;

pub use map::{
    LayoutError, MemoryLayout, RegionDescriptor, RegionKind, DEFAULT_CODE_BASE, DEFAULT_CODE_SIZE,
    DEFAULT_DATA_BASE, DEFAULT_DATA_SIZE,
};

use crate::fault::FaultCode;

/// Distinguishes a genuine read from the read half of a sub-word
/// read-modify-write.
///
/// Real hardware performs lane-enabled writes; the word-granular
/// read-modify-write is a simulator artifact, and observers (tracing,
/// idempotency-tracking schemes) must not mistake the internal read for a
/// program load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    /// Program-visible load.
    Read,
    /// Internal read feeding a masked word store.
    ReadModifyWrite,
}

/// One program-visible memory access, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    /// Word-aligned access address.
    pub addr: u32,
    /// `true` for stores, `false` for loads.
    pub is_write: bool,
    /// Word value before the access.
    pub old_word: u32,
    /// Word value after the access (equal to `old_word` for loads).
    pub new_word: u32,
}

/// Flat physical memory: a read-only code region and a read-write data
/// region.
#[derive(Debug, Clone)]
pub struct Memory {
    layout: MemoryLayout,
    code: Box<[u8]>,
    data: Box<[u8]>,
    access_log: Option<Vec<MemoryAccess>>,
}

impl Memory {
    /// Allocates zeroed backing stores for a layout.
    #[must_use]
    pub fn new(layout: MemoryLayout) -> Self {
        Self {
            layout,
            code: vec![0; layout.code.size as usize].into_boxed_slice(),
            data: vec![0; layout.data.size as usize].into_boxed_slice(),
            access_log: None,
        }
    }

    /// Returns the region layout.
    #[must_use]
    pub const fn layout(&self) -> MemoryLayout {
        self.layout
    }

    /// Starts recording program-visible data accesses.
    ///
    /// Recording is off by default; schemes that track access patterns turn
    /// it on and drain the log once per instruction via [`take_accesses`].
    ///
    /// [`take_accesses`]: Self::take_accesses
    pub fn enable_access_log(&mut self) {
        if self.access_log.is_none() {
            self.access_log = Some(Vec::new());
        }
    }

    /// Drains the recorded accesses in execution order.
    #[must_use]
    pub fn take_accesses(&mut self) -> Vec<MemoryAccess> {
        match self.access_log.as_mut() {
            Some(log) => std::mem::take(log),
            None => Vec::new(),
        }
    }

    /// Loads a word.
    ///
    /// # Errors
    ///
    /// [`FaultCode::UnalignedAccess`] when `addr` is not word-aligned;
    /// [`FaultCode::BusFault`] when `addr` is outside both mapped regions.
    pub fn load(&mut self, addr: u32, kind: LoadKind) -> Result<u32, FaultCode> {
        if addr % 4 != 0 {
            return Err(FaultCode::UnalignedAccess { addr });
        }

        let word = match self.layout.region_of(addr) {
            Some(RegionKind::Code) => {
                let offset = self.layout.code.offset_of(addr).unwrap_or_default();
                read_word(&self.code, offset)
            }
            Some(RegionKind::Data) => {
                let offset = self.layout.data.offset_of(addr).unwrap_or_default();
                read_word(&self.data, offset)
            }
            None => return Err(FaultCode::BusFault { addr }),
        };

        if kind == LoadKind::Read {
            if let Some(log) = self.access_log.as_mut() {
                log.push(MemoryAccess {
                    addr,
                    is_write: false,
                    old_word: word,
                    new_word: word,
                });
            }
        }

        Ok(word)
    }

    /// Stores a word to the data region.
    ///
    /// # Errors
    ///
    /// [`FaultCode::UnalignedAccess`] when `addr` is not word-aligned;
    /// [`FaultCode::CodeRegionStore`] when `addr` maps to the code region;
    /// [`FaultCode::BusFault`] when `addr` is unmapped.
    pub fn store(&mut self, addr: u32, word: u32) -> Result<(), FaultCode> {
        if addr % 4 != 0 {
            return Err(FaultCode::UnalignedAccess { addr });
        }

        let offset = match self.layout.region_of(addr) {
            Some(RegionKind::Data) => self.layout.data.offset_of(addr).unwrap_or_default(),
            Some(RegionKind::Code) => return Err(FaultCode::CodeRegionStore { addr }),
            None => return Err(FaultCode::BusFault { addr }),
        };

        let old_word = read_word(&self.data, offset);
        write_word(&mut self.data, offset, word);

        if let Some(log) = self.access_log.as_mut() {
            log.push(MemoryAccess {
                addr,
                is_write: true,
                old_word,
                new_word: word,
            });
        }

        Ok(())
    }

    /// Fetches one instruction halfword from the code region.
    ///
    /// # Errors
    ///
    /// [`FaultCode::UnalignedFetch`] when `addr` is odd;
    /// [`FaultCode::BusFault`] when `addr` is outside the code region.
    pub fn fetch_halfword(&self, addr: u32) -> Result<u16, FaultCode> {
        if addr % 2 != 0 {
            return Err(FaultCode::UnalignedFetch { addr });
        }

        let offset = self
            .layout
            .code
            .offset_of(addr)
            .ok_or(FaultCode::BusFault { addr })?;
        if offset + 1 >= self.code.len() {
            return Err(FaultCode::BusFault { addr });
        }

        Ok(u16::from_le_bytes([self.code[offset], self.code[offset + 1]]))
    }

    /// Copies a program image into the code region. Loader-only entry point;
    /// the region is read-only through [`store`].
    ///
    /// # Errors
    ///
    /// [`FaultCode::BusFault`] when the image does not fit inside the code
    /// region at `addr`.
    ///
    /// [`store`]: Self::store
    pub fn write_code(&mut self, addr: u32, image: &[u8]) -> Result<(), FaultCode> {
        let offset = self
            .layout
            .code
            .offset_of(addr)
            .ok_or(FaultCode::BusFault { addr })?;
        let end = offset
            .checked_add(image.len())
            .filter(|end| *end <= self.code.len())
            .ok_or(FaultCode::BusFault { addr })?;

        self.code[offset..end].copy_from_slice(image);
        Ok(())
    }

    /// Copies an initialized-data image into the data region (loader-only).
    ///
    /// # Errors
    ///
    /// [`FaultCode::BusFault`] when the image does not fit inside the data
    /// region at `addr`.
    pub fn write_data(&mut self, addr: u32, image: &[u8]) -> Result<(), FaultCode> {
        let offset = self
            .layout
            .data
            .offset_of(addr)
            .ok_or(FaultCode::BusFault { addr })?;
        let end = offset
            .checked_add(image.len())
            .filter(|end| *end <= self.data.len())
            .ok_or(FaultCode::BusFault { addr })?;

        self.data[offset..end].copy_from_slice(image);
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(MemoryLayout::default())
    }
}

fn read_word(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn write_word(bytes: &mut [u8], offset: usize, word: u32) {
    bytes[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
}
