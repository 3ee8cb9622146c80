use thiserror::Error;

/// Fault classes used for diagnostics aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Decoder produced no valid instruction for the fetched encoding.
    Decode,
    /// Memory alignment or mapping violation.
    Memory,
    /// Instruction-level semantic violation caught at execution time.
    Execute,
}

/// Fatal simulated faults.
///
/// Every variant terminates the simulation; the driver attaches the cycle
/// number and program counter before reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultCode {
    /// Fetched halfword does not decode to a supported instruction.
    #[error("undefined instruction encoding {encoding:#06X}")]
    UndefinedInstruction {
        /// Raw 16-bit encoding that failed to decode.
        encoding: u16,
    },
    /// Word access used a non-word-aligned address.
    #[error("unaligned word access at {addr:#010X}")]
    UnalignedAccess {
        /// Offending address.
        addr: u32,
    },
    /// Instruction fetch used a non-halfword-aligned address.
    #[error("unaligned instruction fetch at {addr:#010X}")]
    UnalignedFetch {
        /// Offending address.
        addr: u32,
    },
    /// Access targeted an address outside the code and data regions.
    #[error("bus fault at {addr:#010X}")]
    BusFault {
        /// Offending address.
        addr: u32,
    },
    /// Store targeted the read-only code region.
    #[error("store to code region at {addr:#010X}")]
    CodeRegionStore {
        /// Offending address.
        addr: u32,
    },
    /// PC was written with the Thumb bit (bit 0) clear.
    #[error("pc written with thumb bit clear: {value:#010X}")]
    PcAlignment {
        /// Value that was written to PC.
        value: u32,
    },
    /// STM listed its base register in the register list.
    #[error("store-multiple lists its base register r{base}")]
    MalformedStoreMultiple {
        /// Base register index of the offending STM.
        base: u8,
    },
}

impl FaultCode {
    /// Returns the diagnostics class for this fault.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::UndefinedInstruction { .. } => FaultClass::Decode,
            Self::UnalignedAccess { .. }
            | Self::UnalignedFetch { .. }
            | Self::BusFault { .. }
            | Self::CodeRegionStore { .. } => FaultClass::Memory,
            Self::PcAlignment { .. } | Self::MalformedStoreMultiple { .. } => FaultClass::Execute,
        }
    }
}
