//! Configuration-stage errors. Everything here is reported before the
//! driver starts and maps to exit code 2.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling a simulation from its inputs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command line did not parse.
    #[error("{0}")]
    Usage(String),
    /// The requested policy name is not registered.
    #[error("unknown policy '{0}' (known: odab, clank)")]
    UnknownPolicy(String),
    /// Program image could not be read from disk.
    #[error("cannot read program image {path}: {source}")]
    ProgramRead {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Program image is ELF but malformed or unloadable.
    #[error("malformed elf image: {0}")]
    MalformedElf(String),
    /// A loadable segment falls outside the memory map.
    #[error("segment at {addr:#010X} ({len} bytes) does not fit the memory map")]
    ImageOverflow {
        /// Segment load address.
        addr: u32,
        /// Segment length in bytes.
        len: usize,
    },
    /// Power trace could not be read from disk.
    #[error("cannot read power trace {path}: {source}")]
    TraceRead {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Power trace contained a non-numeric, negative, or non-finite sample.
    #[error("malformed power trace: {0}")]
    MalformedTrace(String),
    /// Power trace is shorter than the simulated cycle budget.
    #[error("power trace covers {samples} cycles but the budget is {budget}")]
    TraceTooShort {
        /// Samples available in the trace.
        samples: usize,
        /// Requested cycle budget.
        budget: u64,
    },
    /// Report could not be written.
    #[error("cannot write report: {0}")]
    ReportWrite(#[from] io::Error),
}
