//! Program image loading: flat binaries and ELF executables.
//!
//! A flat binary is copied to the base of the code region and enters at
//! 0x8000; an ELF image (detected by magic) loads each `PT_LOAD` segment
//! into whichever region maps it and enters at the header entry point.

use std::fs;
use std::path::Path;

use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use log::debug;
use nvp_core::{Memory, RegionKind};

use crate::errors::ConfigError;

/// Entry point used for flat binary images.
pub const FLAT_ENTRY: u32 = 0x8000;

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// A program image applied to memory, plus its entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedProgram {
    /// Initial program counter.
    pub entry: u32,
}

/// Reads a program from `path` and loads it into `mem`.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, the ELF is
/// malformed, or a segment does not fit the memory map.
pub fn load_program(path: &Path, mem: &mut Memory) -> Result<LoadedProgram, ConfigError> {
    let image = fs::read(path).map_err(|source| ConfigError::ProgramRead {
        path: path.to_path_buf(),
        source,
    })?;

    if image.len() >= ELF_MAGIC.len() && image[..ELF_MAGIC.len()] == ELF_MAGIC {
        load_elf(&image, mem)
    } else {
        load_flat(&image, mem)
    }
}

fn load_flat(image: &[u8], mem: &mut Memory) -> Result<LoadedProgram, ConfigError> {
    let base = mem.layout().code.base;
    debug!("loading flat image: {} bytes at {base:#010X}", image.len());

    mem.write_code(base, image)
        .map_err(|_| ConfigError::ImageOverflow {
            addr: base,
            len: image.len(),
        })?;

    Ok(LoadedProgram { entry: FLAT_ENTRY })
}

fn load_elf(image: &[u8], mem: &mut Memory) -> Result<LoadedProgram, ConfigError> {
    let elf = Elf::parse(image).map_err(|error| ConfigError::MalformedElf(error.to_string()))?;

    for header in elf.program_headers.iter().filter(|h| h.p_type == PT_LOAD) {
        if header.p_filesz == 0 {
            continue;
        }

        let addr = u32::try_from(header.p_vaddr)
            .map_err(|_| ConfigError::MalformedElf(format!("segment above 4 GiB: {:#X}", header.p_vaddr)))?;
        let range = header.file_range();
        let bytes = image
            .get(range.clone())
            .ok_or_else(|| ConfigError::MalformedElf(format!("segment range {range:?} outside file")))?;

        debug!("loading elf segment: {} bytes at {addr:#010X}", bytes.len());

        let write: fn(&mut Memory, u32, &[u8]) -> Result<(), nvp_core::FaultCode> =
            match mem.layout().region_of(addr) {
                Some(RegionKind::Code) => Memory::write_code,
                Some(RegionKind::Data) => Memory::write_data,
                None => {
                    return Err(ConfigError::ImageOverflow {
                        addr,
                        len: bytes.len(),
                    })
                }
            };
        write(mem, addr, bytes).map_err(|_| ConfigError::ImageOverflow {
            addr,
            len: bytes.len(),
        })?;
    }

    let entry = u32::try_from(elf.entry)
        .map_err(|_| ConfigError::MalformedElf(format!("entry above 4 GiB: {:#X}", elf.entry)))?;

    Ok(LoadedProgram { entry })
}
