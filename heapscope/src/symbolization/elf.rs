//! ELF symbol table extraction
//!
//! Reads the link-time values of function and data symbols from one ELF
//! image. Relocation to runtime addresses happens in
//! [`SymbolTable`](super::SymbolTable), which knows where the image is mapped.

use crate::domain::ElfError;
use object::elf;
use object::read::elf::{FileHeader, ProgramHeader, Sym};
use object::Endianness;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const IDENT_LEN: usize = 16;
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const EI_VERSION: usize = 6;
/// Loader mapping granularity
const PAGE_SIZE: u64 = 0x1000;

/// Function and data symbols of one ELF image, unrelocated.
#[derive(Debug, Clone, Default)]
pub struct ElfSymbols {
    symbols: HashMap<String, u64>,
    /// Page-aligned lowest loadable virtual address
    link_base: u64,
}

impl ElfSymbols {
    /// Read and parse the image at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a supported ELF image
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ElfError> {
        let data = fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    /// Parse an in-memory ELF image
    ///
    /// The identification bytes are checked first so that unsupported classes,
    /// encodings and versions are reported as such rather than as parse noise.
    ///
    /// # Errors
    /// Returns an error for anything other than a version 1 ELF32/ELF64 image
    /// in either byte order, or for malformed headers and tables.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        if data.len() < IDENT_LEN || data[..4] != elf::ELFMAG {
            return Err(ElfError::BadMagic);
        }
        let encoding = data[EI_DATA];
        if encoding != elf::ELFDATA2LSB && encoding != elf::ELFDATA2MSB {
            return Err(ElfError::UnsupportedEncoding(encoding));
        }
        let version = data[EI_VERSION];
        if version != elf::EV_CURRENT {
            return Err(ElfError::UnsupportedVersion(version));
        }
        match data[EI_CLASS] {
            elf::ELFCLASS32 => parse_image::<elf::FileHeader32<Endianness>>(data),
            elf::ELFCLASS64 => parse_image::<elf::FileHeader64<Endianness>>(data),
            class => Err(ElfError::UnsupportedClass(class)),
        }
    }

    /// Link-time value of `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    #[must_use]
    pub fn link_base(&self) -> u64 {
        self.link_base
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.symbols.iter().map(|(name, &value)| (name.as_str(), value))
    }
}

fn parse_image<Elf: FileHeader<Endian = Endianness>>(data: &[u8]) -> Result<ElfSymbols, ElfError> {
    let header = Elf::parse(data)?;
    let endian = header.endian()?;

    // The first mapping starts at the page holding the lowest loadable address.
    let link_base = header
        .program_headers(endian, data)?
        .iter()
        .filter(|segment| segment.p_type(endian) == elf::PT_LOAD)
        .map(|segment| -> u64 { segment.p_vaddr(endian).into() })
        .min()
        .map_or(0, |vaddr| vaddr & !(PAGE_SIZE - 1));

    let sections = header.sections(endian, data)?;
    let mut table = sections.symbols(endian, data, elf::SHT_SYMTAB)?;
    if table.is_empty() {
        table = sections.symbols(endian, data, elf::SHT_DYNSYM)?;
    }

    let mut symbols = HashMap::new();
    for symbol in table.symbols() {
        let kind = symbol.st_type();
        if kind != elf::STT_FUNC && kind != elf::STT_OBJECT {
            continue;
        }
        let value: u64 = symbol.st_value(endian).into();
        if value == 0 {
            continue;
        }
        let name = table.symbol_name(endian, symbol)?;
        if name.is_empty() {
            continue;
        }
        let Ok(name) = std::str::from_utf8(name) else {
            continue;
        };
        // Local symbols may repeat across translation units; keep the first.
        symbols.entry(name.to_owned()).or_insert(value);
    }

    Ok(ElfSymbols { symbols, link_base })
}
