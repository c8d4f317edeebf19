//! Fake cross toolchain for tests.
//!
//! Records every invocation and produces real ELF objects through `object`'s
//! writer, so the read-back checks run against genuine files:
//! - compiler: `.text` = forced-include bytes followed by the source bytes
//! - linker: `.text` = the inputs' `.text`/`.data` bytes in command-line
//!   order, entry symbol at the `-Ttext` address, `_binary_*` symbols
//!   carried over at their new offsets
//! - objcopy `-O binary`: the input's `.text` bytes
//! - objcopy `-I binary`: `.data` = the input bytes, plus the
//!   `_binary_<stem>_{start,end,size}` symbols

use std::cell::RefCell;
use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use object::elf;
use object::write::elf::{FileHeader, SectionHeader, Sym, Writer};
use object::write::{Object as WriteObject, Symbol, SymbolSection};
use object::{
    Architecture, BinaryFormat, Endianness, Object, ObjectSection, ObjectSymbol, SectionKind,
    SymbolFlags, SymbolKind, SymbolScope,
};

use crate::error::BuildError;
use crate::extract::binary_symbol_stem;
use crate::invoke::{Tool, ToolInvocation, ToolRunner};

/// A symbol placed in the fake object's `.text` section.
#[derive(Debug, Clone)]
pub(crate) struct FakeSymbol {
    name: String,
    value: u64,
}

impl FakeSymbol {
    pub(crate) fn text(name: &str, value: u64) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

fn new_object() -> WriteObject<'static> {
    WriteObject::new(BinaryFormat::Elf, Architecture::Arm, Endianness::Little)
}

fn symbol(name: &str, value: u64, kind: SymbolKind, section: SymbolSection) -> Symbol {
    Symbol {
        name: name.as_bytes().to_vec(),
        value,
        size: 0,
        kind,
        scope: SymbolScope::Linkage,
        weak: false,
        section,
        flags: SymbolFlags::None,
    }
}

/// Write an ARM ELF object whose `.text` holds `text`.
pub(crate) fn write_elf(path: &Path, text: &[u8], symbols: &[FakeSymbol]) {
    let mut obj = new_object();
    let section = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.append_section_data(section, text, 4);
    for sym in symbols {
        obj.add_symbol(symbol(
            &sym.name,
            sym.value,
            SymbolKind::Text,
            SymbolSection::Section(section),
        ));
    }
    fs::write(path, obj.write().unwrap()).unwrap();
}

/// Write an ARM ET_EXEC image with `text` loaded at `load`, a global `symbol`
/// at `symbol_value`, and `entry` as the ELF header entry point.
pub(crate) fn write_executable(
    path: &Path,
    text: &[u8],
    load: u64,
    symbol: &str,
    symbol_value: u64,
    entry: u64,
) {
    let mut buffer = Vec::new();
    let mut writer = Writer::new(Endianness::Little, false, &mut buffer);

    writer.reserve_file_header();
    writer.reserve_null_section_index();
    let text_name = writer.add_section_name(b".text");
    let text_index = writer.reserve_section_index();
    let symbol_name = writer.add_string(symbol.as_bytes());
    writer.reserve_null_symbol_index();
    writer.reserve_symbol_index(Some(text_index));
    writer.reserve_symtab_section_index();
    writer.reserve_strtab_section_index();
    writer.reserve_shstrtab_section_index();

    let text_offset = writer.reserve(text.len(), 4);
    writer.reserve_symtab();
    writer.reserve_strtab();
    writer.reserve_shstrtab();
    writer.reserve_section_headers();

    writer
        .write_file_header(&FileHeader {
            os_abi: elf::ELFOSABI_NONE,
            abi_version: 0,
            e_type: elf::ET_EXEC,
            e_machine: elf::EM_ARM,
            e_entry: entry,
            e_flags: 0,
        })
        .unwrap();
    writer.pad_until(text_offset);
    writer.write(text);

    writer.write_null_symbol();
    writer.write_symbol(&Sym {
        name: Some(symbol_name),
        section: Some(text_index),
        st_info: (elf::STB_GLOBAL << 4) | elf::STT_FUNC,
        st_other: elf::STV_DEFAULT,
        st_shndx: 0,
        st_value: symbol_value,
        st_size: 0,
    });
    writer.write_strtab();
    writer.write_shstrtab();

    writer.write_null_section_header();
    writer.write_section_header(&SectionHeader {
        name: Some(text_name),
        sh_type: elf::SHT_PROGBITS,
        sh_flags: u64::from(elf::SHF_ALLOC | elf::SHF_EXECINSTR),
        sh_addr: load,
        sh_offset: text_offset as u64,
        sh_size: text.len() as u64,
        sh_link: 0,
        sh_info: 0,
        sh_addralign: 4,
        sh_entsize: 0,
    });
    writer.write_symtab_section_header(1);
    writer.write_strtab_section_header();
    writer.write_shstrtab_section_header();

    fs::write(path, buffer).unwrap();
}

/// Write the object `objcopy -I binary` would make from `bytes`.
fn write_wrapped(path: &Path, bytes: &[u8], stem: &str) {
    let mut obj = new_object();
    let section = obj.add_section(Vec::new(), b".data".to_vec(), SectionKind::Data);
    obj.append_section_data(section, bytes, 1);
    let len = bytes.len() as u64;
    for (suffix, value, placement) in [
        ("start", 0, SymbolSection::Section(section)),
        ("end", len, SymbolSection::Section(section)),
        ("size", len, SymbolSection::Absolute),
    ] {
        obj.add_symbol(symbol(
            &format!("_binary_{stem}_{suffix}"),
            value,
            SymbolKind::Data,
            placement,
        ));
    }
    fs::write(path, obj.write().unwrap()).unwrap();
}

/// Loadable bytes of an object plus its `_binary_*` symbols, offsets
/// relative to the start of those bytes.
fn read_image(path: &Path) -> Option<(Vec<u8>, Vec<(String, u64)>)> {
    let data = fs::read(path).ok()?;
    let file = object::File::parse(&*data).ok()?;

    let mut bytes = Vec::new();
    let mut placed = Vec::new();
    for section in file.sections() {
        if matches!(section.name(), Ok(".text") | Ok(".data")) {
            placed.push((section.index(), bytes.len() as u64));
            bytes.extend_from_slice(section.data().ok()?);
        }
    }

    let mut symbols = Vec::new();
    for sym in file.symbols() {
        let Ok(name) = sym.name() else { continue };
        if !name.starts_with("_binary_") {
            continue;
        }
        let Some(index) = sym.section_index() else { continue };
        if let Some((_, base)) = placed.iter().find(|(i, _)| *i == index) {
            symbols.push((name.to_string(), base + sym.address()));
        }
    }
    Some((bytes, symbols))
}

/// A [`ToolRunner`] standing in for the ARM cross toolchain.
#[derive(Debug, Default)]
pub(crate) struct FakeToolchain {
    invocations: RefCell<Vec<ToolInvocation>>,
    fail_at: Option<usize>,
    entry_skew: u64,
}

impl FakeToolchain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make the `index`-th invocation (0-based) exit non-zero.
    pub(crate) fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Place the entry symbol `skew` bytes past the load address.
    pub(crate) fn misplace_entry_by(mut self, skew: u64) -> Self {
        self.entry_skew = skew;
        self
    }

    pub(crate) fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.borrow().clone()
    }

    /// Write an object file as the fake compiler would.
    pub(crate) fn write_object(&self, path: &Path, text: &[u8]) {
        write_elf(path, text, &[]);
    }

    fn failed(inv: &ToolInvocation) -> BuildError {
        BuildError::ToolFailed {
            tool: inv.tool,
            program: inv.program.clone(),
            status: ExitStatus::from_raw(1 << 8),
        }
    }

    fn required(inv: &ToolInvocation, flag: &str) -> Result<PathBuf, BuildError> {
        inv.flag_value(flag)
            .map(PathBuf::from)
            .ok_or_else(|| Self::failed(inv))
    }

    fn compile(&self, inv: &ToolInvocation) -> Result<(), BuildError> {
        let source = Self::required(inv, "-c")?;
        let output = Self::required(inv, "-o")?;

        let mut text = Vec::new();
        if let Some(header) = inv.flag_value("-include") {
            text.extend(fs::read(header).map_err(|_| Self::failed(inv))?);
        }
        text.extend(fs::read(&source).map_err(|_| Self::failed(inv))?);
        write_elf(&output, &text, &[]);
        Ok(())
    }

    fn link(&self, inv: &ToolInvocation) -> Result<(), BuildError> {
        let output = Self::required(inv, "-o")?;
        let entry = inv
            .flag_value("-e")
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Self::failed(inv))?;
        let load_address = inv
            .args
            .iter()
            .filter_map(|a| a.to_str()?.strip_prefix("-Ttext=0x"))
            .find_map(|hex| u64::from_str_radix(hex, 16).ok())
            .ok_or_else(|| Self::failed(inv))?;

        let mut text = Vec::new();
        let mut symbols = vec![FakeSymbol::text(&entry, load_address + self.entry_skew)];
        for input in inv.args.iter().filter(|a| a.to_string_lossy().ends_with(".o")) {
            let (bytes, carried) = read_image(Path::new(input)).ok_or_else(|| Self::failed(inv))?;
            let base = text.len() as u64;
            symbols.extend(
                carried
                    .into_iter()
                    .map(|(name, offset)| FakeSymbol::text(&name, base + offset)),
            );
            text.extend(bytes);
        }

        write_elf(&output, &text, &symbols);
        Ok(())
    }

    fn objcopy(&self, inv: &ToolInvocation) -> Result<(), BuildError> {
        let positional: Vec<&std::ffi::OsString> = inv.args.iter().rev().take(2).collect();
        let (input, output) = match positional.as_slice() {
            [output, input] => (PathBuf::from(input), PathBuf::from(output)),
            _ => return Err(Self::failed(inv)),
        };

        if inv.flag_value("-I").is_some() {
            let dir = inv.current_dir.clone().unwrap_or_default();
            let bytes = fs::read(dir.join(&input)).map_err(|_| Self::failed(inv))?;
            let stem = binary_symbol_stem(input.as_os_str());
            write_wrapped(&dir.join(&output), &bytes, &stem);
        } else {
            let (bytes, _) = read_image(&input).ok_or_else(|| Self::failed(inv))?;
            fs::write(&output, bytes).map_err(|_| Self::failed(inv))?;
        }
        Ok(())
    }
}

impl ToolRunner for FakeToolchain {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), BuildError> {
        let index = {
            let mut calls = self.invocations.borrow_mut();
            calls.push(invocation.clone());
            calls.len() - 1
        };
        if self.fail_at == Some(index) {
            return Err(Self::failed(invocation));
        }

        match invocation.tool {
            Tool::Compiler => self.compile(invocation),
            Tool::Linker => self.link(invocation),
            Tool::ObjCopy => self.objcopy(invocation),
        }
    }
}
