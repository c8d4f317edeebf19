//! Read-back checks on produced objects and images.

use std::path::Path;

use object::{Object, ObjectKind, ObjectSection, ObjectSymbol};

use crate::error::BuildError;

fn read(path: &Path) -> Result<Vec<u8>, BuildError> {
    std::fs::read(path).map_err(|e| BuildError::io(path, e))
}

fn parse<'d>(path: &Path, data: &'d [u8]) -> Result<object::File<'d>, BuildError> {
    object::File::parse(data).map_err(|e| BuildError::ElfParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Check that `symbol` is defined in `elf` at exactly `expected`.
///
/// For executable images the ELF entry point must match as well.
pub fn check_entry_point(elf: &Path, symbol: &str, expected: u64) -> Result<(), BuildError> {
    let data = read(elf)?;
    let file = parse(elf, &data)?;

    let entry = file
        .symbol_by_name(symbol)
        .filter(|s| !s.is_undefined())
        .ok_or_else(|| BuildError::EntryMissing {
            path: elf.to_path_buf(),
            symbol: symbol.to_string(),
        })?;

    let misplaced = |actual: u64| BuildError::EntryMisplaced {
        path: elf.to_path_buf(),
        symbol: symbol.to_string(),
        expected,
        actual,
    };

    if entry.address() != expected {
        return Err(misplaced(entry.address()));
    }
    if file.kind() == ObjectKind::Executable && file.entry() != expected {
        return Err(misplaced(file.entry()));
    }

    log::debug!("{}: {symbol} at 0x{expected:X}", elf.display());
    Ok(())
}

/// Bytes between `_binary_<stem>_start` and `_binary_<stem>_end`, plus the
/// start symbol's address.
fn embedded_range<'d>(file: &object::File<'d>, stem: &str) -> Result<(u64, &'d [u8]), String> {
    let start_name = format!("_binary_{stem}_start");
    let end_name = format!("_binary_{stem}_end");

    let defined = |name: &str| {
        file.symbol_by_name(name)
            .filter(|s| !s.is_undefined())
            .ok_or_else(|| format!("symbol {name} is not defined"))
    };
    let start = defined(&start_name)?;
    let end = defined(&end_name)?;

    let index = start
        .section_index()
        .ok_or_else(|| format!("symbol {start_name} is not in a section"))?;
    if end.section_index() != Some(index) {
        return Err(format!("{start_name} and {end_name} are in different sections"));
    }

    let section = file.section_by_index(index).map_err(|e| e.to_string())?;
    let data = section.data().map_err(|e| e.to_string())?;
    let base = section.address();

    let (from, to) = match (
        start.address().checked_sub(base),
        end.address().checked_sub(base),
    ) {
        (Some(from), Some(to)) if from <= to && to <= data.len() as u64 => {
            (from as usize, to as usize)
        }
        _ => {
            return Err(format!(
                "range 0x{:X}..0x{:X} lies outside section {} (0x{:X}, {} bytes)",
                start.address(),
                end.address(),
                section.name().unwrap_or("?"),
                base,
                data.len()
            ))
        }
    };

    Ok((start.address(), &data[from..to]))
}

fn describe_difference(expected: &[u8], actual: &[u8]) -> Option<String> {
    if expected.len() != actual.len() {
        return Some(format!(
            "length {} differs from flat binary length {}",
            actual.len(),
            expected.len()
        ));
    }
    expected
        .iter()
        .zip(actual)
        .position(|(a, b)| a != b)
        .map(|offset| format!("first difference at offset 0x{offset:X}"))
}

/// Check that a wrapped object exposes exactly the bytes of `flat` through
/// its `_binary_<stem>_*` symbols.
pub fn check_wrapped_object(object: &Path, flat: &Path, stem: &str) -> Result<(), BuildError> {
    let expected = read(flat)?;
    let data = read(object)?;
    let file = parse(object, &data)?;

    let invalid = |reason: String| BuildError::WrappedObjectInvalid {
        path: object.to_path_buf(),
        reason,
    };

    let (_, bytes) = embedded_range(&file, stem).map_err(invalid)?;
    if let Some(reason) = describe_difference(&expected, bytes) {
        return Err(invalid(reason));
    }
    Ok(())
}

/// Check that the flat binary `flat` appears verbatim inside the linked image
/// `elf`. Returns the address the embedded copy starts at.
pub fn check_embedding(elf: &Path, flat: &Path, stem: &str) -> Result<u64, BuildError> {
    let expected = read(flat)?;
    let data = read(elf)?;
    let file = parse(elf, &data)?;

    let mismatch = |reason: String| BuildError::EmbeddingMismatch {
        elf: elf.to_path_buf(),
        flat: flat.to_path_buf(),
        reason,
    };

    let (address, bytes) = embedded_range(&file, stem).map_err(mismatch)?;
    if let Some(reason) = describe_difference(&expected, bytes) {
        return Err(mismatch(reason));
    }
    Ok(address)
}
