//! ELF to flat binary extraction, and flat binary to relocatable object
//! re-wrapping.
//!
//! objcopy names the symbols of a wrapped binary after the *input path as
//! given on its command line* (`_binary_<path>_start`), with no option to
//! override it. The wrap step therefore runs objcopy inside the artifact
//! directory with bare file names. The directory is set on the child process
//! only; our own working directory is never touched.

use std::ffi::OsStr;
use std::path::Path;

use stager_targets::ToolchainConfig;

use crate::error::BuildError;
use crate::invoke::{file_name_of, Tool, ToolInvocation, ToolRunner};
use crate::verify::check_wrapped_object;

/// Symbol stem objcopy derives from an input file name: every byte that is
/// not ASCII alphanumeric becomes `_`.
pub fn binary_symbol_stem(file_name: &OsStr) -> String {
    file_name
        .as_encoded_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_alphanumeric() {
                char::from(b)
            } else {
                '_'
            }
        })
        .collect()
}

/// Describe `objcopy -O binary <elf> <flat>`.
pub fn flat_invocation(toolchain: &ToolchainConfig, elf: &Path, flat: &Path) -> ToolInvocation {
    ToolInvocation::new(Tool::ObjCopy, &toolchain.objcopy)
        .args(["-O", "binary"])
        .arg(elf)
        .arg(flat)
}

/// Strip an ELF image down to its loadable bytes.
pub fn extract_flat(
    runner: &dyn ToolRunner,
    toolchain: &ToolchainConfig,
    elf: &Path,
    flat: &Path,
) -> Result<(), BuildError> {
    runner.run(&flat_invocation(toolchain, elf, flat))
}

/// Describe `objcopy -I binary -O <format> <flat-name> <object-name>`, run
/// inside the directory both files live in.
pub fn wrap_invocation(
    toolchain: &ToolchainConfig,
    object_format: &str,
    flat: &Path,
    object: &Path,
) -> Result<ToolInvocation, BuildError> {
    let dir = parent_dir(flat);
    if dir != parent_dir(object) {
        return Err(BuildError::Config {
            message: format!(
                "wrapped object {} must be written next to {}",
                object.display(),
                flat.display()
            ),
        });
    }

    Ok(ToolInvocation::new(Tool::ObjCopy, &toolchain.objcopy)
        .args(["-I", "binary", "-O", object_format])
        .arg(file_name_of(flat)?)
        .arg(file_name_of(object)?)
        .current_dir(dir))
}

/// Wrap a flat binary as a relocatable object and check the result.
///
/// Returns the symbol stem, so callers can find
/// `_binary_<stem>_start` / `_binary_<stem>_end` in later links.
pub fn wrap_flat(
    runner: &dyn ToolRunner,
    toolchain: &ToolchainConfig,
    object_format: &str,
    flat: &Path,
    object: &Path,
) -> Result<String, BuildError> {
    let inv = wrap_invocation(toolchain, object_format, flat, object)?;
    runner.run(&inv)?;

    let stem = binary_symbol_stem(file_name_of(flat)?);
    check_wrapped_object(object, flat, &stem)?;
    Ok(stem)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeToolchain;
    use std::path::PathBuf;

    #[test]
    fn stem_mangling() {
        assert_eq!(binary_symbol_stem(OsStr::new("hook.bin")), "hook_bin");
        assert_eq!(binary_symbol_stem(OsStr::new("my-hook 2.bin")), "my_hook_2_bin");
        // one underscore per byte of a multi-byte character
        assert_eq!(binary_symbol_stem(OsStr::new("hoök.bin")), "ho__k_bin");
    }

    #[test]
    fn flat_invocation_args() {
        let tc = ToolchainConfig::from_prefix("/tc/");
        let inv = flat_invocation(&tc, Path::new("/b/hook.elf"), Path::new("/b/hook.bin"));
        assert_eq!(inv.program, PathBuf::from("/tc/objcopy"));
        assert_eq!(inv.args, vec!["-O", "binary", "/b/hook.elf", "/b/hook.bin"]);
        assert!(inv.current_dir.is_none());
    }

    #[test]
    fn wrap_uses_bare_names_and_child_dir() {
        let tc = ToolchainConfig::from_prefix("/tc/");
        let inv = wrap_invocation(
            &tc,
            "elf32-littlearm",
            Path::new("/b/s5l8723/hook.bin"),
            Path::new("/b/s5l8723/hook_bin.o"),
        )
        .unwrap();
        assert_eq!(
            inv.args,
            vec!["-I", "binary", "-O", "elf32-littlearm", "hook.bin", "hook_bin.o"]
        );
        assert_eq!(inv.current_dir, Some(PathBuf::from("/b/s5l8723")));
    }

    #[test]
    fn wrap_rejects_split_directories() {
        let tc = ToolchainConfig::from_prefix("");
        let err = wrap_invocation(
            &tc,
            "elf32-littlearm",
            Path::new("/b/a/hook.bin"),
            Path::new("/b/c/hook_bin.o"),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Config { .. }));
    }

    #[test]
    fn wrap_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let flat = dir.path().join("hook.bin");
        let object = dir.path().join("hook_bin.o");
        std::fs::write(&flat, [0xde, 0xad, 0xbe, 0xef, 0x01]).unwrap();

        let fake = FakeToolchain::new();
        let tc = ToolchainConfig::from_prefix("");
        let before = std::env::current_dir().unwrap();
        let stem = wrap_flat(&fake, &tc, "elf32-littlearm", &flat, &object).unwrap();

        assert_eq!(stem, "hook_bin");
        assert!(object.is_file());
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn extract_writes_loadable_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let elf = dir.path().join("hook.elf");
        let flat = dir.path().join("hook.bin");
        let fake = FakeToolchain::new();
        fake.write_object(&elf, b"\x01\x02\x03\x04");

        extract_flat(&fake, &ToolchainConfig::from_prefix(""), &elf, &flat).unwrap();
        assert_eq!(std::fs::read(&flat).unwrap(), b"\x01\x02\x03\x04");
    }
}
