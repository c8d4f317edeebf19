//! Load addresses of the two payload stages.

use serde::{Deserialize, Serialize};

/// Address the shellcode stage is linked to run at.
pub const SHELLCODE_BASE: u64 = 0x2202_E9C0;

/// Address the hook stage is linked to run at.
pub const HOOK_BASE: u64 = 0x2202_8000;

/// Fixed absolute load addresses shared by every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddressLayout {
    /// Load address of the shellcode stage.
    pub shellcode_base: u64,
    /// Load address of the hook stage.
    pub hook_base: u64,
}

impl Default for AddressLayout {
    fn default() -> Self {
        Self {
            shellcode_base: SHELLCODE_BASE,
            hook_base: HOOK_BASE,
        }
    }
}

impl AddressLayout {
    /// Bytes available to the hook image before it runs into the shellcode.
    ///
    /// Zero when the hook is not placed below the shellcode.
    pub fn hook_capacity(&self) -> u64 {
        self.shellcode_base.saturating_sub(self.hook_base)
    }

    /// Whether a hook image of `size` bytes fits below the shellcode.
    pub fn hook_fits(&self, size: u64) -> bool {
        size <= self.hook_capacity()
    }

    /// Linker argument placing `.text` at `address`.
    pub fn text_arg(address: u64) -> String {
        format!("-Ttext=0x{address:x}")
    }
}
