//! Platform, address layout, and toolchain configuration for the stager
//! payload builder.
//!
//! Everything the build pipeline needs to know about *where* things go is
//! assembled here into one immutable [`BuildConfig`]:
//! - **Platforms:** the enumerated hardware variants, each with its own
//!   header overlays and build directory
//! - **Address layout:** the fixed load addresses of the hook and shellcode
//!   stages
//! - **Toolchain:** the cross-compiler, linker, and object converter paths

pub mod config;
pub mod error;
pub mod layout;
pub mod parse;
pub mod platform;
pub mod resolve;
pub mod toolchain;

pub use config::{BuildConfig, FlagSet, SourceSet};
pub use error::{Result, TargetError};
pub use layout::AddressLayout;
pub use parse::{build_config_to_toml, parse_build_config, validate_build_config, ValidationIssue};
pub use platform::Platform;
pub use resolve::{PlatformConfigResolver, PlatformDirs};
pub use toolchain::{PrefixSource, ToolchainConfig, DEFAULT_PREFIX, PREFIX_ENV};
