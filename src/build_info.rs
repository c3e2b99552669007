//! Compile-time build metadata exposed through `--version` and `--help`.

/// Semver package version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VCS commit captured at build time.
pub const GIT_COMMIT: &str = env!("MUXCREW_BUILD_GIT_HASH");

/// Build timestamp captured at compile time.
pub const BUILD_TIMESTAMP: &str = env!("MUXCREW_BUILD_TIMESTAMP");

/// Version string shown by `muxcrew --version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("MUXCREW_BUILD_GIT_HASH"),
    ", built ",
    env!("MUXCREW_BUILD_TIMESTAMP"),
    ")"
);

/// Help trailer block that surfaces build metadata in `muxcrew --help`.
pub const HELP_BUILD_METADATA: &str = concat!(
    "Build metadata:\n  commit: ",
    env!("MUXCREW_BUILD_GIT_HASH"),
    "\n  built: ",
    env!("MUXCREW_BUILD_TIMESTAMP")
);
