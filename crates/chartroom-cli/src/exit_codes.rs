//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Lookup error - repository, index, chart or version not found
pub const NOT_FOUND: i32 = 2;

/// Network error - fetch failed, authentication rejected, bad TLS material
pub const NETWORK_ERROR: i32 = 3;

/// Verification error - provenance missing or signature/digest invalid
pub const VERIFICATION_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Configuration error - unreadable or invalid repository file (sysexits.h EX_CONFIG)
pub const CONFIG_ERROR: i32 = 78;
