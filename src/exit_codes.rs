//! Standard exit codes for packbind binaries
//!
//! These exit codes are used by both the builder and the stub to provide
//! consistent error reporting.

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// Generic error (avoid using - be more specific)
pub const EXIT_ERROR: i32 = 1;

/// Panic or unrecoverable error
pub const EXIT_PANIC: i32 = 101;

/// Container format error (bad magic, wrong version, corrupt entry table)
pub const EXIT_FORMAT_ERROR: i32 = 102;

/// Extraction error (failed to write a payload, disk space, permissions)
pub const EXIT_EXTRACTION_ERROR: i32 = 103;

/// Execution error (every launch strategy exhausted)
pub const EXIT_EXECUTION_ERROR: i32 = 104;

/// Invalid command-line arguments
pub const EXIT_INVALID_ARGS: i32 = 105;

/// I/O error (file not found, permission denied, disk error)
pub const EXIT_IO_ERROR: i32 = 106;

/// Build/assembly error (builder-specific)
pub const EXIT_BUILD_ERROR: i32 = 108;

/// Configuration error (invalid build plan, missing required fields)
pub const EXIT_CONFIG_ERROR: i32 = 109;
