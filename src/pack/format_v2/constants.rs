// Core PACK v2 format constants that never change.
// All multi-byte integers in the container are little-endian.

/// Marker token written between the carrier template and the manifest.
/// Literal ASCII bytes, no terminator.
pub const MARKER: &[u8] = b"PACKEDRES_V2";

/// Size of the marker token in bytes
pub const MARKER_SIZE: usize = 12;

/// Magic constant at the start of the manifest header
pub const MAGIC: &[u8; 4] = b"PACK";

/// Container format version - exact match only, no compatibility shimming
pub const FORMAT_VERSION: u32 = 2;

// Fixed record sizes - part of the format specification
pub const MANIFEST_HEADER_SIZE: usize = 13; // magic(4) + version(4) + count(4) + wait(1)
pub const ENTRY_RECORD_SIZE: usize = 37; // id(4)+offset(4)+size(4)+orig(4)+comp(1)+order(4)+ext(16)
pub const EXTENSION_FIELD_SIZE: usize = 16; // fixed-width text field, NUL padded

/// First payload id assigned at build time; ids increase from here
pub const BASE_PAYLOAD_ID: u32 = 100;

/// Extension recorded for payloads whose source had none
pub const DEFAULT_EXTENSION: &str = ".tmp";
