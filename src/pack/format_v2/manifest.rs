// PACK v2 wire manifest - fixed-layout records with explicit encode/decode.
//
// The manifest is never reinterpreted from memory; every field is packed and
// unpacked byte by byte so the layout is identical on every target.

use super::constants::{
    ENTRY_RECORD_SIZE, EXTENSION_FIELD_SIZE, FORMAT_VERSION, MAGIC, MANIFEST_HEADER_SIZE,
};
use crate::exceptions::{PackError, Result};
use log::trace;

/// Descriptor for one embedded payload - 37 bytes on the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadEntry {
    /// Numeric id, strictly increasing from `BASE_PAYLOAD_ID`, never reused
    pub id: u32,
    /// Byte offset into the blob, relative to blob start
    pub offset: u32,
    /// Stored byte length
    pub size: u32,
    /// Uncompressed length (equal to `size` when compression is bypassed)
    pub original_size: u32,
    /// Whether the stored bytes are compressed
    pub compressed: bool,
    /// Launch sequence index, equal to build-time list position
    pub execution_order: u32,
    /// File extension including the leading separator, e.g. ".exe"
    pub extension: String,
}

impl PayloadEntry {
    /// Pack the entry into its fixed 37-byte wire record
    pub fn pack(&self) -> [u8; ENTRY_RECORD_SIZE] {
        let mut bytes = [0u8; ENTRY_RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.id.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.size.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.original_size.to_le_bytes());
        bytes[16] = u8::from(self.compressed);
        bytes[17..21].copy_from_slice(&self.execution_order.to_le_bytes());
        bytes[21..37].copy_from_slice(&encode_extension(&self.extension));
        bytes
    }

    /// Unpack an entry from a fixed 37-byte wire record
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < ENTRY_RECORD_SIZE {
            return Err(PackError::Format(format!(
                "Entry record truncated: {} < {}",
                data.len(),
                ENTRY_RECORD_SIZE
            )));
        }

        let id = u32::from_le_bytes(
            data[0..4]
                .try_into()
                .map_err(|_| PackError::Format("Invalid entry id bytes".into()))?,
        );
        let offset = u32::from_le_bytes(
            data[4..8]
                .try_into()
                .map_err(|_| PackError::Format("Invalid entry offset bytes".into()))?,
        );
        let size = u32::from_le_bytes(
            data[8..12]
                .try_into()
                .map_err(|_| PackError::Format("Invalid entry size bytes".into()))?,
        );
        let original_size = u32::from_le_bytes(
            data[12..16]
                .try_into()
                .map_err(|_| PackError::Format("Invalid entry original size bytes".into()))?,
        );
        let compressed = data[16] != 0;
        let execution_order = u32::from_le_bytes(
            data[17..21]
                .try_into()
                .map_err(|_| PackError::Format("Invalid execution order bytes".into()))?,
        );
        let extension = decode_extension(&data[21..21 + EXTENSION_FIELD_SIZE]);

        Ok(PayloadEntry {
            id,
            offset,
            size,
            original_size,
            compressed,
            execution_order,
            extension,
        })
    }
}

/// Parsed container manifest - built once or decoded once, never mutated
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    /// Format version; always `FORMAT_VERSION` for a manifest this code built
    pub version: u32,
    /// Global flag: wait for each payload to finish before the next starts
    pub wait_for_previous: bool,
    /// Payload descriptors, ordered by execution_order ascending
    pub entries: Vec<PayloadEntry>,
}

impl Manifest {
    /// Create a manifest for the given entries
    pub fn new(entries: Vec<PayloadEntry>, wait_for_previous: bool) -> Self {
        Manifest {
            version: FORMAT_VERSION,
            wait_for_previous,
            entries,
        }
    }

    /// Total serialized size: header plus one fixed record per entry
    pub fn packed_size(&self) -> usize {
        MANIFEST_HEADER_SIZE + self.entries.len() * ENTRY_RECORD_SIZE
    }

    /// Pack the manifest header and all entry records
    pub fn pack(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.packed_size());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        bytes.push(u8::from(self.wait_for_previous));
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.pack());
        }
        trace!(
            "Packed manifest: {} entries, {} bytes",
            self.entries.len(),
            bytes.len()
        );
        bytes
    }

    /// Unpack a manifest starting at `offset` within `data`
    ///
    /// Every read is bounds-checked against the buffer before it happens.
    /// Any version other than `FORMAT_VERSION` is a hard error.
    pub fn unpack(data: &[u8], offset: usize) -> Result<Self> {
        if offset
            .checked_add(MANIFEST_HEADER_SIZE)
            .is_none_or(|end| end > data.len())
        {
            return Err(PackError::Format(format!(
                "Manifest header out of bounds at offset {offset}"
            )));
        }

        let header = &data[offset..offset + MANIFEST_HEADER_SIZE];
        if &header[0..4] != MAGIC {
            return Err(PackError::Format("Bad manifest magic".into()));
        }

        let version = u32::from_le_bytes(
            header[4..8]
                .try_into()
                .map_err(|_| PackError::Format("Invalid version bytes".into()))?,
        );
        if version != FORMAT_VERSION {
            return Err(PackError::Format(format!(
                "Unsupported container version {version} (expected {FORMAT_VERSION})"
            )));
        }

        let entry_count = u32::from_le_bytes(
            header[8..12]
                .try_into()
                .map_err(|_| PackError::Format("Invalid entry count bytes".into()))?,
        );
        let wait_for_previous = header[12] != 0;

        let mut entries = Vec::with_capacity(entry_count.min(1024) as usize);
        let mut cursor = offset + MANIFEST_HEADER_SIZE;
        for i in 0..entry_count {
            if cursor
                .checked_add(ENTRY_RECORD_SIZE)
                .is_none_or(|end| end > data.len())
            {
                return Err(PackError::Format(format!(
                    "Entry record {i} out of bounds at offset {cursor}"
                )));
            }
            entries.push(PayloadEntry::unpack(&data[cursor..cursor + ENTRY_RECORD_SIZE])?);
            cursor += ENTRY_RECORD_SIZE;
        }

        trace!("Unpacked manifest: {entry_count} entries, wait={wait_for_previous}");

        Ok(Manifest {
            version,
            wait_for_previous,
            entries,
        })
    }

    /// Check every entry's declared range against the blob length
    pub fn validate_blob_ranges(&self, blob_len: usize) -> Result<()> {
        for entry in &self.entries {
            let end = entry.offset as u64 + entry.size as u64;
            if end > blob_len as u64 {
                return Err(PackError::Format(format!(
                    "Entry {} range {}..{} exceeds blob length {}",
                    entry.id, entry.offset, end, blob_len
                )));
            }
        }
        Ok(())
    }
}

/// Encode an extension into the fixed 16-byte NUL-padded field.
///
/// Truncates on a UTF-8 character boundary when the extension is too long.
fn encode_extension(extension: &str) -> [u8; EXTENSION_FIELD_SIZE] {
    let mut field = [0u8; EXTENSION_FIELD_SIZE];
    let mut len = extension.len().min(EXTENSION_FIELD_SIZE);
    while len > 0 && !extension.is_char_boundary(len) {
        len -= 1;
    }
    field[..len].copy_from_slice(&extension.as_bytes()[..len]);
    field
}

/// Decode the fixed extension field: bytes up to the first NUL
fn decode_extension(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(order: u32) -> PayloadEntry {
        PayloadEntry {
            id: 100 + order,
            offset: order * 16,
            size: 16,
            original_size: 16,
            compressed: false,
            execution_order: order,
            extension: ".exe".to_string(),
        }
    }

    #[test]
    fn test_entry_round_trip() {
        let entry = sample_entry(3);
        let packed = entry.pack();
        assert_eq!(packed.len(), ENTRY_RECORD_SIZE);
        let unpacked = PayloadEntry::unpack(&packed).unwrap();
        assert_eq!(entry, unpacked);
    }

    #[test]
    fn test_manifest_round_trip() {
        let manifest = Manifest::new(vec![sample_entry(0), sample_entry(1)], true);
        let bytes = manifest.pack();
        assert_eq!(bytes.len(), manifest.packed_size());
        let parsed = Manifest::unpack(&bytes, 0).unwrap();
        assert_eq!(manifest, parsed);
    }

    #[test]
    fn test_manifest_at_offset() {
        let manifest = Manifest::new(vec![sample_entry(0)], false);
        let mut bytes = vec![0xAA; 37];
        bytes.extend_from_slice(&manifest.pack());
        let parsed = Manifest::unpack(&bytes, 37).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert!(!parsed.wait_for_previous);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = Manifest::new(vec![], true).pack();
        bytes[0] = b'X';
        assert!(matches!(
            Manifest::unpack(&bytes, 0),
            Err(PackError::Format(_))
        ));
    }

    #[test]
    fn test_wrong_version_rejected() {
        // An otherwise valid manifest with any other version must fail
        for bad_version in [0u32, 1, 3, 0xFFFF_FFFF] {
            let mut bytes = Manifest::new(vec![sample_entry(0)], true).pack();
            bytes[4..8].copy_from_slice(&bad_version.to_le_bytes());
            assert!(
                matches!(Manifest::unpack(&bytes, 0), Err(PackError::Format(_))),
                "version {bad_version} accepted"
            );
        }
    }

    #[test]
    fn test_truncated_entries_rejected() {
        let bytes = Manifest::new(vec![sample_entry(0), sample_entry(1)], true).pack();
        // Drop the last byte of the final entry record
        let parsed = Manifest::unpack(&bytes[..bytes.len() - 1], 0);
        assert!(matches!(parsed, Err(PackError::Format(_))));
    }

    #[test]
    fn test_header_out_of_bounds() {
        let bytes = [0u8; 5];
        assert!(Manifest::unpack(&bytes, 0).is_err());
        assert!(Manifest::unpack(&bytes, usize::MAX - 2).is_err());
    }

    #[test]
    fn test_extension_truncated_to_field_width() {
        let entry = PayloadEntry {
            extension: ".averylongextension".to_string(),
            ..sample_entry(0)
        };
        let unpacked = PayloadEntry::unpack(&entry.pack()).unwrap();
        assert_eq!(unpacked.extension.len(), EXTENSION_FIELD_SIZE);
        assert!(".averylongextension".starts_with(&unpacked.extension));
    }

    #[test]
    fn test_empty_extension_round_trip() {
        let entry = PayloadEntry {
            extension: String::new(),
            ..sample_entry(0)
        };
        let unpacked = PayloadEntry::unpack(&entry.pack()).unwrap();
        assert_eq!(unpacked.extension, "");
    }

    #[test]
    fn test_blob_range_validation() {
        let manifest = Manifest::new(vec![sample_entry(0), sample_entry(1)], true);
        // Entries cover 0..16 and 16..32
        assert!(manifest.validate_blob_ranges(32).is_ok());
        assert!(manifest.validate_blob_ranges(31).is_err());
        assert!(manifest.validate_blob_ranges(0).is_err());
    }
}
