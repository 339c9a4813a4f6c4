//! Container assembly: ordered payload buffers into a manifest plus blob.

use super::constants::{BASE_PAYLOAD_ID, DEFAULT_EXTENSION};
use super::manifest::PayloadEntry;
use crate::exceptions::{PackError, Result};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use log::{debug, trace};
use std::io::Write;
use std::path::Path;

/// One payload to embed: raw bytes plus its recorded extension
#[derive(Clone, Debug)]
pub struct PayloadInput {
    pub bytes: Vec<u8>,
    /// Extension including the leading separator, e.g. ".bat"
    pub extension: String,
}

impl PayloadInput {
    /// Read a payload from disk, recording the source file's extension.
    ///
    /// An unreadable source is a build input error. Content is never
    /// rejected.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            PackError::BuildInput(format!("Cannot read payload '{}': {e}", path.display()))
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        Ok(PayloadInput { bytes, extension })
    }
}

/// Build the contiguous blob and its entry table from ordered payloads.
///
/// Ids are assigned sequentially from `BASE_PAYLOAD_ID`. Offsets are the
/// running sum of stored sizes in input order; the input list is never
/// re-sorted, so `execution_order` equals the list position. Stored size
/// always equals original size: the compressed flag and original_size field
/// are carried for forward compatibility, but the default path skips
/// compression because the stub has no decompression support.
///
/// Content is never rejected, but the wire format addresses the blob with
/// u32 offsets and sizes; inputs whose combined size cannot be represented
/// are a build input error.
pub fn build(payloads: &[PayloadInput]) -> Result<(Vec<u8>, Vec<PayloadEntry>)> {
    blob_budget(payloads.iter().map(|p| p.bytes.len()))?;

    let mut blob = Vec::new();
    let mut entries = Vec::with_capacity(payloads.len());

    let mut current_offset: u32 = 0;
    let mut payload_id = BASE_PAYLOAD_ID;

    for (order, payload) in payloads.iter().enumerate() {
        let size = payload.bytes.len() as u32;
        let entry = PayloadEntry {
            id: payload_id,
            offset: current_offset,
            size,
            original_size: size,
            compressed: false,
            execution_order: order as u32,
            extension: payload.extension.clone(),
        };
        trace!(
            "Entry {}: order={} offset={} size={} ext={}",
            entry.id, entry.execution_order, entry.offset, entry.size, entry.extension
        );

        blob.extend_from_slice(&payload.bytes);
        current_offset += size;
        payload_id += 1;
        entries.push(entry);
    }

    debug!(
        "Built container: {} entries, {} blob bytes",
        entries.len(),
        blob.len()
    );
    Ok((blob, entries))
}

/// Total stored size of the blob, rejected when it exceeds what u32 offsets
/// and sizes can address. Checked up front so the per-entry casts and the
/// running offset in `build` can never truncate or wrap.
fn blob_budget(sizes: impl Iterator<Item = usize>) -> Result<u32> {
    let mut total: u64 = 0;
    for size in sizes {
        total += size as u64;
    }
    u32::try_from(total).map_err(|_| {
        PackError::BuildInput(format!(
            "Combined payload size of {total} bytes exceeds the format's 4 GiB limit"
        ))
    })
}

/// Compress a payload buffer with zlib.
///
/// Returns the compressed bytes and `true` only when compression actually
/// reduced the size; otherwise returns the input unchanged and `false`.
/// Not used by the default build path - the stub cannot decompress yet.
pub fn compress_payload(input: &[u8]) -> Result<(Vec<u8>, bool)> {
    if input.is_empty() {
        return Ok((Vec::new(), false));
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(input)?;
    let output = encoder.finish()?;

    if output.len() >= input.len() {
        return Ok((input.to_vec(), false));
    }
    Ok((output, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(bytes: &[u8], ext: &str) -> PayloadInput {
        PayloadInput {
            bytes: bytes.to_vec(),
            extension: ext.to_string(),
        }
    }

    #[test]
    fn test_sequential_ids_and_orders() {
        let (_, entries) = build(&[
            input(b"one", ".exe"),
            input(b"two", ".bat"),
            input(b"three", ".txt"),
        ])
        .unwrap();
        assert_eq!(
            entries.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![100, 101, 102]
        );
        assert_eq!(
            entries.iter().map(|e| e.execution_order).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_offsets_follow_input_order() {
        let (blob, entries) =
            build(&[input(b"aaaa", ".a"), input(b"bb", ".b"), input(b"c", ".c")]).unwrap();
        assert_eq!(entries[0].offset, 0);
        assert_eq!(entries[1].offset, 4);
        assert_eq!(entries[2].offset, 6);
        assert_eq!(blob, b"aaaabbc");
        for entry in &entries {
            assert!(entry.offset as usize + entry.size as usize <= blob.len());
            assert_eq!(entry.size, entry.original_size);
            assert!(!entry.compressed);
        }
    }

    #[test]
    fn test_zero_length_payload_is_legal() {
        let (blob, entries) = build(&[input(b"", ".bat"), input(b"x", ".txt")]).unwrap();
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[0].offset, 0);
        assert_eq!(entries[1].offset, 0);
        assert_eq!(blob, b"x");
    }

    #[test]
    fn test_blob_budget_within_limit() {
        assert_eq!(blob_budget([0usize, 42, 4096].into_iter()).unwrap(), 4138);
        assert_eq!(
            blob_budget(std::iter::once(u32::MAX as usize)).unwrap(),
            u32::MAX
        );
    }

    #[test]
    fn test_blob_budget_rejects_unrepresentable_totals() {
        // A single payload past the u32 limit
        let err = blob_budget(std::iter::once(u32::MAX as usize + 1)).unwrap_err();
        assert!(matches!(err, PackError::BuildInput(_)));

        // Two payloads whose running offset would wrap: the second entry's
        // offset would land inside the first entry's range
        let three_gib = 3usize << 30;
        assert!(matches!(
            blob_budget([three_gib, three_gib].into_iter()),
            Err(PackError::BuildInput(_))
        ));
    }

    #[test]
    fn test_missing_payload_file_is_build_input_error() {
        let err = PayloadInput::from_file(Path::new("/nonexistent/payload.exe")).unwrap_err();
        assert!(matches!(err, PackError::BuildInput(_)));
    }

    #[test]
    fn test_from_file_records_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.bat");
        std::fs::write(&path, b"@echo off").unwrap();
        let payload = PayloadInput::from_file(&path).unwrap();
        assert_eq!(payload.extension, ".bat");
        assert_eq!(payload.bytes, b"@echo off");

        let bare = dir.path().join("noext");
        std::fs::write(&bare, b"data").unwrap();
        assert_eq!(PayloadInput::from_file(&bare).unwrap().extension, ".tmp");
    }

    #[test]
    fn test_compress_only_kept_when_smaller() {
        // Highly repetitive data compresses
        let repetitive = vec![0u8; 4096];
        let (compressed, was_compressed) = compress_payload(&repetitive).unwrap();
        assert!(was_compressed);
        assert!(compressed.len() < repetitive.len());

        // Tiny input does not; original comes back untouched
        let tiny = b"ab";
        let (out, was_compressed) = compress_payload(tiny).unwrap();
        assert!(!was_compressed);
        assert_eq!(out, tiny);
    }
}
