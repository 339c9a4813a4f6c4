//! Payload extraction to temp files.

use super::constants::DEFAULT_EXTENSION;
use super::manifest::PayloadEntry;
use crate::exceptions::{PackError, Result};
use crate::utils::get_temp_dir;
use log::{debug, trace};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Deterministic destination for one payload: `packed_<order><ext>` in the
/// temp directory. A pre-existing file at that path is overwritten.
pub fn temp_payload_path(entry: &PayloadEntry) -> PathBuf {
    let extension = if entry.extension.is_empty() {
        DEFAULT_EXTENSION
    } else {
        entry.extension.as_str()
    };
    get_temp_dir().join(format!("packed_{}{}", entry.execution_order, extension))
}

/// Write one payload's bytes from the carrier to its temp file.
///
/// The absolute range is `blob_start + entry.offset` for `entry.size` bytes;
/// a range past the end of the carrier is an extraction error, as is any
/// failure to create or completely write the file.
pub fn extract(carrier: &[u8], entry: &PayloadEntry, blob_start: usize) -> Result<PathBuf> {
    let offset = blob_start + entry.offset as usize;
    let end = offset
        .checked_add(entry.size as usize)
        .ok_or_else(|| PackError::Extraction(format!("Entry {} range overflows", entry.id)))?;
    if end > carrier.len() {
        return Err(PackError::Extraction(format!(
            "Entry {} range {}..{} exceeds carrier length {}",
            entry.id,
            offset,
            end,
            carrier.len()
        )));
    }

    let path = temp_payload_path(entry);
    trace!(
        "Extracting entry {} ({} bytes) to {}",
        entry.id,
        entry.size,
        path.display()
    );

    let mut file = File::create(&path).map_err(|e| {
        PackError::Extraction(format!("Cannot create {}: {e}", path.display()))
    })?;
    file.write_all(&carrier[offset..end]).map_err(|e| {
        PackError::Extraction(format!("Short write to {}: {e}", path.display()))
    })?;
    file.flush()
        .map_err(|e| PackError::Extraction(format!("Flush of {} failed: {e}", path.display())))?;

    debug!("Extracted entry {} to {}", entry.id, path.display());
    Ok(path)
}
