//! Runtime container location and decoding.
//!
//! The stub reads its own bytes and looks for the marker token from the end
//! of the buffer backward. Only the occurrence closest to EOF is
//! authoritative: the literal can coincidentally appear earlier in the
//! template's own content (including inside this very code).

use super::constants::{MANIFEST_HEADER_SIZE, MARKER, MARKER_SIZE};
use super::manifest::Manifest;
use crate::exceptions::Result;
use log::{debug, trace};

/// A decoded container: the parsed manifest plus where the blob starts
#[derive(Clone, Debug)]
pub struct LoadedContainer {
    pub manifest: Manifest,
    /// Absolute offset of the first blob byte within the carrier
    pub blob_start: usize,
}

impl LoadedContainer {
    /// Length of the blob region this container describes
    pub fn blob_len(&self, carrier_len: usize) -> usize {
        carrier_len.saturating_sub(self.blob_start)
    }

    /// Length of the carrier template alone, excluding the marker and the
    /// manifest bytes that sit between it and the blob
    pub fn template_len(&self) -> usize {
        self.blob_start
            .saturating_sub(MARKER_SIZE + self.manifest.packed_size())
    }
}

/// Scan backward from EOF for the marker token.
///
/// Returns the offset immediately following the LAST occurrence, or `None`
/// when the buffer is too short to hold a marker plus a minimum header or
/// the token never appears. `None` means "no payloads embedded", not an
/// error: the carrier then behaves as an ordinary executable.
pub fn locate_marker(data: &[u8]) -> Option<usize> {
    if data.len() < MARKER_SIZE + MANIFEST_HEADER_SIZE {
        return None;
    }

    let mut i = data.len() - MARKER_SIZE;
    loop {
        if &data[i..i + MARKER_SIZE] == MARKER {
            trace!("Marker found at offset {i}");
            return Some(i + MARKER_SIZE);
        }
        if i == 0 {
            return None;
        }
        i -= 1;
    }
}

/// Locate and decode the container from the carrier's own bytes.
///
/// `Ok(None)` when no container is embedded; `Err` only for a container
/// that is present but malformed.
pub fn load(data: &[u8]) -> Result<Option<LoadedContainer>> {
    let Some(manifest_offset) = locate_marker(data) else {
        debug!("No container marker found; carrier is unpacked");
        return Ok(None);
    };

    let manifest = Manifest::unpack(data, manifest_offset)?;
    let blob_start = manifest_offset + manifest.packed_size();
    let container = LoadedContainer {
        manifest,
        blob_start,
    };
    container
        .manifest
        .validate_blob_ranges(container.blob_len(data.len()))?;

    debug!(
        "Loaded container: {} entries, blob at {:#x}",
        container.manifest.entries.len(),
        blob_start
    );
    Ok(Some(container))
}

/// Read the bytes of the currently running executable
pub fn read_self_bytes() -> Result<Vec<u8>> {
    let exe_path = std::env::current_exe()?;
    trace!("Reading own bytes from {}", exe_path.display());
    Ok(std::fs::read(exe_path)?)
}
