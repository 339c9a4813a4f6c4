//! Container format implementations

pub mod format_v2;

use crate::exceptions::{PackError, Result};
use std::path::Path;

/// Supported container formats
#[derive(Debug, Clone, Copy)]
pub enum ContainerFormat {
    PackV2,
}

/// Detect the container format of a carrier file by scanning for the marker
pub fn detect_format(carrier_path: &Path) -> Result<ContainerFormat> {
    log::trace!("Detecting format for: {:?}", carrier_path);
    let data = std::fs::read(carrier_path)?;
    log::trace!("File size: {} bytes", data.len());

    if format_v2::loader::locate_marker(&data).is_some() {
        log::debug!("Found v2 marker");
        return Ok(ContainerFormat::PackV2);
    }

    Err(PackError::Format(
        "No payload container found in file".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_format_without_marker() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"just some bytes").unwrap();
        assert!(detect_format(file.path()).is_err());
    }

    #[test]
    fn test_detect_format_with_marker() {
        use format_v2::{assembler, container, manifest::Manifest};
        let mut template = b"\x7fELF\x02\x01\x01".to_vec();
        template.resize(64, 0);
        let (blob, entries) = container::build(&[container::PayloadInput {
            bytes: b"hello".to_vec(),
            extension: ".txt".to_string(),
        }])
        .unwrap();
        let manifest = Manifest::new(entries, false);
        let carrier = assembler::assemble(&template, &manifest.pack(), &blob).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&carrier).unwrap();
        assert!(matches!(
            detect_format(file.path()).unwrap(),
            ContainerFormat::PackV2
        ));
    }
}
