//! Carrier assembly: marker + manifest + blob appended to a template.

use super::constants::MARKER;
use super::exec_image::is_executable_image;
use crate::exceptions::{PackError, Result};
use log::{debug, info, trace};
use std::path::PathBuf;

/// Default filename looked up by the `SearchDir` template strategy
#[cfg(windows)]
pub const STUB_FILE_NAME: &str = "packbind-stub.exe";
#[cfg(not(windows))]
pub const STUB_FILE_NAME: &str = "packbind-stub";

/// Append the container to a validated template.
///
/// `template ++ MARKER ++ manifest ++ blob`. The template's own executable
/// headers are left untouched: a well-formed image loader ignores trailing
/// bytes past the formal end of the image, so the carrier both runs normally
/// and carries the container. Callers that need the appended region mapped
/// as a real section use `exec_image::append_section` first.
pub fn assemble(template: &[u8], manifest_bytes: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    validate_template(template)?;

    let mut carrier =
        Vec::with_capacity(template.len() + MARKER.len() + manifest_bytes.len() + blob.len());
    carrier.extend_from_slice(template);
    carrier.extend_from_slice(MARKER);
    carrier.extend_from_slice(manifest_bytes);
    carrier.extend_from_slice(blob);

    debug!(
        "Assembled carrier: template={} manifest={} blob={} total={}",
        template.len(),
        manifest_bytes.len(),
        blob.len(),
        carrier.len()
    );
    Ok(carrier)
}

/// Confirm the template is a usable native executable image
pub fn validate_template(template: &[u8]) -> Result<()> {
    if template.is_empty() {
        return Err(PackError::Assembly("Carrier template is empty".into()));
    }
    if !is_executable_image(template) {
        return Err(PackError::Assembly(
            "Carrier template is not a native executable image".into(),
        ));
    }
    Ok(())
}

/// One place a carrier template may come from, tried in list order
#[derive(Clone, Debug)]
pub enum TemplateSource {
    /// An explicit file path
    File(PathBuf),
    /// A directory expected to contain `STUB_FILE_NAME`
    SearchDir(PathBuf),
    /// Bytes supplied directly by the caller (embedded fallback)
    Embedded(Vec<u8>),
}

/// Resolve a template from an explicit, ordered strategy list.
///
/// No ambient working-directory lookup: callers state exactly where a
/// template may come from and in what order. The first source that yields a
/// valid executable image wins; unreadable or invalid candidates are logged
/// and skipped.
pub fn resolve_template(sources: &[TemplateSource]) -> Result<Vec<u8>> {
    for source in sources {
        let candidate = match source {
            TemplateSource::File(path) => {
                trace!("Trying template file: {}", path.display());
                match std::fs::read(path) {
                    Ok(bytes) => Some((bytes, path.display().to_string())),
                    Err(e) => {
                        debug!("Template candidate {} unreadable: {e}", path.display());
                        None
                    }
                }
            }
            TemplateSource::SearchDir(dir) => {
                let path = dir.join(STUB_FILE_NAME);
                trace!("Trying template in directory: {}", path.display());
                match std::fs::read(&path) {
                    Ok(bytes) => Some((bytes, path.display().to_string())),
                    Err(e) => {
                        debug!("Template candidate {} unreadable: {e}", path.display());
                        None
                    }
                }
            }
            TemplateSource::Embedded(bytes) => {
                trace!("Trying embedded template: {} bytes", bytes.len());
                Some((bytes.clone(), "<embedded>".to_string()))
            }
        };

        if let Some((bytes, origin)) = candidate {
            match validate_template(&bytes) {
                Ok(()) => {
                    info!("Using carrier template from {origin} ({} bytes)", bytes.len());
                    return Ok(bytes);
                }
                Err(e) => debug!("Template candidate {origin} rejected: {e}"),
            }
        }
    }

    Err(PackError::Assembly(
        "No usable carrier template found in any configured source".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::format_v2::constants::{MANIFEST_HEADER_SIZE, MARKER_SIZE};
    use crate::pack::format_v2::manifest::Manifest;

    fn fake_template() -> Vec<u8> {
        let mut t = b"\x7fELF\x02\x01\x01".to_vec();
        t.resize(256, 0);
        t
    }

    #[test]
    fn test_assemble_layout() {
        let template = fake_template();
        let manifest_bytes = Manifest::new(vec![], true).pack();
        let blob = b"payloadbytes".to_vec();

        let carrier = assemble(&template, &manifest_bytes, &blob).unwrap();

        assert_eq!(&carrier[..template.len()], &template[..]);
        let marker_at = template.len();
        assert_eq!(&carrier[marker_at..marker_at + MARKER_SIZE], MARKER);
        let manifest_at = marker_at + MARKER_SIZE;
        assert_eq!(
            &carrier[manifest_at..manifest_at + MANIFEST_HEADER_SIZE],
            &manifest_bytes[..]
        );
        assert_eq!(&carrier[manifest_at + manifest_bytes.len()..], &blob[..]);
    }

    #[test]
    fn test_assemble_rejects_non_executable_template() {
        let err = assemble(b"just text", &[], &[]).unwrap_err();
        assert!(matches!(err, PackError::Assembly(_)));
        assert!(matches!(
            assemble(&[], &[], &[]),
            Err(PackError::Assembly(_))
        ));
    }

    #[test]
    fn test_resolver_order_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-template");
        let embedded = fake_template();

        // Missing file falls through to the embedded source
        let resolved = resolve_template(&[
            TemplateSource::File(missing.clone()),
            TemplateSource::Embedded(embedded.clone()),
        ])
        .unwrap();
        assert_eq!(resolved, embedded);

        // A valid on-disk file beats a later embedded source
        let on_disk = dir.path().join(STUB_FILE_NAME);
        std::fs::write(&on_disk, b"MZ\x90\x00disk-template").unwrap();
        let resolved = resolve_template(&[
            TemplateSource::SearchDir(dir.path().to_path_buf()),
            TemplateSource::Embedded(embedded),
        ])
        .unwrap();
        assert!(resolved.starts_with(b"MZ"));
    }

    #[test]
    fn test_resolver_skips_invalid_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.bin");
        std::fs::write(&bad, b"not an image").unwrap();

        let err = resolve_template(&[TemplateSource::File(bad)]).unwrap_err();
        assert!(matches!(err, PackError::Assembly(_)));
    }
}
