//! CLI command handlers for inspecting PACK/v2 carriers

use crate::pack::format_v2::loader::{self, LoadedContainer};
use std::path::Path;

fn load_carrier(exe_path: &Path) -> Option<(Vec<u8>, LoadedContainer)> {
    log::debug!("Loading carrier: {:?}", exe_path);
    let data = match std::fs::read(exe_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: Failed to read carrier: {}", e);
            return None;
        }
    };

    match loader::load(&data) {
        Ok(Some(container)) => Some((data, container)),
        Ok(None) => {
            eprintln!("Error: No payload container found in this executable");
            None
        }
        Err(e) => {
            eprintln!("Error: Failed to parse container: {}", e);
            None
        }
    }
}

/// Show carrier information
pub fn show_info(exe_path: &Path) -> i32 {
    log::trace!("show_info starting for: {:?}", exe_path);
    let Some((_, container)) = load_carrier(exe_path) else {
        return 1;
    };

    let manifest = &container.manifest;
    let total_size: u64 = manifest.entries.iter().map(|e| u64::from(e.size)).sum();
    let compressed = manifest.entries.iter().filter(|e| e.compressed).count();

    println!("📦 Carrier Information:");
    println!("  File: {}", exe_path.display());
    println!("  Format version: {}", manifest.version);
    println!();
    println!("📊 Payload Details:");
    println!("  Entries: {} ({} compressed)", manifest.entries.len(), compressed);
    println!("  Blob size: {:.2} MB", total_size as f64 / 1_048_576.0);
    println!(
        "  Template size: {:.2} MB",
        container.template_len() as f64 / 1_048_576.0
    );
    println!();
    println!("🚀 Execution:");
    println!(
        "  Wait for previous: {}",
        if manifest.wait_for_previous { "yes" } else { "no" }
    );
    0
}

/// List payload entries in execution order
pub fn list_entries(exe_path: &Path) -> i32 {
    let Some((_, container)) = load_carrier(exe_path) else {
        return 1;
    };

    let mut entries = container.manifest.entries.clone();
    entries.sort_by_key(|e| e.execution_order);

    println!("{:>5}  {:>6}  {:>10}  {:>10}  {:>10}  EXT", "ORDER", "ID", "OFFSET", "SIZE", "ORIG", );
    for entry in &entries {
        println!(
            "{:>5}  {:>6}  {:>10}  {:>10}  {:>10}  {}{}",
            entry.execution_order,
            entry.id,
            entry.offset,
            entry.size,
            entry.original_size,
            entry.extension,
            if entry.compressed { " (z)" } else { "" },
        );
    }
    0
}

/// Extract one payload entry to a directory
pub fn extract_entry(exe_path: &Path, order_str: &str, output_dir: &str) -> i32 {
    let Ok(order) = order_str.parse::<u32>() else {
        eprintln!("Error: Invalid entry order: {}", order_str);
        return 1;
    };

    let Some((data, container)) = load_carrier(exe_path) else {
        return 1;
    };

    let Some(entry) = container
        .manifest
        .entries
        .iter()
        .find(|e| e.execution_order == order)
    else {
        eprintln!("Error: No entry with execution order {}", order);
        return 1;
    };

    let output_path = Path::new(output_dir);
    if let Err(e) = std::fs::create_dir_all(output_path) {
        eprintln!("Error: Failed to create output directory: {}", e);
        return 1;
    }

    println!("📦 Extracting entry {} ({})", order, entry.extension);
    println!("  Size: {} bytes", entry.size);

    let start = container.blob_start + entry.offset as usize;
    let Some(bytes) = data.get(start..start + entry.size as usize) else {
        eprintln!("Error: Entry data out of range");
        return 1;
    };

    let target = output_path.join(format!("payload_{}{}", order, entry.extension));
    match std::fs::write(&target, bytes) {
        Ok(()) => {
            println!("✓ Extracted to: {}", target.display());
            0
        }
        Err(e) => {
            eprintln!("Error: Failed to write payload: {}", e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::format_v2::{assembler, container, manifest::Manifest};
    use std::io::Write;

    fn sample_carrier_file() -> tempfile::NamedTempFile {
        let mut template = b"\x7fELF\x02\x01\x01".to_vec();
        template.resize(64, 0);
        let (blob, entries) = container::build(&[container::PayloadInput {
            bytes: b"payload body".to_vec(),
            extension: ".txt".to_string(),
        }])
        .unwrap();
        let manifest = Manifest::new(entries, false);
        let carrier = assembler::assemble(&template, &manifest.pack(), &blob).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&carrier).unwrap();
        file
    }

    #[test]
    fn test_show_info_on_valid_carrier() {
        let file = sample_carrier_file();
        assert_eq!(show_info(file.path()), 0);
    }

    #[test]
    fn test_show_info_on_plain_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a carrier").unwrap();
        assert_eq!(show_info(file.path()), 1);
    }

    #[test]
    fn test_extract_entry_writes_payload() {
        let file = sample_carrier_file();
        let out = tempfile::tempdir().unwrap();
        let out_dir = out.path().join("extracted");
        assert_eq!(
            extract_entry(file.path(), "0", out_dir.to_str().unwrap()),
            0
        );
        let written = std::fs::read(out_dir.join("payload_0.txt")).unwrap();
        assert_eq!(written, b"payload body");
    }

    #[test]
    fn test_extract_entry_bad_order() {
        let file = sample_carrier_file();
        let out = tempfile::tempdir().unwrap();
        assert_eq!(
            extract_entry(file.path(), "9", out.path().to_str().unwrap()),
            1
        );
    }
}
