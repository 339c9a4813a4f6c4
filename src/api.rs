//! High-level API for building, inspecting, and running carriers

use crate::exceptions::{PackError, Result};
use crate::pack::format_v2::{
    assembler::{self, TemplateSource},
    container::{self, PayloadInput},
    launcher::{self, LaunchConfig},
    loader,
    manifest::Manifest,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Build plan consumed by the builder: payload files in launch order plus
/// the global wait flag
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildPlan {
    #[serde(default)]
    pub wait_for_previous: bool,
    pub payloads: Vec<PayloadSpec>,
}

/// One payload source in a build plan
#[derive(Debug, Serialize, Deserialize)]
pub struct PayloadSpec {
    pub path: PathBuf,
    /// Override for the stored extension; derived from `path` when absent
    #[serde(default)]
    pub extension: Option<String>,
}

/// Options for building a carrier
#[derive(Debug, Default)]
pub struct BuildOptions {
    /// Explicit path to the stub binary used as the carrier template
    pub stub_bin: Option<PathBuf>,
    /// Extra directories searched for the stub binary
    pub search_dirs: Vec<PathBuf>,
}

/// Options for the runtime launch loop
#[derive(Debug, Default)]
pub struct RunOptions {
    pub launch: LaunchConfig,
}

/// Summary returned by [`inspect_carrier`]
#[derive(Debug, Serialize)]
pub struct CarrierInfo {
    pub format_version: u32,
    pub entry_count: usize,
    pub wait_for_previous: bool,
    pub template_size: usize,
    pub blob_size: usize,
}

/// Build a carrier executable from a build plan.
///
/// The whole image is assembled in memory and written atomically: a failed
/// build never leaves a partial file at `output_path`.
pub fn build_carrier(plan_path: &Path, output_path: &Path, options: BuildOptions) -> Result<()> {
    log::info!("Building carrier from plan: {:?}", plan_path);
    let plan_data = std::fs::read_to_string(plan_path)?;
    let plan: BuildPlan = serde_json::from_str(&plan_data)?;

    if plan.payloads.is_empty() {
        return Err(PackError::BuildInput(
            "Build plan contains no payloads".to_string(),
        ));
    }

    let mut inputs = Vec::with_capacity(plan.payloads.len());
    for spec in &plan.payloads {
        let mut input = PayloadInput::from_file(&spec.path)?;
        if let Some(ext) = &spec.extension {
            input.extension = ext.clone();
        }
        inputs.push(input);
    }

    let template = assembler::resolve_template(&template_sources(&options))?;
    let (blob, entries) = container::build(&inputs)?;
    let manifest = Manifest::new(entries, plan.wait_for_previous);
    let carrier = assembler::assemble(&template, &manifest.pack(), &blob)?;

    write_executable(output_path, &carrier)?;
    log::info!(
        "Wrote carrier: {} ({} payloads, {} bytes)",
        output_path.display(),
        plan.payloads.len(),
        carrier.len()
    );
    Ok(())
}

/// Run the carrier's own payload chain.
///
/// An executable without an appended container is a valid unpacked stub:
/// it exits successfully without output. Returns the process exit code.
pub fn run_carrier(options: RunOptions) -> Result<i32> {
    let data = loader::read_self_bytes()?;
    let Some(container) = loader::load(&data)? else {
        log::debug!("No container appended; exiting");
        return Ok(crate::exit_codes::EXIT_SUCCESS);
    };

    let summary = launcher::run_all(&data, &container, &options.launch);
    if summary.failures.is_empty() {
        Ok(crate::exit_codes::EXIT_SUCCESS)
    } else {
        Ok(crate::exit_codes::EXIT_EXECUTION_ERROR)
    }
}

/// Inspect a carrier file without running anything
pub fn inspect_carrier(carrier_path: &Path) -> Result<CarrierInfo> {
    let data = std::fs::read(carrier_path)?;
    let container = loader::load(&data)?.ok_or_else(|| {
        PackError::Format("No payload container found in file".to_string())
    })?;

    Ok(CarrierInfo {
        format_version: container.manifest.version,
        entry_count: container.manifest.entries.len(),
        wait_for_previous: container.manifest.wait_for_previous,
        template_size: container.template_len(),
        blob_size: container.blob_len(data.len()),
    })
}

/// Ordered template lookup: explicit path, then caller-provided search dirs,
/// then next to the builder executable, then the working directory
fn template_sources(options: &BuildOptions) -> Vec<TemplateSource> {
    let mut sources = Vec::new();
    if let Some(path) = &options.stub_bin {
        sources.push(TemplateSource::File(path.clone()));
    }
    for dir in &options.search_dirs {
        sources.push(TemplateSource::SearchDir(dir.clone()));
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            sources.push(TemplateSource::SearchDir(dir.to_path_buf()));
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        sources.push(TemplateSource::SearchDir(cwd));
    }
    sources
}

/// Write the finished image, then mark it executable where that matters
fn write_executable(output_path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    use std::io::Write;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(output_path).map_err(|e| e.error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(output_path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn elf_template_bytes() -> Vec<u8> {
        let mut t = b"\x7fELF\x02\x01\x01".to_vec();
        t.resize(64, 0);
        t
    }

    fn write_build_fixture(dir: &Path, wait: bool) -> (PathBuf, PathBuf, BuildOptions) {
        let payload = dir.join("hello.sh");
        std::fs::write(&payload, "echo hi\n").unwrap();

        let stub = dir.join("stub.bin");
        std::fs::write(&stub, elf_template_bytes()).unwrap();

        let plan = BuildPlan {
            wait_for_previous: wait,
            payloads: vec![PayloadSpec {
                path: payload,
                extension: None,
            }],
        };
        let plan_path = dir.join("plan.json");
        let mut f = std::fs::File::create(&plan_path).unwrap();
        f.write_all(serde_json::to_string(&plan).unwrap().as_bytes())
            .unwrap();

        let options = BuildOptions {
            stub_bin: Some(stub),
            search_dirs: vec![],
        };
        (plan_path, dir.join("out.bin"), options)
    }

    #[test]
    fn test_build_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let (plan_path, output, options) = write_build_fixture(dir.path(), true);

        build_carrier(&plan_path, &output, options).unwrap();

        let info = inspect_carrier(&output).unwrap();
        assert_eq!(info.entry_count, 1);
        assert!(info.wait_for_previous);
        assert_eq!(info.template_size, 64);
        assert_eq!(info.blob_size, "echo hi\n".len());
    }

    #[test]
    fn test_build_rejects_empty_plan() {
        let dir = tempfile::tempdir().unwrap();
        let plan_path = dir.path().join("plan.json");
        std::fs::write(&plan_path, r#"{"payloads": []}"#).unwrap();
        let err = build_carrier(&plan_path, &dir.path().join("out.bin"), BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, PackError::BuildInput(_)));
    }

    #[test]
    fn test_failed_build_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let plan_path = dir.path().join("plan.json");
        std::fs::write(
            &plan_path,
            r#"{"payloads": [{"path": "/nonexistent/input.bin"}]}"#,
        )
        .unwrap();
        let output = dir.path().join("out.bin");
        assert!(build_carrier(&plan_path, &output, BuildOptions::default()).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_inspect_plain_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.bin");
        std::fs::write(&path, b"nothing here").unwrap();
        assert!(matches!(
            inspect_carrier(&path).unwrap_err(),
            PackError::Format(_)
        ));
    }

    #[test]
    fn test_extension_override_from_plan() {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("data");
        std::fs::write(&payload, b"raw").unwrap();
        let stub = dir.path().join("stub.bin");
        std::fs::write(&stub, elf_template_bytes()).unwrap();

        let plan_path = dir.path().join("plan.json");
        std::fs::write(
            &plan_path,
            serde_json::json!({
                "payloads": [{"path": payload, "extension": ".cfg"}]
            })
            .to_string(),
        )
        .unwrap();

        let output = dir.path().join("out.bin");
        build_carrier(
            &plan_path,
            &output,
            BuildOptions {
                stub_bin: Some(stub),
                search_dirs: vec![],
            },
        )
        .unwrap();

        let data = std::fs::read(&output).unwrap();
        let container = crate::pack::format_v2::loader::load(&data).unwrap().unwrap();
        assert_eq!(container.manifest.entries[0].extension, ".cfg");
    }
}
