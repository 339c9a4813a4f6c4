//! Process liveness probing by name.
//!
//! When a launch strategy yields no usable process handle, the only way to
//! honor wait-for-previous is to poll the system process list for the
//! launched file's base name. This can false-positive on an unrelated
//! process that happens to share the name; that limitation is accepted and
//! documented, not hidden.

use log::trace;

/// Injectable liveness check so tests can substitute a deterministic fake
pub trait ProcessProbe: std::fmt::Debug {
    /// Whether any process with the given base name is currently running
    fn is_running(&self, base_name: &str) -> bool;
}

/// Probe backed by whatever process enumeration the host OS exposes
#[derive(Debug, Default)]
pub struct SystemProbe;

#[cfg(target_os = "linux")]
impl ProcessProbe for SystemProbe {
    fn is_running(&self, base_name: &str) -> bool {
        // /proc/<pid>/comm holds the executable base name, truncated by the
        // kernel to 15 characters; compare against the same truncation.
        let needle: String = base_name.chars().take(15).collect();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return false;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) {
                if comm.trim_end() == needle {
                    trace!("Probe: {base_name} matched pid {name}");
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(windows)]
impl ProcessProbe for SystemProbe {
    fn is_running(&self, base_name: &str) -> bool {
        let output = std::process::Command::new("tasklist")
            .args(["/FO", "CSV", "/NH", "/FI", &format!("IMAGENAME eq {base_name}")])
            .output();
        match output {
            Ok(out) => String::from_utf8_lossy(&out.stdout)
                .to_lowercase()
                .contains(&base_name.to_lowercase()),
            Err(_) => false,
        }
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
impl ProcessProbe for SystemProbe {
    fn is_running(&self, base_name: &str) -> bool {
        std::process::Command::new("pgrep")
            .arg("-x")
            .arg(base_name)
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_probe_sees_own_process() {
        let own = std::env::current_exe().unwrap();
        let base = own.file_name().unwrap().to_str().unwrap().to_string();
        assert!(SystemProbe.is_running(&base));
    }

    #[test]
    fn test_system_probe_misses_nonexistent_name() {
        assert!(!SystemProbe.is_running("packbind-no-such-process-name"));
    }
}
