//! Utility functions for packbind

use std::env;
use std::path::PathBuf;

/// Check if an environment variable is set to a truthy value
/// Accepts: "1", "true", "on", "yes", "t" (case insensitive)
pub fn is_env_true(key: &str) -> bool {
    match env::var(key) {
        Ok(val) => {
            let val_lower = val.to_lowercase();
            matches!(val_lower.as_str(), "1" | "true" | "on" | "yes" | "t")
        }
        Err(_) => false,
    }
}

/// Get normalized platform string in format 'os_arch'
///
/// Returns strings like:
/// - "darwin_arm64" for macOS ARM64
/// - "linux_amd64" for Linux x86_64
/// - "windows_amd64" for Windows x86_64
pub fn get_platform_string() -> String {
    let os = match env::consts::OS {
        "macos" => "darwin",
        other => other,
    };

    let arch = match env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };

    format!("{os}_{arch}")
}

/// Directory used for extracted payload temp files
///
/// `PACKBIND_TMPDIR` overrides the system temp directory, which keeps test
/// runs isolated from each other.
pub fn get_temp_dir() -> PathBuf {
    if let Ok(dir) = env::var("PACKBIND_TMPDIR") {
        return PathBuf::from(dir);
    }
    env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_string_shape() {
        let platform = get_platform_string();
        assert!(platform.contains('_'));
    }

    #[test]
    fn test_is_env_true_unset() {
        assert!(!is_env_true("PACKBIND_TEST_UNSET_VARIABLE"));
    }

    #[test]
    fn test_temp_dir_defaults_to_system() {
        // Without the override the system temp dir is used
        if env::var("PACKBIND_TMPDIR").is_err() {
            assert_eq!(get_temp_dir(), env::temp_dir());
        }
    }
}
