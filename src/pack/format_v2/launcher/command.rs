//! Launch strategies per payload extension class.

use crate::exceptions::{PackError, Result};
use log::{debug, trace, warn};
use std::path::Path;
use std::process::{Child, Command};

/// What a payload's declared extension says about how to run it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    /// Directly-runnable program: gets the full fallback chain
    Program,
    /// Command/batch script: always routed through the interpreter
    Script,
    /// Anything else: handed to the platform's default-handler open action
    Document,
}

impl PayloadKind {
    /// Classify by the recorded extension (leading separator included)
    pub fn classify(extension: &str) -> Self {
        match extension.to_lowercase().as_str() {
            ".exe" | ".bin" | ".com" => PayloadKind::Program,
            ".bat" | ".cmd" | ".sh" => PayloadKind::Script,
            _ => PayloadKind::Document,
        }
    }
}

/// Which strategy ended up launching the payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// Direct process creation, no shell interpretation
    Direct,
    /// Platform shell "open" action
    ShellOpen,
    /// Shell "open" with an elevation request
    Elevated,
    /// Explicit command-interpreter invocation
    Interpreter,
}

/// Result of a successful launch attempt
#[derive(Debug)]
pub struct LaunchOutcome {
    /// Handle to the launched payload, when the strategy yields one.
    /// `None` means the payload may be running with no way to wait on it
    /// directly - the caller falls back to the liveness probe.
    pub child: Option<Child>,
    pub strategy: LaunchStrategy,
}

/// Launch an extracted payload using the strategy chain for its kind.
///
/// Programs: direct spawn, then shell open, then elevated shell open; all
/// three exhausted is a launch error. Scripts always go through the command
/// interpreter. Documents only ever get the default-handler open action and
/// are never treated as executable code.
pub fn launch(path: &Path, kind: PayloadKind) -> Result<LaunchOutcome> {
    match kind {
        PayloadKind::Program => launch_program(path),
        PayloadKind::Script => launch_script(path),
        PayloadKind::Document => {
            let child = shell_open(path)?;
            Ok(LaunchOutcome {
                child,
                strategy: LaunchStrategy::ShellOpen,
            })
        }
    }
}

fn launch_program(path: &Path) -> Result<LaunchOutcome> {
    // Preferred: direct creation, fastest and yields a real handle
    match Command::new(path).spawn() {
        Ok(child) => {
            debug!("Direct spawn succeeded for {}", path.display());
            return Ok(LaunchOutcome {
                child: Some(child),
                strategy: LaunchStrategy::Direct,
            });
        }
        Err(e) => warn!("Direct spawn of {} failed: {e}", path.display()),
    }

    // Fallback: the platform shell's default open action
    match shell_open(path) {
        Ok(child) => {
            debug!("Shell open succeeded for {}", path.display());
            return Ok(LaunchOutcome {
                child,
                strategy: LaunchStrategy::ShellOpen,
            });
        }
        Err(e) => warn!("Shell open of {} failed: {e}", path.display()),
    }

    // Last resort: the same open action with an elevation request
    match elevated_open(path) {
        Ok(child) => {
            debug!("Elevated open succeeded for {}", path.display());
            Ok(LaunchOutcome {
                child,
                strategy: LaunchStrategy::Elevated,
            })
        }
        Err(e) => Err(PackError::Launch(format!(
            "All launch strategies exhausted for {}: {e}",
            path.display()
        ))),
    }
}

fn launch_script(path: &Path) -> Result<LaunchOutcome> {
    let mut cmd = interpreter_command(path);
    trace!("Interpreter launch: {cmd:?}");
    let child = cmd.spawn().map_err(|e| {
        PackError::Launch(format!("Interpreter failed for {}: {e}", path.display()))
    })?;
    Ok(LaunchOutcome {
        child: Some(child),
        strategy: LaunchStrategy::Interpreter,
    })
}

#[cfg(windows)]
fn interpreter_command(path: &Path) -> Command {
    let mut cmd = Command::new("cmd.exe");
    cmd.arg("/C").arg(path);
    cmd
}

#[cfg(not(windows))]
fn interpreter_command(path: &Path) -> Command {
    let shell = which::which("sh").unwrap_or_else(|_| "/bin/sh".into());
    let mut cmd = Command::new(shell);
    cmd.arg(path);
    cmd
}

/// Invoke the platform's default "open" action.
///
/// The spawned child is the opener, not the payload, so no usable payload
/// handle comes back; the opener itself is reaped before returning.
fn shell_open(path: &Path) -> Result<Option<Child>> {
    let mut cmd = opener_command(path);
    trace!("Shell open: {cmd:?}");
    let mut opener = cmd
        .spawn()
        .map_err(|e| PackError::Launch(format!("Opener failed: {e}")))?;
    let status = opener
        .wait()
        .map_err(|e| PackError::Launch(format!("Opener wait failed: {e}")))?;
    if !status.success() {
        return Err(PackError::Launch(format!(
            "Opener for {} exited with {status}",
            path.display()
        )));
    }
    Ok(None)
}

#[cfg(windows)]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("cmd.exe");
    cmd.arg("/C").arg("start").arg("").arg(path);
    cmd
}

#[cfg(target_os = "macos")]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(path);
    cmd
}

#[cfg(all(unix, not(target_os = "macos")))]
fn opener_command(path: &Path) -> Command {
    let opener = which::which("xdg-open").unwrap_or_else(|_| "/usr/bin/xdg-open".into());
    let mut cmd = Command::new(opener);
    cmd.arg(path);
    cmd
}

#[cfg(windows)]
fn elevated_open(path: &Path) -> Result<Option<Child>> {
    // Start-Process -Verb RunAs prompts for elevation; the payload runs in a
    // separate session with no handle we can wait on.
    let mut cmd = Command::new("powershell");
    cmd.arg("-NoProfile")
        .arg("-Command")
        .arg(format!("Start-Process -FilePath '{}' -Verb RunAs", path.display()));
    let mut child = cmd
        .spawn()
        .map_err(|e| PackError::Launch(format!("Elevated open failed: {e}")))?;
    let status = child
        .wait()
        .map_err(|e| PackError::Launch(format!("Elevated open wait failed: {e}")))?;
    if !status.success() {
        return Err(PackError::Launch(format!(
            "Elevation request for {} exited with {status}",
            path.display()
        )));
    }
    Ok(None)
}

#[cfg(not(windows))]
fn elevated_open(path: &Path) -> Result<Option<Child>> {
    // pkexec runs the payload as a real child, so a handle does come back
    let pkexec = which::which("pkexec")
        .map_err(|e| PackError::Launch(format!("No elevation helper available: {e}")))?;
    let child = Command::new(pkexec)
        .arg(path)
        .spawn()
        .map_err(|e| PackError::Launch(format!("Elevated open failed: {e}")))?;
    Ok(Some(child))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(PayloadKind::classify(".exe"), PayloadKind::Program);
        assert_eq!(PayloadKind::classify(".EXE"), PayloadKind::Program);
        assert_eq!(PayloadKind::classify(".bin"), PayloadKind::Program);
        assert_eq!(PayloadKind::classify(".bat"), PayloadKind::Script);
        assert_eq!(PayloadKind::classify(".cmd"), PayloadKind::Script);
        assert_eq!(PayloadKind::classify(".sh"), PayloadKind::Script);
        assert_eq!(PayloadKind::classify(".txt"), PayloadKind::Document);
        assert_eq!(PayloadKind::classify(".pdf"), PayloadKind::Document);
        assert_eq!(PayloadKind::classify(""), PayloadKind::Document);
        assert_eq!(PayloadKind::classify(".tmp"), PayloadKind::Document);
    }

    #[cfg(unix)]
    #[test]
    fn test_script_runs_through_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("probe.sh");
        let witness = dir.path().join("witness");
        // No shebang and no execute bit: only interpreter routing can run it
        std::fs::write(&script, format!("touch {}\n", witness.display())).unwrap();

        let outcome = launch(&script, PayloadKind::Script).unwrap();
        assert_eq!(outcome.strategy, LaunchStrategy::Interpreter);
        let mut child = outcome.child.unwrap();
        assert!(child.wait().unwrap().success());
        assert!(witness.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_direct_spawn_of_program() {
        // Any executable on PATH works as a stand-in program payload
        let true_bin = which::which("true").unwrap();
        let outcome = launch(&true_bin, PayloadKind::Program).unwrap();
        assert_eq!(outcome.strategy, LaunchStrategy::Direct);
        outcome.child.unwrap().wait().unwrap();
    }
}
