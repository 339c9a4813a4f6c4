//! Sequential payload launch loop with wait semantics and cleanup.

pub mod command;
pub mod probe;

use command::{LaunchStrategy, PayloadKind};
use probe::{ProcessProbe, SystemProbe};

use super::extraction;
use super::loader::LoadedContainer;
use super::manifest::PayloadEntry;
use crate::exceptions::{PackError, Result};
use log::{debug, error, info, warn};
use std::path::Path;
use std::time::Duration;

/// Fixed probe poll interval
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Grace period before the first probe poll, so the target can appear
const STARTUP_GRACE: Duration = Duration::from_millis(1000);
/// Longer grace for elevated launches: the elevation prompt takes time
const ELEVATED_STARTUP_GRACE: Duration = Duration::from_millis(2000);

/// Runtime knobs for the launch loop, with an injectable liveness probe
#[derive(Debug)]
pub struct LaunchConfig {
    pub probe: Box<dyn ProcessProbe>,
    pub poll_interval: Duration,
    pub startup_grace: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        LaunchConfig {
            probe: Box::new(SystemProbe),
            poll_interval: POLL_INTERVAL,
            startup_grace: STARTUP_GRACE,
        }
    }
}

/// What happened to one entry during the launch loop
#[derive(Debug)]
pub struct EntryFailure {
    pub execution_order: u32,
    pub error: PackError,
}

/// Summary of a full launch loop run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub launched: usize,
    pub failures: Vec<EntryFailure>,
}

/// Extract and launch every payload in ascending execution order.
///
/// One payload at a time: with `wait_for_previous` set, each iteration
/// blocks until the previous payload is gone before the next starts. A
/// single entry's extraction or launch failure is recorded and the loop
/// proceeds to the next entry - it never halts the chain.
///
/// There is no cancellation and no timeout once the loop begins: a hung
/// waited-on payload blocks the rest of the chain until the carrier process
/// itself is killed. That unbounded wait is intentional.
pub fn run_all(carrier: &[u8], container: &LoadedContainer, config: &LaunchConfig) -> RunSummary {
    let wait = container.manifest.wait_for_previous;
    let mut entries: Vec<PayloadEntry> = container.manifest.entries.clone();
    entries.sort_by_key(|e| e.execution_order);

    info!(
        "Launching {} payload(s), wait_for_previous={wait}",
        entries.len()
    );

    let mut summary = RunSummary::default();
    for entry in &entries {
        let temp_path = match extraction::extract(carrier, entry, container.blob_start) {
            Ok(path) => path,
            Err(e) => {
                error!("Extraction of entry {} failed: {e}", entry.execution_order);
                summary.failures.push(EntryFailure {
                    execution_order: entry.execution_order,
                    error: e,
                });
                continue;
            }
        };

        match run_entry(&temp_path, &entry.extension, wait, config) {
            Ok(()) => summary.launched += 1,
            Err(e) => {
                error!("Launch of entry {} failed: {e}", entry.execution_order);
                summary.failures.push(EntryFailure {
                    execution_order: entry.execution_order,
                    error: e,
                });
            }
        }

        // Waited-on payloads are done with their temp file; fire-and-forget
        // payloads may still need theirs, so the file is deliberately left
        // behind for external cleanup.
        if wait {
            if let Err(e) = std::fs::remove_file(&temp_path) {
                warn!("Could not remove temp file {}: {e}", temp_path.display());
            }
        }
    }

    info!(
        "Launch loop finished: {} launched, {} failed",
        summary.launched,
        summary.failures.len()
    );
    summary
}

/// Launch one extracted payload, honoring the wait flag
pub fn run_entry(path: &Path, extension: &str, wait: bool, config: &LaunchConfig) -> Result<()> {
    let kind = PayloadKind::classify(extension);
    debug!("Launching {} as {kind:?}", path.display());

    let outcome = command::launch(path, kind)?;

    if !wait {
        return Ok(());
    }

    match outcome.child {
        Some(mut child) => {
            debug!("Waiting on process handle for {}", path.display());
            let status = child.wait()?;
            debug!("{} exited with {status}", path.display());
        }
        None => {
            let grace = if outcome.strategy == LaunchStrategy::Elevated {
                ELEVATED_STARTUP_GRACE
            } else {
                config.startup_grace
            };
            wait_by_probe(path, grace, config);
        }
    }
    Ok(())
}

/// Poll the process list until no process matches the payload's base name.
///
/// An approximation: a coincidentally named unrelated process keeps the
/// wait alive. That false positive is a known gap, accepted as-is.
fn wait_by_probe(path: &Path, grace: Duration, config: &LaunchConfig) {
    let Some(base_name) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    debug!("No process handle; probing for '{base_name}'");

    std::thread::sleep(grace);
    while config.probe.is_running(base_name) {
        std::thread::sleep(config.poll_interval);
    }
    debug!("Probe reports '{base_name}' is gone");
}
