use super::{ContainerDetails, Inspector};
use crate::error::{Result, ScanError};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Runs `docker inspect <id>` and decodes its JSON output
pub struct DockerInspector {
    binary: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    restart_count: u64,
    #[serde(default)]
    state: InspectState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
    #[serde(default)]
    pid: i64,
    #[serde(default)]
    started_at: String,
}

impl DockerInspector {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn run_inspect(&self, identifier: &str) -> Result<String> {
        let failed = |reason: String| ScanError::Inspect {
            container: identifier.to_string(),
            reason,
        };

        let mut child = Command::new(&self.binary)
            .args(["inspect", "--type", "container", identifier])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| failed(format!("failed to execute {}: {}", self.binary, e)))?;

        // Drain stdout on its own thread so a large inspect document cannot fill the
        // pipe while we wait for the process.
        let reader = child.stdout.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buffer = String::new();
                pipe.read_to_string(&mut buffer).map(|_| buffer)
            })
        });

        let status = match child
            .wait_timeout(self.timeout)
            .map_err(|e| failed(e.to_string()))?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ScanError::Timeout {
                    what: format!("{} inspect {}", self.binary, identifier),
                    after: self.timeout,
                });
            }
        };

        let stdout = match reader {
            Some(handle) => handle
                .join()
                .map_err(|_| failed("stdout reader panicked".to_string()))?
                .map_err(|e| failed(e.to_string()))?,
            None => String::new(),
        };

        // `docker inspect` exits non-zero and prints `[]` for unknown ids
        if !status.success() && stdout.trim().is_empty() {
            return Err(failed(format!("{} exited with {}", self.binary, status)));
        }
        Ok(stdout)
    }
}

impl Inspector for DockerInspector {
    fn name(&self) -> &str {
        "docker"
    }

    fn inspect(&self, identifier: &str) -> Result<ContainerDetails> {
        debug!("Inspecting container {}", identifier);
        let output = self.run_inspect(identifier)?;
        parse_inspect_output(identifier, &output)
    }
}

fn parse_inspect_output(identifier: &str, output: &str) -> Result<ContainerDetails> {
    let entries: Vec<InspectEntry> =
        serde_json::from_str(output).map_err(|e| ScanError::Inspect {
            container: identifier.to_string(),
            reason: format!("unreadable inspect output: {e}"),
        })?;

    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| ScanError::NotFound {
            container: identifier.to_string(),
        })?;

    let name = entry.name.trim_start_matches('/');
    Ok(ContainerDetails {
        name: if name.is_empty() {
            identifier.to_string()
        } else {
            name.to_string()
        },
        status: entry.state.status,
        pid: entry.state.pid,
        restart_count: entry.restart_count,
        started_at: parse_started_at(&entry.state.started_at),
    })
}

/// Docker reports `0001-01-01T00:00:00Z` for containers that never ran
fn parse_started_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| dt.timestamp() > 0)
}
