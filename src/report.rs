//! Text and JSON rendering of a [`ScanReport`].

use crate::container::ContainerRecord;
use crate::registry::{LayerNode, LayerRegistry, LayerSize};
use crate::scanner::ScanReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

/// Writes the human readable report: one block per container, then the
/// skipped containers, then the orphaned diffs.
pub fn render_text<W: Write>(report: &ScanReport, out: &mut W) -> io::Result<()> {
    for container in &report.containers {
        render_container(container, &report.registry, out)?;
        writeln!(out)?;
    }

    for skipped in &report.skipped {
        writeln!(
            out,
            "Skipped container {}: {}",
            skipped.identifier, skipped.reason
        )?;
    }
    if !report.skipped.is_empty() {
        writeln!(out)?;
    }

    if report.orphans.is_empty() {
        writeln!(out, "No unused layers detected!")?;
    } else {
        for orphan in &report.orphans {
            writeln!(out, "Diff {} is orphaned!", orphan)?;
        }
    }
    Ok(())
}

fn render_container<W: Write>(
    container: &ContainerRecord,
    registry: &LayerRegistry,
    out: &mut W,
) -> io::Result<()> {
    let details = &container.details;
    writeln!(
        out,
        "Statistics for container: {} ({})",
        details.name, container.identifier
    )?;
    writeln!(
        out,
        "- status: {}, pid {}, {} restarts, started {}",
        details.status,
        details.pid,
        details.restart_count,
        details
            .started_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    )?;
    writeln!(out, "- {} layers", container.layer_count(registry))?;
    writeln!(
        out,
        "- init diff location: {}",
        container.init_location.display()
    )?;
    writeln!(out, "- init diff size: {}", container.init_size)?;
    writeln!(
        out,
        "- mount diff location: {}",
        container.mount_location.display()
    )?;
    writeln!(out, "- mount diff size: {}", container.mount_size)?;

    writeln!(out, "Layers statistics:")?;
    for layer in container.layers(registry) {
        writeln!(out, "\tLayer id: {}", layer.digest)?;
        writeln!(out, "\t- diff location: {}", layer.location.display())?;
        writeln!(out, "\t- size: {}", layer.size)?;
        writeln!(out, "\t- shared count: {}", layer.reference_count)?;
        let containers = if layer.containers.is_empty() {
            "(inherited only)".to_string()
        } else {
            layer.containers.join(", ")
        };
        writeln!(out, "\t- containers: {}", containers)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    driver: &'a str,
    root: &'a Path,
    containers: Vec<JsonContainer<'a>>,
    skipped: Vec<JsonSkipped<'a>>,
    orphans: Vec<&'a str>,
}

#[derive(Serialize)]
struct JsonContainer<'a> {
    identifier: &'a str,
    name: &'a str,
    status: &'a str,
    pid: i64,
    restart_count: u64,
    started_at: Option<DateTime<Utc>>,
    mount: JsonDiff<'a>,
    init: JsonDiff<'a>,
    layers: Vec<JsonLayer<'a>>,
}

#[derive(Serialize)]
struct JsonDiff<'a> {
    id: &'a str,
    location: &'a Path,
    /// `null` when the backing device is not mounted
    size: LayerSize,
}

#[derive(Serialize)]
struct JsonLayer<'a> {
    digest: &'a str,
    storage_id: &'a str,
    location: &'a Path,
    /// `null` when the size record is missing or empty
    size: LayerSize,
    shared_count: usize,
    containers: &'a [String],
}

#[derive(Serialize)]
struct JsonSkipped<'a> {
    identifier: &'a str,
    reason: &'a str,
}

impl<'a> JsonLayer<'a> {
    fn from_node(node: &'a LayerNode) -> Self {
        Self {
            digest: &node.digest,
            storage_id: &node.storage_id,
            location: &node.location,
            size: node.size,
            shared_count: node.reference_count,
            containers: &node.containers,
        }
    }
}

pub fn render_json<W: Write>(report: &ScanReport, out: &mut W) -> serde_json::Result<()> {
    let containers = report
        .containers
        .iter()
        .map(|c| JsonContainer {
            identifier: &c.identifier,
            name: &c.details.name,
            status: &c.details.status,
            pid: c.details.pid,
            restart_count: c.details.restart_count,
            started_at: c.details.started_at,
            mount: JsonDiff {
                id: &c.mount_id,
                location: &c.mount_location,
                size: c.mount_size,
            },
            init: JsonDiff {
                id: &c.init_id,
                location: &c.init_location,
                size: c.init_size,
            },
            layers: c
                .layers(&report.registry)
                .map(JsonLayer::from_node)
                .collect(),
        })
        .collect();

    let json = JsonReport {
        driver: report.driver.as_str(),
        root: &report.root,
        containers,
        skipped: report
            .skipped
            .iter()
            .map(|s| JsonSkipped {
                identifier: &s.identifier,
                reason: &s.reason,
            })
            .collect(),
        orphans: report.orphans.iter().map(String::as_str).collect(),
    };
    serde_json::to_writer_pretty(out, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::DriverKind;
    use crate::inspect::ContainerDetails;
    use crate::scanner::SkippedContainer;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn sample_report(orphans: &[&str]) -> ScanReport {
        let mut registry = LayerRegistry::new();
        let top = registry.resolve("sha256:l1", Some("web")).unwrap();
        let base = registry.resolve("sha256:l0", None).unwrap();
        registry.node_mut(top).parent = Some(base);
        registry.node_mut(top).size = LayerSize::Unknown;
        registry.node_mut(base).size = LayerSize::Known(0);

        let container = ContainerRecord {
            identifier: "c1".to_string(),
            details: ContainerDetails::unnamed("web"),
            mount_id: "rw".to_string(),
            mount_location: PathBuf::from("/d/rw"),
            mount_size: LayerSize::Known(2048),
            init_id: "rw-init".to_string(),
            init_location: PathBuf::from("/d/rw-init"),
            init_size: LayerSize::Unknown,
            parent_chain_head: Some(top),
        };

        ScanReport {
            driver: DriverKind::Overlay2,
            root: PathBuf::from("/d"),
            containers: vec![container],
            skipped: vec![SkippedContainer {
                identifier: "broken".to_string(),
                reason: "malformed identifier: 'garbage'".to_string(),
            }],
            registry,
            orphans: orphans.iter().map(|o| o.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn text(report: &ScanReport) -> String {
        let mut out = Vec::new();
        render_text(report, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_report_blocks() {
        let output = text(&sample_report(&["orphan456"]));

        assert!(output.contains("Statistics for container: web (c1)"));
        assert!(output.contains("- 2 layers"));
        assert!(output.contains("- mount diff size: ") && output.contains("(2048 bytes)"));
        assert!(output.contains("- init diff size: unknown"));
        assert!(output.contains("\tLayer id: l1\n\t- diff location: \n\t- size: unknown"));
        assert!(output.contains("(0 bytes)"));
        assert!(output.contains("\t- containers: (inherited only)"));
        assert!(output.contains("Skipped container broken: malformed identifier: 'garbage'"));
        assert!(output.ends_with("Diff orphan456 is orphaned!\n"));
        assert!(!output.contains("No unused layers detected!"));
    }

    #[test]
    fn test_text_report_without_orphans() {
        let output = text(&sample_report(&[]));
        assert!(output.ends_with("No unused layers detected!\n"));
    }

    #[test]
    fn test_json_report() {
        let mut out = Vec::new();
        render_json(&sample_report(&["orphan456"]), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["driver"], "overlay2");
        assert_eq!(value["orphans"][0], "orphan456");
        assert_eq!(value["skipped"][0]["identifier"], "broken");
        let layers = &value["containers"][0]["layers"];
        assert_eq!(layers[0]["digest"], "l1");
        assert!(layers[0]["size"].is_null());
        assert_eq!(layers[1]["size"], 0);
        assert_eq!(layers[0]["containers"][0], "web");
        assert_eq!(value["containers"][0]["mount"]["size"], 2048);
        assert!(value["containers"][0]["init"]["size"].is_null());
    }
}
