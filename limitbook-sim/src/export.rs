//! Report export — JSON report and CSV fill tape.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use limitbook_core::domain::FillRecord;

use crate::report::{SimReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &SimReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize SimReport to JSON")
}

/// Deserialize a report, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<SimReport> {
    let report: SimReport =
        serde_json::from_str(json).context("failed to deserialize SimReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: sweep, order_id, pool_id, level, direction, amount_in, amount_out
pub fn export_fills_csv(fills: &[FillRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "sweep",
        "order_id",
        "pool_id",
        "level",
        "direction",
        "amount_in",
        "amount_out",
    ])?;
    for f in fills {
        wtr.write_record([
            f.sweep.to_string().as_str(),
            f.order_id.0.as_str(),
            f.pool_id.0.as_str(),
            f.level.to_string().as_str(),
            f.direction.as_str(),
            f.amount_in.to_string().as_str(),
            f.amount_out.to_string().as_str(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `report.json` and `fills.csv` into `output_dir` (created if missing).
/// Returns the report path.
pub fn save_artifacts(report: &SimReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let report_path = output_dir.join("report.json");
    std::fs::write(&report_path, export_json(report)?)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    let fills_path = output_dir.join("fills.csv");
    std::fs::write(&fills_path, export_fills_csv(&report.fills)?)
        .with_context(|| format!("failed to write {}", fills_path.display()))?;

    Ok(report_path)
}
