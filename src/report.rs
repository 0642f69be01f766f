//! Run reporting
//!
//! The produced interfaces: an NDJSON event stream for machine consumers,
//! per-target terminal lines for humans, a JSON outcomes array for
//! downstream reporting, and the textual summary. The summary always
//! states a non-zero failure count in text, so operators reading logs see
//! it without checking the exit code.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use is_terminal::IsTerminal;
use serde::Serialize;

use crate::error::FleetResult;
use crate::executor::{EventSink, ExecEvent, RunReport};
use crate::models::{ExecutionMode, OperationResult, OperationStatus};

/// One row of the outcomes array handed to downstream reporting.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub identifier: String,
    pub display_name: String,
    pub status: OperationStatus,
}

pub fn outcomes(results: &[OperationResult]) -> Vec<Outcome> {
    results
        .iter()
        .map(|result| Outcome {
            identifier: result.target.id.to_string(),
            display_name: result.target.display_name.clone(),
            status: result.status,
        })
        .collect()
}

/// Write the outcomes array to a file as pretty-printed JSON.
pub fn write_outcomes(path: &Path, results: &[OperationResult]) -> FleetResult<()> {
    let json = serde_json::to_string_pretty(&outcomes(results))?;
    fs::write(path, json)?;
    Ok(())
}

/// Write a single NDJSON event (one JSON object per line).
pub fn write_event(out: &mut impl Write, event: &serde_json::Value) -> io::Result<()> {
    let line = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    Ok(())
}

/// NDJSON event stream for `--json` mode.
pub struct JsonSink;

impl EventSink for JsonSink {
    fn emit(&self, event: &ExecEvent) {
        let value = match event {
            ExecEvent::RunStarted {
                operation,
                dry_run,
                total,
            } => serde_json::json!({
                "event": "start",
                "operation": operation,
                "dry_run": dry_run,
                "total": total,
            }),
            ExecEvent::PhaseStarted {
                phase,
                index,
                total_phases,
            } => serde_json::json!({
                "event": "phase",
                "phase": phase,
                "index": index,
                "total_phases": total_phases,
            }),
            ExecEvent::TargetStarted {
                index, phase, id, ..
            } => serde_json::json!({
                "event": "target_start",
                "index": index,
                "phase": phase,
                "id": id,
            }),
            ExecEvent::Detail { id, message } => serde_json::json!({
                "event": "detail",
                "id": id,
                "message": message,
            }),
            ExecEvent::TargetOk {
                index, phase, id, ..
            } => serde_json::json!({
                "event": "target_ok",
                "index": index,
                "phase": phase,
                "id": id,
            }),
            ExecEvent::TargetSkipped {
                index,
                phase,
                id,
                reason,
                ..
            } => serde_json::json!({
                "event": "target_skipped",
                "index": index,
                "phase": phase,
                "id": id,
                "reason": reason,
            }),
            ExecEvent::TargetError {
                index,
                phase,
                id,
                error,
                ..
            } => serde_json::json!({
                "event": "target_error",
                "index": index,
                "phase": phase,
                "id": id,
                "error": error,
            }),
            ExecEvent::RunCancelled { operation } => serde_json::json!({
                "event": "cancelled",
                "operation": operation,
            }),
            ExecEvent::RunCompleted { operation, summary } => serde_json::json!({
                "event": "complete",
                "operation": operation,
                "total": summary.total,
                "succeeded": summary.succeeded,
                "failed": summary.failed,
                "skipped": summary.skipped,
            }),
        };
        let mut out = io::stdout().lock();
        let _ = write_event(&mut out, &value);
        let _ = out.flush();
    }
}

/// Whether stdout is a terminal that can take ANSI color.
pub fn supports_color() -> bool {
    io::stdout().is_terminal()
}

fn paint(code: &str, text: &str, color: bool) -> String {
    if color {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

pub fn green(text: &str, color: bool) -> String {
    paint("32", text, color)
}

pub fn red(text: &str, color: bool) -> String {
    paint("31", text, color)
}

pub fn yellow(text: &str, color: bool) -> String {
    paint("33", text, color)
}

/// Human per-event terminal lines.
pub struct HumanSink {
    pub color: bool,
    pub multi_phase: bool,
}

impl EventSink for HumanSink {
    fn emit(&self, event: &ExecEvent) {
        match event {
            ExecEvent::RunStarted { .. } | ExecEvent::TargetStarted { .. } => {}
            ExecEvent::PhaseStarted { phase, total_phases, .. } => {
                if self.multi_phase && *total_phases > 1 {
                    println!("\nPhase: {phase}");
                }
            }
            ExecEvent::Detail { message, .. } => {
                println!("  - {message}");
            }
            ExecEvent::TargetOk { display_name, .. } => {
                println!("  {} {display_name}", green("✓", self.color));
            }
            ExecEvent::TargetSkipped {
                display_name,
                reason,
                ..
            } => {
                println!(
                    "  {} {display_name} ({reason})",
                    yellow("⚠", self.color)
                );
            }
            ExecEvent::TargetError {
                display_name,
                error,
                ..
            } => {
                println!("  {} {display_name}: {error}", red("✗", self.color));
            }
            ExecEvent::RunCancelled { operation } => {
                println!("\n{operation} cancelled - no changes made.");
            }
            ExecEvent::RunCompleted { .. } => {}
        }
    }
}

/// Render the closing summary block.
pub fn render_summary(operation: &str, report: &RunReport, mode: ExecutionMode) -> String {
    if report.cancelled {
        return format!(
            "Summary: {operation} cancelled by operator - 0 of {} targets processed\n",
            report.summary.total
        );
    }
    let s = report.summary;
    let mut text = format!(
        "Summary: {} targets - {} succeeded, {} failed, {} skipped\n",
        s.total, s.succeeded, s.failed, s.skipped
    );
    if s.failed > 0 {
        text.push_str(&format!(
            "⚠ {} of {} targets failed - inspect the lines above before re-running\n",
            s.failed, s.total
        ));
    }
    if mode.is_dry_run() {
        text.push_str("(dry run - no changes were made)\n");
    }
    text
}
