//! Batch execution
//!
//! Drives a pluggable per-target [`Action`] over a resolved selection,
//! strictly sequentially and in resolution order. Dry-run and apply walk
//! the same loop and emit the same events, so a dry-run is an exact
//! rehearsal. One target's failure never escapes the loop: it is recorded
//! and, under continue-on-error, the batch moves on.

use crate::catalog::CatalogError;
use crate::models::{ExecutionMode, OperationResult, Summary, TargetRef};
use crate::selector::{ResolutionPolicy, Selection};

/// What to do with the rest of the batch after a per-target failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Continue,
    Stop,
}

/// Outcome of one phase of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The phase did (or previewed) its work
    Done,
    /// Nothing applicable for this target
    Skipped(String),
}

/// A per-target operation, implemented once per fleet command.
///
/// Multi-phase actions run phase 0 across every target before phase 1
/// starts; phases are never interleaved across targets. The preview path
/// (`ExecutionMode::DryRun`) must perform the same read-only lookups and
/// emit the same events as apply while issuing no mutating call.
pub trait Action {
    /// Operation name for logs and summaries, e.g. "move".
    fn operation(&self) -> &'static str;

    /// How explicit-entry resolution failures are handled for this
    /// operation. Declared here, not decided ad hoc by callers.
    fn resolution_policy(&self) -> ResolutionPolicy;

    /// Declared default; destructive operations continue on error.
    fn default_error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Continue
    }

    /// Ordered phase names. Single-phase actions use the default.
    fn phases(&self) -> Vec<&'static str> {
        vec!["apply"]
    }

    /// Impact preview requiring explicit confirmation, if this operation
    /// needs one before mutating.
    fn confirmation(&self, _selection: &Selection) -> Option<String> {
        None
    }

    /// Run one phase for one target.
    fn run(
        &self,
        phase: usize,
        target: &TargetRef,
        mode: ExecutionMode,
        events: &dyn EventSink,
    ) -> Result<ActionOutcome, CatalogError>;
}

/// Asks the operator to confirm an impact preview.
pub trait Confirmer {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Terminal confirmation via an interactive yes/no prompt.
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Fixed answer, for scripted runs and tests.
pub struct PresetConfirmer(pub bool);

impl Confirmer for PresetConfirmer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Events emitted during a run, identical in dry-run and apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    RunStarted {
        operation: String,
        dry_run: bool,
        total: usize,
    },
    PhaseStarted {
        phase: String,
        index: usize,
        total_phases: usize,
    },
    TargetStarted {
        index: usize,
        phase: String,
        id: String,
        display_name: String,
    },
    /// Action-emitted detail line, e.g. one per relocated dependent
    Detail {
        id: String,
        message: String,
    },
    TargetOk {
        index: usize,
        phase: String,
        id: String,
        display_name: String,
    },
    TargetSkipped {
        index: usize,
        phase: String,
        id: String,
        display_name: String,
        reason: String,
    },
    TargetError {
        index: usize,
        phase: String,
        id: String,
        display_name: String,
        error: String,
    },
    RunCancelled {
        operation: String,
    },
    RunCompleted {
        operation: String,
        summary: Summary,
    },
}

pub trait EventSink {
    fn emit(&self, event: &ExecEvent);
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &ExecEvent) {}
}

#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub mode: ExecutionMode,
    pub error_policy: ErrorPolicy,
    /// Skip the confirmation gate (`--yes`)
    pub assume_yes: bool,
}

/// Result of one batch run. `cancelled` means the operator declined the
/// impact preview: a distinguished non-error, nothing was attempted.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<OperationResult>,
    pub summary: Summary,
    pub cancelled: bool,
}

impl RunReport {
    fn cancelled(total: usize) -> Self {
        Self {
            results: Vec::new(),
            summary: Summary {
                total,
                ..Summary::default()
            },
            cancelled: true,
        }
    }
}

/// Per-target progress while the phases run. `Did` carries the last
/// phase that completed for the target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Progress {
    Pending,
    Did(usize),
    Skipped(String),
    Failed(String),
}

pub struct BatchExecutor<'a> {
    confirmer: &'a dyn Confirmer,
    events: &'a dyn EventSink,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(confirmer: &'a dyn Confirmer, events: &'a dyn EventSink) -> Self {
        Self { confirmer, events }
    }

    pub fn run(
        &self,
        selection: &Selection,
        action: &dyn Action,
        opts: &ExecOptions,
    ) -> RunReport {
        let targets = &selection.targets;
        self.events.emit(&ExecEvent::RunStarted {
            operation: action.operation().to_string(),
            dry_run: opts.mode.is_dry_run(),
            total: targets.len(),
        });

        // Confirmation gate: only a real, unforced run over a non-empty
        // selection needs an explicit yes.
        if opts.mode == ExecutionMode::Apply && !opts.assume_yes && !targets.is_empty() {
            if let Some(prompt) = action.confirmation(selection) {
                if !self.confirmer.confirm(&prompt) {
                    self.events.emit(&ExecEvent::RunCancelled {
                        operation: action.operation().to_string(),
                    });
                    return RunReport::cancelled(targets.len());
                }
            }
        }

        let phases = action.phases();
        let mut progress = vec![Progress::Pending; targets.len()];
        let mut stopped = false;

        'phases: for (phase_index, phase) in phases.iter().enumerate() {
            self.events.emit(&ExecEvent::PhaseStarted {
                phase: phase.to_string(),
                index: phase_index,
                total_phases: phases.len(),
            });
            for (index, target) in targets.iter().enumerate() {
                // A target that already failed is not driven through
                // later phases; its partial state stays retryable.
                if matches!(progress[index], Progress::Failed(_)) {
                    continue;
                }
                self.events.emit(&ExecEvent::TargetStarted {
                    index,
                    phase: phase.to_string(),
                    id: target.id.to_string(),
                    display_name: target.display_name.clone(),
                });
                match action.run(phase_index, target, opts.mode, self.events) {
                    Ok(ActionOutcome::Done) => {
                        progress[index] = Progress::Did(phase_index);
                        self.events.emit(&ExecEvent::TargetOk {
                            index,
                            phase: phase.to_string(),
                            id: target.id.to_string(),
                            display_name: target.display_name.clone(),
                        });
                    }
                    Ok(ActionOutcome::Skipped(reason)) => {
                        if progress[index] == Progress::Pending {
                            progress[index] = Progress::Skipped(reason.clone());
                        }
                        self.events.emit(&ExecEvent::TargetSkipped {
                            index,
                            phase: phase.to_string(),
                            id: target.id.to_string(),
                            display_name: target.display_name.clone(),
                            reason,
                        });
                    }
                    Err(err) => {
                        let message = err.to_string();
                        progress[index] = Progress::Failed(message.clone());
                        self.events.emit(&ExecEvent::TargetError {
                            index,
                            phase: phase.to_string(),
                            id: target.id.to_string(),
                            display_name: target.display_name.clone(),
                            error: message,
                        });
                        if opts.error_policy == ErrorPolicy::Stop {
                            stopped = true;
                            break 'phases;
                        }
                    }
                }
            }
        }

        let last_phase = phases.len() - 1;
        let results: Vec<OperationResult> = targets
            .iter()
            .zip(progress)
            .map(|(target, progress)| match progress {
                // A stop between phases leaves earlier targets with their
                // final phase unrun; their partial state is retryable and
                // must not read as success.
                Progress::Did(phase) if stopped && phase < last_phase => {
                    OperationResult::skipped(target.clone(), "stopped before completion")
                }
                Progress::Did(_) => OperationResult::succeeded(target.clone()),
                Progress::Skipped(reason) => OperationResult::skipped(target.clone(), reason),
                Progress::Failed(error) => OperationResult::failed(target.clone(), error),
                Progress::Pending => {
                    debug_assert!(stopped, "pending target after a completed run");
                    OperationResult::skipped(target.clone(), "not attempted (stopped on error)")
                }
            })
            .collect();

        let summary = Summary::from_results(&results);
        self.events.emit(&ExecEvent::RunCompleted {
            operation: action.operation().to_string(),
            summary,
        });
        RunReport {
            results,
            summary,
            cancelled: false,
        }
    }
}

/// Process exit code for a finished run: callers must never mistake
/// "ran to completion" for "fully succeeded".
pub fn exit_code(report: &RunReport) -> i32 {
    if report.summary.has_failures() {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectionOrigin;

    struct AlwaysOk;

    impl Action for AlwaysOk {
        fn operation(&self) -> &'static str {
            "noop"
        }

        fn resolution_policy(&self) -> ResolutionPolicy {
            ResolutionPolicy::BestEffort
        }

        fn run(
            &self,
            _phase: usize,
            _target: &TargetRef,
            _mode: ExecutionMode,
            _events: &dyn EventSink,
        ) -> Result<ActionOutcome, CatalogError> {
            Ok(ActionOutcome::Done)
        }
    }

    fn selection(names: &[&str]) -> Selection {
        Selection {
            targets: names
                .iter()
                .map(|n| TargetRef::new(format!("ocid1.t.oc1.iad.{n}"), *n))
                .collect(),
            origin: SelectionOrigin::Explicit,
            scope: None,
            failures: Vec::new(),
            warning: None,
        }
    }

    #[test]
    fn all_succeed() {
        let executor = BatchExecutor::new(&PresetConfirmer(true), &NullSink);
        let report = executor.run(
            &selection(&["a", "b"]),
            &AlwaysOk,
            &ExecOptions {
                mode: ExecutionMode::Apply,
                error_policy: ErrorPolicy::Continue,
                assume_yes: true,
            },
        );
        assert_eq!(report.summary.succeeded, 2);
        assert_eq!(exit_code(&report), 0);
    }

    #[test]
    fn empty_selection_yields_empty_summary() {
        let executor = BatchExecutor::new(&PresetConfirmer(true), &NullSink);
        let report = executor.run(
            &selection(&[]),
            &AlwaysOk,
            &ExecOptions {
                mode: ExecutionMode::Apply,
                error_policy: ErrorPolicy::Continue,
                assume_yes: false,
            },
        );
        assert_eq!(report.summary.total, 0);
        assert!(!report.cancelled);
    }
}
