//! Metadata refresh
//!
//! Asks the service to re-read each target's details from the underlying
//! database. Single-phase, best-effort resolution.

use crate::catalog::{CatalogError, TargetCatalog};
use crate::executor::{Action, ActionOutcome, EventSink, ExecEvent};
use crate::models::{ExecutionMode, TargetRef};
use crate::selector::ResolutionPolicy;

pub struct RefreshTargets<'a, C: TargetCatalog> {
    catalog: &'a C,
}

impl<'a, C: TargetCatalog> RefreshTargets<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }
}

impl<C: TargetCatalog> Action for RefreshTargets<'_, C> {
    fn operation(&self) -> &'static str {
        "refresh"
    }

    fn resolution_policy(&self) -> ResolutionPolicy {
        ResolutionPolicy::BestEffort
    }

    fn run(
        &self,
        _phase: usize,
        target: &TargetRef,
        mode: ExecutionMode,
        events: &dyn EventSink,
    ) -> Result<ActionOutcome, CatalogError> {
        let verb = if mode.is_dry_run() {
            "would refresh"
        } else {
            "refresh"
        };
        events.emit(&ExecEvent::Detail {
            id: target.id.to_string(),
            message: format!("{verb} metadata for '{}'", target.display_name),
        });
        if !mode.is_dry_run() {
            self.catalog.refresh_target(&target.id)?;
        }
        Ok(ActionOutcome::Done)
    }
}
