//! Audit collection start
//!
//! Enumerates each target's audit trails and starts collection on every
//! trail that is not already collecting. Targets with no idle trail are
//! recorded skipped.

use crate::catalog::{CatalogError, TargetCatalog};
use crate::executor::{Action, ActionOutcome, EventSink, ExecEvent};
use crate::models::{ExecutionMode, TargetRef};
use crate::selector::ResolutionPolicy;

pub struct StartAuditCollection<'a, C: TargetCatalog> {
    catalog: &'a C,
}

impl<'a, C: TargetCatalog> StartAuditCollection<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }
}

impl<C: TargetCatalog> Action for StartAuditCollection<'_, C> {
    fn operation(&self) -> &'static str {
        "audit-start"
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
        let trails = self.catalog.list_audit_trails(&target.id)?;
        let idle: Vec<_> = trails.into_iter().filter(|t| t.is_idle()).collect();
        if idle.is_empty() {
            return Ok(ActionOutcome::Skipped(format!(
                "no idle audit trails on '{}'",
                target.display_name
            )));
        }
        let verb = if mode.is_dry_run() {
            "would start"
        } else {
            "start"
        };
        for trail in idle {
            events.emit(&ExecEvent::Detail {
                id: target.id.to_string(),
                message: format!(
                    "{verb} collection on audit trail '{}' of '{}'",
                    trail.display_name, target.display_name
                ),
            });
            if !mode.is_dry_run() {
                self.catalog.start_audit_trail(&trail.id)?;
            }
        }
        Ok(ActionOutcome::Done)
    }
}
