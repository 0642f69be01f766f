//! Compartment move
//!
//! Relocates targets and their dependent resources to a destination
//! compartment in two phases: every dependent of every selected target
//! first, then the target objects themselves. Dependents are enumerated
//! fresh while the target is still discoverable in its original
//! compartment, so nothing is stranded referencing an already-moved
//! target. Each relocate is addressed by resource identifier, which makes
//! a re-run after partial failure safe: resources already moved are no
//! longer found in the stale compartment and are not reprocessed.

use crate::catalog::{CatalogError, TargetCatalog};
use crate::compartment::CompartmentRef;
use crate::error::{FleetError, FleetResult};
use crate::executor::{Action, ActionOutcome, ErrorPolicy, EventSink, ExecEvent};
use crate::models::{DependencyKind, ExecutionMode, TargetRef};
use crate::selector::{ResolutionPolicy, Selection};

const PHASE_DEPENDENTS: usize = 0;

pub struct MoveTargets<'a, C: TargetCatalog> {
    catalog: &'a C,
    source: CompartmentRef,
    destination: CompartmentRef,
    include_dependents: bool,
}

impl<'a, C: TargetCatalog> MoveTargets<'a, C> {
    /// Source and destination must differ; checked once against the single
    /// resolved source scope, even when a sub-tree scan drew targets from
    /// several sub-compartments.
    pub fn new(
        catalog: &'a C,
        source: CompartmentRef,
        destination: CompartmentRef,
        include_dependents: bool,
    ) -> FleetResult<Self> {
        if source.id == destination.id {
            return Err(FleetError::SameCompartment {
                compartment: destination.describe(),
            });
        }
        Ok(Self {
            catalog,
            source,
            destination,
            include_dependents,
        })
    }

    fn verb(mode: ExecutionMode) -> &'static str {
        if mode.is_dry_run() {
            "would relocate"
        } else {
            "relocate"
        }
    }

    fn move_dependents(
        &self,
        target: &TargetRef,
        mode: ExecutionMode,
        events: &dyn EventSink,
    ) -> Result<ActionOutcome, CatalogError> {
        // Fresh enumeration in the target's current compartment, before
        // the target itself has moved.
        let current = self.catalog.get_target(&target.id)?;
        for kind in DependencyKind::ALL {
            let mut dependents =
                self.catalog
                    .list_dependents(kind, &current.compartment_id, &target.id)?;
            // Resources already in the destination (a prior partial run)
            // are not reprocessed.
            dependents.retain(|d| d.compartment_id != self.destination.id);
            for dependent in dependents {
                events.emit(&ExecEvent::Detail {
                    id: target.id.to_string(),
                    message: format!(
                        "{} {} '{}' to {}",
                        Self::verb(mode),
                        kind,
                        dependent.display_name,
                        self.destination.name
                    ),
                });
                if !mode.is_dry_run() {
                    self.catalog
                        .relocate_dependent(kind, &dependent.id, &self.destination.id)?;
                }
            }
        }
        Ok(ActionOutcome::Done)
    }

    fn move_target(
        &self,
        target: &TargetRef,
        mode: ExecutionMode,
        events: &dyn EventSink,
    ) -> Result<ActionOutcome, CatalogError> {
        let current = self.catalog.get_target(&target.id)?;
        if current.compartment_id == self.destination.id {
            events.emit(&ExecEvent::Detail {
                id: target.id.to_string(),
                message: format!(
                    "target '{}' already in {}",
                    target.display_name, self.destination.name
                ),
            });
            return Ok(ActionOutcome::Done);
        }
        events.emit(&ExecEvent::Detail {
            id: target.id.to_string(),
            message: format!(
                "{} target '{}' to {}",
                Self::verb(mode),
                target.display_name,
                self.destination.name
            ),
        });
        if !mode.is_dry_run() {
            self.catalog
                .relocate_target(&target.id, &self.destination.id)?;
        }
        Ok(ActionOutcome::Done)
    }
}

impl<C: TargetCatalog> Action for MoveTargets<'_, C> {
    fn operation(&self) -> &'static str {
        "move"
    }

    fn resolution_policy(&self) -> ResolutionPolicy {
        ResolutionPolicy::Strict
    }

    fn default_error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Continue
    }

    fn phases(&self) -> Vec<&'static str> {
        if self.include_dependents {
            vec!["dependents", "targets"]
        } else {
            vec!["targets"]
        }
    }

    fn confirmation(&self, selection: &Selection) -> Option<String> {
        let dependents = if self.include_dependents {
            "included"
        } else {
            "skipped"
        };
        Some(format!(
            "Move {} target(s)\n  from: {}\n  to:   {}\n  dependent resources: {}\nProceed?",
            selection.len(),
            selection.describe_source(),
            self.destination.describe(),
            dependents
        ))
    }

    fn run(
        &self,
        phase: usize,
        target: &TargetRef,
        mode: ExecutionMode,
        events: &dyn EventSink,
    ) -> Result<ActionOutcome, CatalogError> {
        if self.include_dependents && phase == PHASE_DEPENDENTS {
            self.move_dependents(target, mode, events)
        } else {
            self.move_target(target, mode, events)
        }
    }
}

impl<C: TargetCatalog> MoveTargets<'_, C> {
    pub fn source(&self) -> &CompartmentRef {
        &self.source
    }

    pub fn destination(&self) -> &CompartmentRef {
        &self.destination
    }
}
