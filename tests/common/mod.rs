//! Common test utilities for dsfleet integration tests.
//!
//! Provides an in-memory fleet fixture (two compartments, a mixed target
//! population) and a recording event sink for structural assertions.

#![allow(dead_code)]

use std::cell::RefCell;

use dsfleet::catalog::InMemoryCatalog;
use dsfleet::executor::{EventSink, ExecEvent};
use dsfleet::models::LifecycleState;

/// Source compartment ("ops") for fleet fixtures.
pub const SRC: &str = "ocid1.compartment.oc1.iad.aaaaops";
/// Destination compartment ("prod") for move fixtures.
pub const DST: &str = "ocid1.compartment.oc1.iad.aaaaprod";

/// Build an OCID-shaped target identifier.
pub fn tid(suffix: &str) -> String {
    format!("ocid1.datasafetarget.oc1.iad.{suffix}")
}

/// Build an OCID-shaped dependent-resource identifier.
pub fn rid(suffix: &str) -> String {
    format!("ocid1.datasaferesource.oc1.iad.{suffix}")
}

/// Two compartments, no targets. Callers add what they need.
pub fn empty_fleet() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_compartment(SRC, "ops")
        .with_compartment(DST, "prod")
}

/// The standard scan population: five ACTIVE and two NEEDS_ATTENTION
/// targets, all in the source compartment.
pub fn mixed_fleet() -> InMemoryCatalog {
    let catalog = empty_fleet();
    for n in 1..=5 {
        catalog.add_target(
            &tid(&format!("active{n}")),
            &format!("prod-db-{n}"),
            LifecycleState::Active,
            SRC,
        );
    }
    for n in 1..=2 {
        catalog.add_target(
            &tid(&format!("attention{n}")),
            &format!("flagged-db-{n}"),
            LifecycleState::NeedsAttention,
            SRC,
        );
    }
    catalog
}

/// Captures every event for structural comparisons.
#[derive(Default)]
pub struct RecordingSink {
    pub events: RefCell<Vec<ExecEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Structural shape of the event stream: one tag per event, carrying
    /// the per-target id but not mode-dependent message text. Dry-run and
    /// apply runs over the same selection must produce identical shapes.
    pub fn shape(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .map(|event| match event {
                ExecEvent::RunStarted { total, .. } => format!("start:{total}"),
                ExecEvent::PhaseStarted { phase, .. } => format!("phase:{phase}"),
                ExecEvent::TargetStarted { phase, id, .. } => {
                    format!("target_start:{phase}:{id}")
                }
                ExecEvent::Detail { id, .. } => format!("detail:{id}"),
                ExecEvent::TargetOk { phase, id, .. } => format!("ok:{phase}:{id}"),
                ExecEvent::TargetSkipped { phase, id, .. } => format!("skipped:{phase}:{id}"),
                ExecEvent::TargetError { phase, id, .. } => format!("error:{phase}:{id}"),
                ExecEvent::RunCancelled { .. } => "cancelled".to_string(),
                ExecEvent::RunCompleted { .. } => "complete".to_string(),
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &ExecEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
