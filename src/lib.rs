//! dsfleet - fleet administration for database-security registrations
//!
//! dsfleet resolves an operator's target selection (explicit names or
//! identifiers, a compartment scan, or a replayed snapshot) into a
//! concrete, deduplicated list and executes one operation across it:
//! compartment moves with dependency-aware two-phase relocation, metadata
//! refresh, environment retagging, and audit-collection start. Runs are
//! strictly sequential, dry-run is an exact rehearsal of apply, and one
//! target's failure never takes down the batch.

pub mod actions;
pub mod catalog;
pub mod compartment;
pub mod config;
pub mod error;
pub mod executor;
pub mod models;
pub mod report;
pub mod selector;
pub mod snapshot;

// Re-exports for convenience
pub use catalog::{CatalogError, HttpCatalog, InMemoryCatalog, TargetCatalog};
pub use compartment::{CompartmentRef, CompartmentResolver};
pub use config::Config;
pub use error::{FleetError, FleetResult};
pub use executor::{
    Action, ActionOutcome, BatchExecutor, Confirmer, ErrorPolicy, EventSink, ExecEvent,
    ExecOptions, NullSink, PresetConfirmer, RunReport, TerminalConfirmer,
};
pub use models::{
    ExecutionMode, LifecycleState, OperationResult, OperationStatus, Summary, Target, TargetRef,
};
pub use selector::{
    ResolutionPolicy, Selection, SelectionCriteria, SelectionSpec, SelectorOptions, TargetSelector,
};
pub use snapshot::{MaxAge, SelectionSnapshot, SnapshotEntry, SnapshotValidator};
