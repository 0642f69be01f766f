//! Error types for dsfleet
//!
//! The taxonomy follows the operator-facing contract: validation errors are
//! raised before any service call, resolution errors before any mutation,
//! and per-target failures never escape the batch loop (they are folded
//! into the run summary instead). Every fatal message names the corrective
//! action.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;

/// Result type alias for fleet operations
pub type FleetResult<T> = Result<T, FleetError>;

/// Main error type for fleet operations
#[derive(Error, Debug)]
pub enum FleetError {
    /// More than one selection source was supplied
    #[error(
        "conflicting selection sources - use exactly one of --targets, a compartment scan, or --from-snapshot"
    )]
    ConflictingSelection,

    /// Scan-only filters supplied alongside another selection source
    #[error("--lifecycle-state and --name-filter only apply to compartment scans - drop them or drop --targets/--from-snapshot")]
    FilterWithoutScan,

    /// Explicit list was empty after trimming separators
    #[error("no target names or identifiers were supplied - pass --targets with at least one entry")]
    EmptySelection,

    /// Name-filter pattern failed to compile
    #[error("invalid name filter '{pattern}': {message} - fix the regular expression")]
    InvalidFilter { pattern: String, message: String },

    /// A retag rule pattern failed to compile
    #[error("invalid tag rule pattern '{pattern}': {message} - fix the rule in the [tags] config section")]
    InvalidTagRule { pattern: String, message: String },

    /// Move destination missing
    #[error("no destination given - supply a destination compartment with --destination")]
    MissingDestination,

    /// Move source and destination are the same compartment
    #[error("source and destination are both compartment '{compartment}' - supply a different --destination")]
    SameCompartment { compartment: String },

    /// Unparseable snapshot max-age value
    #[error("invalid max age '{value}' - use bare seconds, a 30m/12h/7d style duration, or 'disable'")]
    InvalidMaxAge { value: String },

    /// Snapshot too old to drive a mutating run
    #[error("snapshot captured {age} ago exceeds the allowed {max_age} - re-capture the selection or pass --allow-stale-snapshot")]
    StaleSnapshot { age: String, max_age: String },

    /// Snapshot file unreadable or malformed
    #[error("cannot read snapshot {path}: {message} - re-capture it with 'dsfleet snapshot'")]
    SnapshotUnreadable { path: PathBuf, message: String },

    /// No compartment given and no default configured
    #[error("no compartment given and no default root configured - pass --compartment or set fleet.root_compartment in the config")]
    NoRootCompartment,

    /// Compartment name did not resolve
    #[error("compartment '{name}' was not found in the tenancy - check the name or pass its identifier")]
    CompartmentNotFound { name: String },

    /// Compartment name resolved to several compartments
    #[error("compartment name '{name}' matches {count} compartments - disambiguate by identifier")]
    AmbiguousCompartment { name: String, count: usize },

    /// Explicit entry did not resolve to a target
    #[error("target '{name}' was not found in compartment '{compartment}' - check the spelling or pass its identifier")]
    NameNotFound { name: String, compartment: String },

    /// Explicit entry resolved to several targets
    #[error("display name '{name}' matches {count} targets - disambiguate by identifier")]
    AmbiguousName { name: String, count: usize },

    /// The filter matched nothing out of a non-empty population
    #[error("name filter '{pattern}' matched none of the {population} targets - adjust the filter pattern")]
    FilterMatchedNothing { pattern: String, population: usize },

    /// Config file unreadable or malformed
    #[error("invalid config {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    /// Catalog (cloud service) error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FleetError {
    /// Validation errors are raised before any external call is made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FleetError::ConflictingSelection
                | FleetError::FilterWithoutScan
                | FleetError::EmptySelection
                | FleetError::InvalidFilter { .. }
                | FleetError::InvalidTagRule { .. }
                | FleetError::MissingDestination
                | FleetError::SameCompartment { .. }
                | FleetError::InvalidMaxAge { .. }
                | FleetError::StaleSnapshot { .. }
        )
    }

    /// Resolution errors surface a selection entry that could not be
    /// turned into a concrete target.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            FleetError::NameNotFound { .. }
                | FleetError::AmbiguousName { .. }
                | FleetError::FilterMatchedNothing { .. }
                | FleetError::CompartmentNotFound { .. }
                | FleetError::AmbiguousCompartment { .. }
        )
    }
}
