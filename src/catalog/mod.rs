//! Target/dependency catalog - the consumed cloud service surface
//!
//! Every operation reaches the service through [`TargetCatalog`]: listing
//! and fetching target registrations, relocating targets and their
//! dependent resources, refreshing metadata, retagging, and starting audit
//! trails. Calls are blocking and issued one at a time; the tool adds no
//! retry or timeout layer of its own.

pub mod http;
pub mod memory;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::{
    AuditTrail, Compartment, CompartmentId, DependencyKind, DependencyResource, LifecycleState,
    ResourceId, Target, TargetId,
};

pub use http::HttpCatalog;
pub use memory::{CatalogCall, InMemoryCatalog};

/// Error from the catalog collaborator.
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    /// Could not reach the service at all
    #[error("service unreachable: {0}")]
    Transport(String),

    /// The service rejected the call
    #[error("service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The requested resource does not exist
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    /// The response body could not be decoded
    #[error("malformed service response: {0}")]
    Decode(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// The cloud catalog of target registrations and their dependents.
///
/// `list_targets` covers the given compartment and its sub-tree. An empty
/// lifecycle-state set means no state filtering; multiple states combine
/// with OR semantics. Relocations are addressed by resource identifier and
/// are individually idempotent to re-run.
pub trait TargetCatalog {
    fn list_compartments(&self) -> CatalogResult<Vec<Compartment>>;

    fn list_targets(
        &self,
        compartment: &CompartmentId,
        states: &[LifecycleState],
    ) -> CatalogResult<Vec<Target>>;

    fn get_target(&self, id: &TargetId) -> CatalogResult<Target>;

    fn relocate_target(&self, id: &TargetId, destination: &CompartmentId) -> CatalogResult<()>;

    fn refresh_target(&self, id: &TargetId) -> CatalogResult<()>;

    fn update_target_tags(
        &self,
        id: &TargetId,
        tags: &BTreeMap<String, String>,
    ) -> CatalogResult<()>;

    /// List one dependency kind owned by `target` within `compartment`.
    fn list_dependents(
        &self,
        kind: DependencyKind,
        compartment: &CompartmentId,
        target: &TargetId,
    ) -> CatalogResult<Vec<DependencyResource>>;

    fn relocate_dependent(
        &self,
        kind: DependencyKind,
        id: &ResourceId,
        destination: &CompartmentId,
    ) -> CatalogResult<()>;

    fn list_audit_trails(&self, target: &TargetId) -> CatalogResult<Vec<AuditTrail>>;

    fn start_audit_trail(&self, id: &ResourceId) -> CatalogResult<()>;
}
