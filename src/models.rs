//! Core data model for fleet operations
//!
//! Targets and their dependent resources are created and destroyed by the
//! cloud service; this tool only reads them and relocates them between
//! compartments. Everything here is a plain value passed through the
//! resolve/execute pipeline by ownership.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Structural prefix shared by every cloud resource identifier.
pub const IDENTIFIER_PREFIX: &str = "ocid1.";

/// Whether a selection entry is a resource identifier rather than a
/// display name. Identifiers carry a fixed prefix and at least five
/// dot-separated segments (`ocid1.<type>.<realm>.<region>.<unique>`).
pub fn looks_like_identifier(entry: &str) -> bool {
    entry.starts_with(IDENTIFIER_PREFIX) && entry.split('.').count() >= 5
}

/// Identifier of a registered target database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

/// Identifier of a compartment (isolation boundary in the tenancy).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompartmentId(String);

/// Identifier of a dependent resource (audit trail, assessment, policy).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

impl_id!(TargetId);
impl_id!(CompartmentId);
impl_id!(ResourceId);

/// Provisioning/operational status of a target registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Creating,
    Updating,
    Active,
    NeedsAttention,
    Inactive,
    Deleting,
    Deleted,
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Creating => "CREATING",
            LifecycleState::Updating => "UPDATING",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::NeedsAttention => "NEEDS_ATTENTION",
            LifecycleState::Inactive => "INACTIVE",
            LifecycleState::Deleting => "DELETING",
            LifecycleState::Deleted => "DELETED",
            LifecycleState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered database connection tracked by the security service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub display_name: String,
    pub lifecycle_state: LifecycleState,
    pub compartment_id: CompartmentId,
    #[serde(default)]
    pub freeform_tags: BTreeMap<String, String>,
}

/// The dependent resource kinds relocated alongside a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    AuditTrail,
    SecurityAssessment,
    SecurityPolicy,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 3] = [
        DependencyKind::AuditTrail,
        DependencyKind::SecurityAssessment,
        DependencyKind::SecurityPolicy,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            DependencyKind::AuditTrail => "audit trail",
            DependencyKind::SecurityAssessment => "security assessment",
            DependencyKind::SecurityPolicy => "security policy",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A sub-resource owned by exactly one target, independently relocatable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyResource {
    pub id: ResourceId,
    pub kind: DependencyKind,
    pub display_name: String,
    pub target_id: TargetId,
    pub compartment_id: CompartmentId,
}

/// Collection status of an audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionState {
    NotStarted,
    Collecting,
    Stopped,
}

/// An audit trail attached to a target, startable when not collecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub id: ResourceId,
    pub display_name: String,
    pub target_id: TargetId,
    pub collection_state: CollectionState,
}

impl AuditTrail {
    pub fn is_idle(&self) -> bool {
        matches!(
            self.collection_state,
            CollectionState::NotStarted | CollectionState::Stopped
        )
    }
}

/// A resolved selection entry: identifier plus display name for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    pub id: TargetId,
    pub display_name: String,
}

impl TargetRef {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: TargetId::new(id),
            display_name: display_name.into(),
        }
    }
}

/// How to drive the per-target action: rehearse or mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    DryRun,
    Apply,
}

impl ExecutionMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, ExecutionMode::DryRun)
    }
}

/// Per-target outcome of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationStatus::Succeeded => "succeeded",
            OperationStatus::Failed => "failed",
            OperationStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One target's outcome plus optional error detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub target: TargetRef,
    pub status: OperationStatus,
    pub error: Option<String>,
}

impl OperationResult {
    pub fn succeeded(target: TargetRef) -> Self {
        Self {
            target,
            status: OperationStatus::Succeeded,
            error: None,
        }
    }

    pub fn failed(target: TargetRef, error: impl Into<String>) -> Self {
        Self {
            target,
            status: OperationStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn skipped(target: TargetRef, reason: impl Into<String>) -> Self {
        Self {
            target,
            status: OperationStatus::Skipped,
            error: Some(reason.into()),
        }
    }
}

/// Aggregated counts for a batch run, always emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_results(results: &[OperationResult]) -> Self {
        let mut summary = Summary {
            total: results.len(),
            ..Summary::default()
        };
        for result in results {
            match result.status {
                OperationStatus::Succeeded => summary.succeeded += 1,
                OperationStatus::Failed => summary.failed += 1,
                OperationStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// A compartment known to the tenancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compartment {
    pub id: CompartmentId,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<CompartmentId>,
}
