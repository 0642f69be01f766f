//! In-memory catalog
//!
//! A deterministic [`TargetCatalog`] used by the test suite. Mutations are
//! recorded in call order so tests can assert relocation ordering, and
//! individual resources can be primed to fail.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use crate::models::{
    AuditTrail, CollectionState, Compartment, CompartmentId, DependencyKind, DependencyResource,
    LifecycleState, ResourceId, Target, TargetId,
};

use super::{CatalogError, CatalogResult, TargetCatalog};

/// A recorded mutating call, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    RelocateTarget {
        id: TargetId,
        destination: CompartmentId,
    },
    RelocateDependent {
        kind: DependencyKind,
        id: ResourceId,
        destination: CompartmentId,
    },
    RefreshTarget {
        id: TargetId,
    },
    UpdateTags {
        id: TargetId,
        tags: BTreeMap<String, String>,
    },
    StartAuditTrail {
        id: ResourceId,
    },
}

impl CatalogCall {
    /// Whether this call is a relocation (of a target or a dependent).
    pub fn is_relocate(&self) -> bool {
        matches!(
            self,
            CatalogCall::RelocateTarget { .. } | CatalogCall::RelocateDependent { .. }
        )
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    compartments: Vec<Compartment>,
    targets: RefCell<Vec<Target>>,
    dependents: RefCell<Vec<DependencyResource>>,
    trails: RefCell<Vec<AuditTrail>>,
    fail_ids: RefCell<HashSet<String>>,
    calls: RefCell<Vec<CatalogCall>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compartment(mut self, id: &str, name: &str) -> Self {
        self.compartments.push(Compartment {
            id: CompartmentId::new(id),
            name: name.to_string(),
            parent_id: None,
        });
        self
    }

    pub fn add_target(&self, id: &str, name: &str, state: LifecycleState, compartment: &str) {
        self.targets.borrow_mut().push(Target {
            id: TargetId::new(id),
            display_name: name.to_string(),
            lifecycle_state: state,
            compartment_id: CompartmentId::new(compartment),
            freeform_tags: BTreeMap::new(),
        });
    }

    pub fn add_dependent(
        &self,
        kind: DependencyKind,
        id: &str,
        name: &str,
        target: &str,
        compartment: &str,
    ) {
        self.dependents.borrow_mut().push(DependencyResource {
            id: ResourceId::new(id),
            kind,
            display_name: name.to_string(),
            target_id: TargetId::new(target),
            compartment_id: CompartmentId::new(compartment),
        });
    }

    pub fn add_trail(&self, id: &str, name: &str, target: &str, state: CollectionState) {
        self.trails.borrow_mut().push(AuditTrail {
            id: ResourceId::new(id),
            display_name: name.to_string(),
            target_id: TargetId::new(target),
            collection_state: state,
        });
    }

    /// Prime a resource id so its next mutating call fails.
    pub fn fail_on(&self, id: &str) {
        self.fail_ids.borrow_mut().insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.borrow().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn target_compartment(&self, id: &str) -> Option<CompartmentId> {
        self.targets
            .borrow()
            .iter()
            .find(|t| t.id.as_str() == id)
            .map(|t| t.compartment_id.clone())
    }

    fn check_failure(&self, id: &str) -> CatalogResult<()> {
        if self.fail_ids.borrow().contains(id) {
            return Err(CatalogError::Api {
                status: 409,
                message: format!("injected failure for {id}"),
            });
        }
        Ok(())
    }
}

impl TargetCatalog for InMemoryCatalog {
    fn list_compartments(&self) -> CatalogResult<Vec<Compartment>> {
        Ok(self.compartments.clone())
    }

    fn list_targets(
        &self,
        compartment: &CompartmentId,
        states: &[LifecycleState],
    ) -> CatalogResult<Vec<Target>> {
        Ok(self
            .targets
            .borrow()
            .iter()
            .filter(|t| &t.compartment_id == compartment)
            .filter(|t| states.is_empty() || states.contains(&t.lifecycle_state))
            .cloned()
            .collect())
    }

    fn get_target(&self, id: &TargetId) -> CatalogResult<Target> {
        self.targets
            .borrow()
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                resource: id.to_string(),
            })
    }

    fn relocate_target(&self, id: &TargetId, destination: &CompartmentId) -> CatalogResult<()> {
        self.check_failure(id.as_str())?;
        let mut targets = self.targets.borrow_mut();
        let target = targets
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| CatalogError::NotFound {
                resource: id.to_string(),
            })?;
        target.compartment_id = destination.clone();
        self.calls.borrow_mut().push(CatalogCall::RelocateTarget {
            id: id.clone(),
            destination: destination.clone(),
        });
        Ok(())
    }

    fn refresh_target(&self, id: &TargetId) -> CatalogResult<()> {
        self.check_failure(id.as_str())?;
        self.get_target(id)?;
        self.calls
            .borrow_mut()
            .push(CatalogCall::RefreshTarget { id: id.clone() });
        Ok(())
    }

    fn update_target_tags(
        &self,
        id: &TargetId,
        tags: &BTreeMap<String, String>,
    ) -> CatalogResult<()> {
        self.check_failure(id.as_str())?;
        let mut targets = self.targets.borrow_mut();
        let target = targets
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| CatalogError::NotFound {
                resource: id.to_string(),
            })?;
        target.freeform_tags.extend(tags.clone());
        self.calls.borrow_mut().push(CatalogCall::UpdateTags {
            id: id.clone(),
            tags: tags.clone(),
        });
        Ok(())
    }

    fn list_dependents(
        &self,
        kind: DependencyKind,
        compartment: &CompartmentId,
        target: &TargetId,
    ) -> CatalogResult<Vec<DependencyResource>> {
        Ok(self
            .dependents
            .borrow()
            .iter()
            .filter(|d| d.kind == kind && &d.compartment_id == compartment && &d.target_id == target)
            .cloned()
            .collect())
    }

    fn relocate_dependent(
        &self,
        kind: DependencyKind,
        id: &ResourceId,
        destination: &CompartmentId,
    ) -> CatalogResult<()> {
        self.check_failure(id.as_str())?;
        let mut dependents = self.dependents.borrow_mut();
        let dependent = dependents
            .iter_mut()
            .find(|d| d.kind == kind && &d.id == id)
            .ok_or_else(|| CatalogError::NotFound {
                resource: id.to_string(),
            })?;
        dependent.compartment_id = destination.clone();
        self.calls
            .borrow_mut()
            .push(CatalogCall::RelocateDependent {
                kind,
                id: id.clone(),
                destination: destination.clone(),
            });
        Ok(())
    }

    fn list_audit_trails(&self, target: &TargetId) -> CatalogResult<Vec<AuditTrail>> {
        Ok(self
            .trails
            .borrow()
            .iter()
            .filter(|t| &t.target_id == target)
            .cloned()
            .collect())
    }

    fn start_audit_trail(&self, id: &ResourceId) -> CatalogResult<()> {
        self.check_failure(id.as_str())?;
        let mut trails = self.trails.borrow_mut();
        let trail = trails
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| CatalogError::NotFound {
                resource: id.to_string(),
            })?;
        trail.collection_state = CollectionState::Collecting;
        self.calls
            .borrow_mut()
            .push(CatalogCall::StartAuditTrail { id: id.clone() });
        Ok(())
    }
}
