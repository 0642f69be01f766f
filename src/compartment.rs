//! Compartment resolution
//!
//! Maps operator-supplied compartment names or identifiers to a canonical
//! [`CompartmentRef`], and supplies the configured default root scope when
//! no compartment is given. The tenancy listing is fetched once per process
//! and cached; resolution runs on the single execution thread.

use std::cell::RefCell;

use crate::catalog::TargetCatalog;
use crate::error::{FleetError, FleetResult};
use crate::models::{looks_like_identifier, Compartment, CompartmentId};

/// A resolved compartment: canonical identifier plus a name for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompartmentRef {
    pub id: CompartmentId,
    pub name: String,
}

impl CompartmentRef {
    pub fn describe(&self) -> String {
        if self.name == self.id.as_str() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.id)
        }
    }
}

pub struct CompartmentResolver<'a, C: TargetCatalog> {
    catalog: &'a C,
    default_root: Option<CompartmentId>,
    cache: RefCell<Option<Vec<Compartment>>>,
}

impl<'a, C: TargetCatalog> CompartmentResolver<'a, C> {
    pub fn new(catalog: &'a C, default_root: Option<CompartmentId>) -> Self {
        Self {
            catalog,
            default_root,
            cache: RefCell::new(None),
        }
    }

    /// Resolve an explicit compartment spec, or fall back to the default
    /// root scope when none was given.
    pub fn scope_or_default(&self, explicit: Option<&str>) -> FleetResult<CompartmentRef> {
        match explicit {
            Some(spec) => self.resolve(spec),
            None => self.default_root(),
        }
    }

    /// Resolve a name or identifier to a canonical compartment reference.
    pub fn resolve(&self, spec: &str) -> FleetResult<CompartmentRef> {
        let spec = spec.trim();
        if looks_like_identifier(spec) {
            let id = CompartmentId::new(spec);
            let name = self.name_of(&id).unwrap_or_else(|| spec.to_string());
            return Ok(CompartmentRef { id, name });
        }

        let compartments = self.listing()?;
        let matches: Vec<&Compartment> = compartments
            .iter()
            .filter(|c| c.name.eq_ignore_ascii_case(spec))
            .collect();
        match matches.len() {
            0 => Err(FleetError::CompartmentNotFound {
                name: spec.to_string(),
            }),
            1 => Ok(CompartmentRef {
                id: matches[0].id.clone(),
                name: matches[0].name.clone(),
            }),
            count => Err(FleetError::AmbiguousCompartment {
                name: spec.to_string(),
                count,
            }),
        }
    }

    /// The configured default root scope.
    pub fn default_root(&self) -> FleetResult<CompartmentRef> {
        let id = self
            .default_root
            .clone()
            .ok_or(FleetError::NoRootCompartment)?;
        let name = self.name_of(&id).unwrap_or_else(|| id.to_string());
        Ok(CompartmentRef { id, name })
    }

    /// Best-effort reverse lookup of a compartment's display name.
    pub fn name_of(&self, id: &CompartmentId) -> Option<String> {
        let compartments = self.listing().ok()?;
        compartments
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.name.clone())
    }

    fn listing(&self) -> FleetResult<Vec<Compartment>> {
        if self.cache.borrow().is_none() {
            let compartments = self.catalog.list_compartments()?;
            *self.cache.borrow_mut() = Some(compartments);
        }
        Ok(self
            .cache
            .borrow()
            .as_ref()
            .cloned()
            .unwrap_or_default())
    }
}
