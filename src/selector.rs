//! Target selection
//!
//! Turns an operator's selection criteria into an ordered, deduplicated
//! list of target references. Exactly one source drives a selection:
//! an explicit list of names/identifiers, a compartment scan with
//! lifecycle and name filters, or a replayed snapshot file. Validation
//! happens before the first service call.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::catalog::{CatalogError, TargetCatalog};
use crate::compartment::{CompartmentRef, CompartmentResolver};
use crate::error::{FleetError, FleetResult};
use crate::models::{looks_like_identifier, ExecutionMode, LifecycleState, Target, TargetRef};
use crate::snapshot::{MaxAge, SelectionSnapshot, SnapshotValidator};

/// Raw selection flags as they arrive from the command line.
#[derive(Debug, Clone, Default)]
pub struct SelectionSpec {
    /// Comma-separated names and/or identifiers
    pub targets: Option<String>,
    /// Compartment scope (name or identifier)
    pub compartment: Option<String>,
    /// Lifecycle states for a scan, OR semantics
    pub lifecycle_states: Vec<LifecycleState>,
    /// Display-name filter pattern for a scan
    pub name_filter: Option<String>,
    /// Replay a previously captured selection
    pub from_snapshot: Option<PathBuf>,
}

/// The validated selection source. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCriteria {
    Explicit { entries: Vec<String> },
    Scan,
    Snapshot { path: PathBuf },
}

impl SelectionSpec {
    /// Validate mutual exclusion and shape. No service calls here.
    pub fn criteria(&self) -> FleetResult<SelectionCriteria> {
        if self.targets.is_some() && self.from_snapshot.is_some() {
            return Err(FleetError::ConflictingSelection);
        }
        let scan_filters = !self.lifecycle_states.is_empty() || self.name_filter.is_some();
        if scan_filters && (self.targets.is_some() || self.from_snapshot.is_some()) {
            return Err(FleetError::FilterWithoutScan);
        }

        if let Some(raw) = &self.targets {
            let entries: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            if entries.is_empty() {
                return Err(FleetError::EmptySelection);
            }
            return Ok(SelectionCriteria::Explicit { entries });
        }
        if let Some(path) = &self.from_snapshot {
            return Ok(SelectionCriteria::Snapshot { path: path.clone() });
        }
        Ok(SelectionCriteria::Scan)
    }
}

/// How explicit-entry resolution failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Any unresolvable entry aborts the run before execution
    Strict,
    /// Unresolvable entries are reported; the run proceeds with the rest
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct SelectorOptions {
    pub policy: ResolutionPolicy,
    pub mode: ExecutionMode,
    pub max_snapshot_age: MaxAge,
    pub allow_stale_snapshot: bool,
}

/// One explicit entry that could not be resolved (best-effort mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub entry: String,
    pub reason: String,
}

/// Where a resolved selection came from, for logging and previews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOrigin {
    Explicit,
    Scan {
        states: Vec<LifecycleState>,
        name_filter: Option<String>,
    },
    Snapshot {
        path: PathBuf,
        captured_at: DateTime<Utc>,
    },
}

/// The resolved, deduplicated selection that drives a batch run.
#[derive(Debug, Clone)]
pub struct Selection {
    pub targets: Vec<TargetRef>,
    pub origin: SelectionOrigin,
    /// The single resolved source scope, when one exists
    pub scope: Option<CompartmentRef>,
    pub failures: Vec<ResolutionFailure>,
    /// Set when a scan legitimately found nothing
    pub warning: Option<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Short human description of the source, used in impact previews.
    pub fn describe_source(&self) -> String {
        match &self.origin {
            SelectionOrigin::Explicit => match &self.scope {
                Some(scope) => format!("explicit list (scope {})", scope.describe()),
                None => "explicit list".to_string(),
            },
            SelectionOrigin::Scan { states, .. } => {
                let scope = self
                    .scope
                    .as_ref()
                    .map(CompartmentRef::describe)
                    .unwrap_or_else(|| "unknown scope".to_string());
                if states.is_empty() {
                    format!("scan of {scope}")
                } else {
                    let states: Vec<&str> =
                        states.iter().map(LifecycleState::as_str).collect();
                    format!("scan of {scope} [{}]", states.join(", "))
                }
            }
            SelectionOrigin::Snapshot { path, captured_at } => {
                format!("snapshot {} (captured {captured_at})", path.display())
            }
        }
    }
}

pub struct TargetSelector<'a, C: TargetCatalog> {
    catalog: &'a C,
    compartments: &'a CompartmentResolver<'a, C>,
}

impl<'a, C: TargetCatalog> TargetSelector<'a, C> {
    pub fn new(catalog: &'a C, compartments: &'a CompartmentResolver<'a, C>) -> Self {
        Self {
            catalog,
            compartments,
        }
    }

    /// Resolve the selection. Precedence: explicit list, compartment scan,
    /// snapshot replay - exactly one path is taken.
    pub fn resolve(&self, spec: &SelectionSpec, opts: &SelectorOptions) -> FleetResult<Selection> {
        match spec.criteria()? {
            SelectionCriteria::Explicit { entries } => self.resolve_explicit(spec, &entries, opts),
            SelectionCriteria::Scan => self.resolve_scan(spec),
            SelectionCriteria::Snapshot { path } => self.resolve_snapshot(spec, &path, opts),
        }
    }

    fn resolve_explicit(
        &self,
        spec: &SelectionSpec,
        entries: &[String],
        opts: &SelectorOptions,
    ) -> FleetResult<Selection> {
        // A scope is only required when a display name has to be looked up.
        let needs_scope = entries.iter().any(|e| !looks_like_identifier(e));
        let scope = if needs_scope {
            Some(
                self.compartments
                    .scope_or_default(spec.compartment.as_deref())?,
            )
        } else {
            spec.compartment
                .as_deref()
                .map(|c| self.compartments.resolve(c))
                .transpose()?
        };
        let roster = match &scope {
            Some(scope) if needs_scope => self.catalog.list_targets(&scope.id, &[])?,
            _ => Vec::new(),
        };

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        let mut failures = Vec::new();
        for entry in entries {
            match self.resolve_entry(entry, scope.as_ref(), &roster) {
                Ok(target) => {
                    if seen.insert(target.id.clone()) {
                        targets.push(target);
                    }
                }
                Err(err) => match opts.policy {
                    ResolutionPolicy::Strict => return Err(err),
                    ResolutionPolicy::BestEffort => failures.push(ResolutionFailure {
                        entry: entry.clone(),
                        reason: err.to_string(),
                    }),
                },
            }
        }

        Ok(Selection {
            targets,
            origin: SelectionOrigin::Explicit,
            scope,
            failures,
            warning: None,
        })
    }

    fn resolve_entry(
        &self,
        entry: &str,
        scope: Option<&CompartmentRef>,
        roster: &[Target],
    ) -> FleetResult<TargetRef> {
        if looks_like_identifier(entry) {
            let target = self
                .catalog
                .get_target(&entry.into())
                .map_err(|err| match err {
                    CatalogError::NotFound { .. } => FleetError::NameNotFound {
                        name: entry.to_string(),
                        compartment: scope
                            .map(|s| s.name.clone())
                            .unwrap_or_else(|| "the tenancy".to_string()),
                    },
                    other => FleetError::Catalog(other),
                })?;
            return Ok(TargetRef {
                id: target.id,
                display_name: target.display_name,
            });
        }

        let matches: Vec<&Target> = roster
            .iter()
            .filter(|t| t.display_name.eq_ignore_ascii_case(entry))
            .collect();
        match matches.len() {
            0 => Err(FleetError::NameNotFound {
                name: entry.to_string(),
                compartment: scope
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| "the tenancy".to_string()),
            }),
            1 => Ok(TargetRef {
                id: matches[0].id.clone(),
                display_name: matches[0].display_name.clone(),
            }),
            count => Err(FleetError::AmbiguousName {
                name: entry.to_string(),
                count,
            }),
        }
    }

    fn resolve_scan(&self, spec: &SelectionSpec) -> FleetResult<Selection> {
        // Compile the filter before touching the service, so a bad pattern
        // fails fast as a validation error.
        let filter = spec
            .name_filter
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| FleetError::InvalidFilter {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let scope = self
            .compartments
            .scope_or_default(spec.compartment.as_deref())?;
        let mut listing = self
            .catalog
            .list_targets(&scope.id, &spec.lifecycle_states)?;
        listing.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });

        let origin = SelectionOrigin::Scan {
            states: spec.lifecycle_states.clone(),
            name_filter: spec.name_filter.clone(),
        };

        if listing.is_empty() {
            // Legitimately empty fleet: skip with a warning, not an error.
            let warning = if spec.lifecycle_states.is_empty() {
                format!("compartment '{}' contains no targets", scope.name)
            } else {
                format!(
                    "compartment '{}' contains no targets in the requested lifecycle states",
                    scope.name
                )
            };
            return Ok(Selection {
                targets: Vec::new(),
                origin,
                scope: Some(scope),
                failures: Vec::new(),
                warning: Some(warning),
            });
        }

        let population = listing.len();
        if let Some(filter) = &filter {
            listing.retain(|t| filter.is_match(&t.display_name));
            if listing.is_empty() {
                // Distinguishable from an empty fleet: the operator should
                // adjust the pattern, not assume there is nothing to do.
                return Err(FleetError::FilterMatchedNothing {
                    pattern: filter.as_str().to_string(),
                    population,
                });
            }
        }

        Ok(Selection {
            targets: listing
                .into_iter()
                .map(|t| TargetRef {
                    id: t.id,
                    display_name: t.display_name,
                })
                .collect(),
            origin,
            scope: Some(scope),
            failures: Vec::new(),
            warning: None,
        })
    }

    fn resolve_snapshot(
        &self,
        spec: &SelectionSpec,
        path: &std::path::Path,
        opts: &SelectorOptions,
    ) -> FleetResult<Selection> {
        let snapshot = SelectionSnapshot::load(path)?;
        SnapshotValidator::check(
            &snapshot,
            opts.max_snapshot_age,
            opts.mode,
            opts.allow_stale_snapshot,
        )?;

        // Replay is verbatim: no live discovery, no reordering.
        let scope = spec
            .compartment
            .as_deref()
            .map(|c| self.compartments.resolve(c))
            .transpose()?;
        Ok(Selection {
            targets: snapshot
                .targets
                .iter()
                .map(|entry| TargetRef {
                    id: entry.id.clone(),
                    display_name: entry.display_name.clone(),
                })
                .collect(),
            origin: SelectionOrigin::Snapshot {
                path: path.to_path_buf(),
                captured_at: snapshot.captured_at,
            },
            scope,
            failures: Vec::new(),
            warning: None,
        })
    }
}
