//! Environment retag
//!
//! Derives an environment classification from each target's display name
//! via ordered pattern rules and writes it as a freeform tag. Targets
//! matching no rule are recorded skipped, not failed.

use std::collections::BTreeMap;

use regex::Regex;

use crate::catalog::{CatalogError, TargetCatalog};
use crate::config::TagRule;
use crate::error::{FleetError, FleetResult};
use crate::executor::{Action, ActionOutcome, EventSink, ExecEvent};
use crate::models::{ExecutionMode, TargetRef};
use crate::selector::ResolutionPolicy;

/// One compiled display-name rule; the first match wins.
pub struct EnvRule {
    pub pattern: Regex,
    pub value: String,
}

/// Built-in classification rules, used when the config declares none.
pub fn default_rules() -> Vec<EnvRule> {
    // Constant patterns; covered by unit tests.
    [
        ("(?i)(prod|prd)", "production"),
        ("(?i)(stag|stg)", "staging"),
        ("(?i)(uat|preprod)", "uat"),
        ("(?i)(test|qa)", "test"),
        ("(?i)dev", "development"),
    ]
    .into_iter()
    .map(|(pattern, value)| EnvRule {
        pattern: Regex::new(pattern).unwrap(),
        value: value.to_string(),
    })
    .collect()
}

/// Compile config-declared rules, rejecting bad patterns up front.
pub fn compile_rules(rules: &[TagRule]) -> FleetResult<Vec<EnvRule>> {
    rules
        .iter()
        .map(|rule| {
            Regex::new(&rule.pattern)
                .map(|pattern| EnvRule {
                    pattern,
                    value: rule.value.clone(),
                })
                .map_err(|e| FleetError::InvalidTagRule {
                    pattern: rule.pattern.clone(),
                    message: e.to_string(),
                })
        })
        .collect()
}

pub struct RetagTargets<'a, C: TargetCatalog> {
    catalog: &'a C,
    tag_key: String,
    rules: Vec<EnvRule>,
}

impl<'a, C: TargetCatalog> RetagTargets<'a, C> {
    pub fn new(catalog: &'a C, tag_key: impl Into<String>, rules: Vec<EnvRule>) -> Self {
        Self {
            catalog,
            tag_key: tag_key.into(),
            rules,
        }
    }

    fn classify(&self, display_name: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(display_name))
            .map(|rule| rule.value.as_str())
    }
}

impl<C: TargetCatalog> Action for RetagTargets<'_, C> {
    fn operation(&self) -> &'static str {
        "retag"
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
        let Some(value) = self.classify(&target.display_name) else {
            return Ok(ActionOutcome::Skipped(format!(
                "no environment rule matched '{}'",
                target.display_name
            )));
        };
        let verb = if mode.is_dry_run() { "would tag" } else { "tag" };
        events.emit(&ExecEvent::Detail {
            id: target.id.to_string(),
            message: format!(
                "{verb} '{}' with {}={}",
                target.display_name, self.tag_key, value
            ),
        });
        if !mode.is_dry_run() {
            let mut tags = BTreeMap::new();
            tags.insert(self.tag_key.clone(), value.to_string());
            self.catalog.update_target_tags(&target.id, &tags)?;
        }
        Ok(ActionOutcome::Done)
    }
}
