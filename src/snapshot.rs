//! Selection snapshots
//!
//! A snapshot is a file-persisted prior selection: a capture timestamp plus
//! the resolved target descriptors, written atomically as a whole. Replay
//! bypasses live discovery entirely, so a freshness check gates every
//! mutating run driven from a snapshot.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};
use crate::models::{CompartmentId, ExecutionMode, LifecycleState, TargetId};

/// One captured target descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub id: TargetId,
    pub display_name: String,
    pub lifecycle_state: LifecycleState,
    pub compartment_id: CompartmentId,
}

/// A persisted selection with its capture timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSnapshot {
    pub captured_at: DateTime<Utc>,
    pub targets: Vec<SnapshotEntry>,
}

impl SelectionSnapshot {
    pub fn new(targets: Vec<SnapshotEntry>) -> Self {
        Self {
            captured_at: Utc::now(),
            targets,
        }
    }

    pub fn load(path: &Path) -> FleetResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| FleetError::SnapshotUnreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| FleetError::SnapshotUnreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write the snapshot atomically: temp file in the destination
    /// directory, then persist over the final path.
    pub fn save(&self, path: &Path) -> FleetResult<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut file = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new_in(".")?,
        };
        serde_json::to_writer_pretty(&mut file, self)?;
        file.persist(path).map_err(|e| FleetError::Io(e.error))?;
        Ok(())
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.captured_at
    }
}

/// Maximum tolerated snapshot age before a mutating replay is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAge {
    Disabled,
    Limit(Duration),
}

impl FromStr for MaxAge {
    type Err = FleetError;

    /// Accepts bare seconds (`300`), suffixed durations (`45s`, `30m`,
    /// `12h`, `7d`), or the literal `disable`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("disable") || trimmed.eq_ignore_ascii_case("disabled") {
            return Ok(MaxAge::Disabled);
        }

        let invalid = || FleetError::InvalidMaxAge {
            value: value.to_string(),
        };

        let (digits, unit) = match trimmed.find(|c: char| !c.is_ascii_digit()) {
            Some(0) => return Err(invalid()),
            Some(split) => trimmed.split_at(split),
            None => (trimmed, ""),
        };
        let amount: i64 = digits.parse().map_err(|_| invalid())?;
        let duration = match unit {
            "" | "s" => Duration::seconds(amount),
            "m" => Duration::minutes(amount),
            "h" => Duration::hours(amount),
            "d" => Duration::days(amount),
            _ => return Err(invalid()),
        };
        Ok(MaxAge::Limit(duration))
    }
}

/// Render a duration the way an operator reads one.
pub fn humanize(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h", seconds / 3600)
    } else {
        format!("{}d", seconds / 86_400)
    }
}

/// Freshness gate for snapshot-driven runs.
pub struct SnapshotValidator;

impl SnapshotValidator {
    /// Dry-run always passes (no mutation is possible). Apply mode fails
    /// closed on a stale snapshot unless the explicit override is set.
    pub fn check(
        snapshot: &SelectionSnapshot,
        max_age: MaxAge,
        mode: ExecutionMode,
        allow_stale: bool,
    ) -> FleetResult<()> {
        if mode.is_dry_run() || allow_stale {
            return Ok(());
        }
        let limit = match max_age {
            MaxAge::Disabled => return Ok(()),
            MaxAge::Limit(limit) => limit,
        };
        let age = snapshot.age(Utc::now());
        if age > limit {
            return Err(FleetError::StaleSnapshot {
                age: humanize(age),
                max_age: humanize(limit),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_aged(age: Duration) -> SelectionSnapshot {
        SelectionSnapshot {
            captured_at: Utc::now() - age,
            targets: vec![SnapshotEntry {
                id: TargetId::new("ocid1.t.oc1.iad.a"),
                display_name: "db-a".into(),
                lifecycle_state: LifecycleState::Active,
                compartment_id: CompartmentId::new("ocid1.c.oc1..src"),
            }],
        }
    }

    #[test]
    fn max_age_parses_bare_seconds_and_suffixes() {
        assert_eq!(
            "300".parse::<MaxAge>().unwrap(),
            MaxAge::Limit(Duration::seconds(300))
        );
        assert_eq!(
            "45s".parse::<MaxAge>().unwrap(),
            MaxAge::Limit(Duration::seconds(45))
        );
        assert_eq!(
            "30m".parse::<MaxAge>().unwrap(),
            MaxAge::Limit(Duration::minutes(30))
        );
        assert_eq!(
            "12h".parse::<MaxAge>().unwrap(),
            MaxAge::Limit(Duration::hours(12))
        );
        assert_eq!(
            "7d".parse::<MaxAge>().unwrap(),
            MaxAge::Limit(Duration::days(7))
        );
        assert_eq!("disable".parse::<MaxAge>().unwrap(), MaxAge::Disabled);
    }

    #[test]
    fn max_age_rejects_garbage() {
        assert!("week".parse::<MaxAge>().is_err());
        assert!("7w".parse::<MaxAge>().is_err());
        assert!("".parse::<MaxAge>().is_err());
    }

    #[test]
    fn stale_snapshot_rejected_for_apply() {
        let snapshot = snapshot_aged(Duration::days(3));
        let err = SnapshotValidator::check(
            &snapshot,
            MaxAge::Limit(Duration::hours(24)),
            ExecutionMode::Apply,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, FleetError::StaleSnapshot { .. }));
    }

    #[test]
    fn stale_snapshot_accepted_for_dry_run() {
        let snapshot = snapshot_aged(Duration::days(3));
        SnapshotValidator::check(
            &snapshot,
            MaxAge::Limit(Duration::hours(24)),
            ExecutionMode::DryRun,
            false,
        )
        .unwrap();
    }

    #[test]
    fn stale_snapshot_accepted_with_override() {
        let snapshot = snapshot_aged(Duration::days(3));
        SnapshotValidator::check(
            &snapshot,
            MaxAge::Limit(Duration::hours(24)),
            ExecutionMode::Apply,
            true,
        )
        .unwrap();
    }

    #[test]
    fn fresh_snapshot_accepted_for_apply() {
        let snapshot = snapshot_aged(Duration::minutes(5));
        SnapshotValidator::check(
            &snapshot,
            MaxAge::Limit(Duration::hours(24)),
            ExecutionMode::Apply,
            false,
        )
        .unwrap();
    }

    #[test]
    fn save_and_load_round_trip_is_atomic_over_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.json");
        std::fs::write(&path, "stale contents").unwrap();

        let snapshot = snapshot_aged(Duration::zero());
        snapshot.save(&path).unwrap();

        let loaded = SelectionSnapshot::load(&path).unwrap();
        assert_eq!(loaded.targets, snapshot.targets);
    }

    #[test]
    fn unreadable_snapshot_names_the_recapture_command() {
        let err = SelectionSnapshot::load(Path::new("/nonexistent/selection.json")).unwrap_err();
        assert!(err.to_string().contains("dsfleet snapshot"));
    }

    #[test]
    fn humanize_picks_the_dominant_unit() {
        assert_eq!(humanize(Duration::seconds(59)), "59s");
        assert_eq!(humanize(Duration::minutes(90)), "1h");
        assert_eq!(humanize(Duration::days(3)), "3d");
    }
}
