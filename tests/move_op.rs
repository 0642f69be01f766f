//! Two-phase compartment moves: dependent ordering, the phase barrier,
//! the confirmation gate, and idempotent re-runs.

mod common;

use common::{empty_fleet, rid, tid, RecordingSink, DST, SRC};

use dsfleet::actions::MoveTargets;
use dsfleet::catalog::CatalogCall;
use dsfleet::compartment::{CompartmentRef, CompartmentResolver};
use dsfleet::executor::{
    exit_code, BatchExecutor, ErrorPolicy, ExecOptions, PresetConfirmer,
};
use dsfleet::models::{
    CompartmentId, DependencyKind, ExecutionMode, LifecycleState, OperationStatus,
};
use dsfleet::selector::{ResolutionPolicy, Selection, SelectionSpec, SelectorOptions, TargetSelector};
use dsfleet::snapshot::MaxAge;
use dsfleet::InMemoryCatalog;

fn scope(id: &str, name: &str) -> CompartmentRef {
    CompartmentRef {
        id: CompartmentId::new(id),
        name: name.to_string(),
    }
}

fn resolve_all(catalog: &InMemoryCatalog) -> Selection {
    let resolver = CompartmentResolver::new(catalog, None);
    let selector = TargetSelector::new(catalog, &resolver);
    let spec = SelectionSpec {
        compartment: Some("ops".to_string()),
        ..SelectionSpec::default()
    };
    selector
        .resolve(
            &spec,
            &SelectorOptions {
                policy: ResolutionPolicy::Strict,
                mode: ExecutionMode::Apply,
                max_snapshot_age: MaxAge::Disabled,
                allow_stale_snapshot: false,
            },
        )
        .unwrap()
}

fn exec_opts(mode: ExecutionMode, assume_yes: bool) -> ExecOptions {
    ExecOptions {
        mode,
        error_policy: ErrorPolicy::Continue,
        assume_yes,
    }
}

/// One target with one dependent of each kind.
fn fleet_with_dependents() -> InMemoryCatalog {
    let catalog = empty_fleet();
    catalog.add_target(&tid("a"), "db-a", LifecycleState::Active, SRC);
    catalog.add_dependent(DependencyKind::AuditTrail, &rid("trail"), "trail", &tid("a"), SRC);
    catalog.add_dependent(
        DependencyKind::SecurityAssessment,
        &rid("assess"),
        "assessment",
        &tid("a"),
        SRC,
    );
    catalog.add_dependent(
        DependencyKind::SecurityPolicy,
        &rid("policy"),
        "policy",
        &tid("a"),
        SRC,
    );
    catalog
}

#[test]
fn move_issues_n_plus_one_relocates_with_dependents_first() {
    let catalog = fleet_with_dependents();
    let selection = resolve_all(&catalog);
    let action = MoveTargets::new(&catalog, scope(SRC, "ops"), scope(DST, "prod"), true).unwrap();

    let report = BatchExecutor::new(&PresetConfirmer(true), &RecordingSink::new()).run(
        &selection,
        &action,
        &exec_opts(ExecutionMode::Apply, true),
    );
    assert_eq!(report.summary.succeeded, 1);

    let calls = catalog.calls();
    assert_eq!(calls.len(), 4, "exactly N + 1 relocate calls");
    assert!(calls[..3]
        .iter()
        .all(|call| matches!(call, CatalogCall::RelocateDependent { .. })));
    assert!(matches!(calls[3], CatalogCall::RelocateTarget { .. }));
}

#[test]
fn phases_never_interleave_across_targets() {
    let catalog = empty_fleet();
    catalog.add_target(&tid("a"), "db-a", LifecycleState::Active, SRC);
    catalog.add_target(&tid("b"), "db-b", LifecycleState::Active, SRC);
    catalog.add_dependent(DependencyKind::AuditTrail, &rid("da"), "trail-a", &tid("a"), SRC);
    catalog.add_dependent(DependencyKind::AuditTrail, &rid("db"), "trail-b", &tid("b"), SRC);

    let selection = resolve_all(&catalog);
    let action = MoveTargets::new(&catalog, scope(SRC, "ops"), scope(DST, "prod"), true).unwrap();
    BatchExecutor::new(&PresetConfirmer(true), &RecordingSink::new()).run(
        &selection,
        &action,
        &exec_opts(ExecutionMode::Apply, true),
    );

    // Every dependent of every target moves before any target does.
    let calls = catalog.calls();
    let first_target_call = calls
        .iter()
        .position(|c| matches!(c, CatalogCall::RelocateTarget { .. }))
        .unwrap();
    let last_dependent_call = calls
        .iter()
        .rposition(|c| matches!(c, CatalogCall::RelocateDependent { .. }))
        .unwrap();
    assert!(last_dependent_call < first_target_call);
    assert_eq!(calls.len(), 4);
}

#[test]
fn skip_dependents_moves_only_the_target_objects() {
    let catalog = fleet_with_dependents();
    let selection = resolve_all(&catalog);
    let action = MoveTargets::new(&catalog, scope(SRC, "ops"), scope(DST, "prod"), false).unwrap();

    BatchExecutor::new(&PresetConfirmer(true), &RecordingSink::new()).run(
        &selection,
        &action,
        &exec_opts(ExecutionMode::Apply, true),
    );

    let calls = catalog.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], CatalogCall::RelocateTarget { .. }));
}

#[test]
fn dry_run_move_issues_no_relocate_but_matches_apply_shape() {
    let dry_catalog = fleet_with_dependents();
    let apply_catalog = fleet_with_dependents();

    let dry_sink = RecordingSink::new();
    let dry_selection = resolve_all(&dry_catalog);
    let dry_action =
        MoveTargets::new(&dry_catalog, scope(SRC, "ops"), scope(DST, "prod"), true).unwrap();
    let dry_report = BatchExecutor::new(&PresetConfirmer(true), &dry_sink).run(
        &dry_selection,
        &dry_action,
        &exec_opts(ExecutionMode::DryRun, false),
    );

    let apply_sink = RecordingSink::new();
    let apply_selection = resolve_all(&apply_catalog);
    let apply_action =
        MoveTargets::new(&apply_catalog, scope(SRC, "ops"), scope(DST, "prod"), true).unwrap();
    let apply_report = BatchExecutor::new(&PresetConfirmer(true), &apply_sink).run(
        &apply_selection,
        &apply_action,
        &exec_opts(ExecutionMode::Apply, true),
    );

    assert_eq!(dry_catalog.mutation_count(), 0);
    assert_eq!(apply_catalog.mutation_count(), 4);
    assert_eq!(dry_sink.shape(), apply_sink.shape());
    assert_eq!(dry_report.summary, apply_report.summary);
}

#[test]
fn declined_confirmation_cancels_cleanly_with_zero_calls() {
    let catalog = fleet_with_dependents();
    let selection = resolve_all(&catalog);
    let action = MoveTargets::new(&catalog, scope(SRC, "ops"), scope(DST, "prod"), true).unwrap();

    let sink = RecordingSink::new();
    let report = BatchExecutor::new(&PresetConfirmer(false), &sink).run(
        &selection,
        &action,
        &exec_opts(ExecutionMode::Apply, false),
    );

    assert!(report.cancelled);
    assert_eq!(catalog.mutation_count(), 0);
    assert_eq!(exit_code(&report), 0);
    assert!(sink.shape().contains(&"cancelled".to_string()));
}

#[test]
fn failed_dependent_fails_the_target_and_leaves_it_in_place() {
    let catalog = empty_fleet();
    catalog.add_target(&tid("a"), "db-a", LifecycleState::Active, SRC);
    catalog.add_target(&tid("b"), "db-b", LifecycleState::Active, SRC);
    catalog.add_dependent(DependencyKind::AuditTrail, &rid("da"), "trail-a", &tid("a"), SRC);
    catalog.add_dependent(DependencyKind::AuditTrail, &rid("db"), "trail-b", &tid("b"), SRC);
    catalog.fail_on(&rid("da"));

    let selection = resolve_all(&catalog);
    let action = MoveTargets::new(&catalog, scope(SRC, "ops"), scope(DST, "prod"), true).unwrap();
    let report = BatchExecutor::new(&PresetConfirmer(true), &RecordingSink::new()).run(
        &selection,
        &action,
        &exec_opts(ExecutionMode::Apply, true),
    );

    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.succeeded, 1);

    // db-a stays in the source compartment for a clean retry.
    assert_eq!(
        catalog.target_compartment(&tid("a")).unwrap(),
        CompartmentId::new(SRC)
    );
    assert_eq!(
        catalog.target_compartment(&tid("b")).unwrap(),
        CompartmentId::new(DST)
    );
    let failed: Vec<OperationStatus> = report.results.iter().map(|r| r.status).collect();
    assert!(failed.contains(&OperationStatus::Failed));
}

#[test]
fn stop_on_error_mid_phase_never_reports_partial_targets_as_succeeded() {
    let catalog = empty_fleet();
    catalog.add_target(&tid("a"), "db-a", LifecycleState::Active, SRC);
    catalog.add_target(&tid("b"), "db-b", LifecycleState::Active, SRC);
    catalog.add_target(&tid("c"), "db-c", LifecycleState::Active, SRC);
    catalog.add_dependent(DependencyKind::AuditTrail, &rid("da"), "trail-a", &tid("a"), SRC);
    catalog.add_dependent(DependencyKind::AuditTrail, &rid("db"), "trail-b", &tid("b"), SRC);
    catalog.fail_on(&rid("db"));

    let selection = resolve_all(&catalog);
    let action = MoveTargets::new(&catalog, scope(SRC, "ops"), scope(DST, "prod"), true).unwrap();
    let report = BatchExecutor::new(&PresetConfirmer(true), &RecordingSink::new()).run(
        &selection,
        &action,
        &ExecOptions {
            mode: ExecutionMode::Apply,
            error_policy: ErrorPolicy::Stop,
            assume_yes: true,
        },
    );

    // db-a moved its dependent but never reached the target phase: it is
    // skipped (retryable), not succeeded. db-c was never attempted.
    assert_eq!(report.summary.succeeded, 0);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.skipped, 2);
    let statuses: Vec<OperationStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            OperationStatus::Skipped,
            OperationStatus::Failed,
            OperationStatus::Skipped,
        ]
    );
    // Only db-a's dependent was relocated before the stop.
    assert_eq!(catalog.mutation_count(), 1);
}

#[test]
fn rerun_after_partial_failure_retries_only_whats_left() {
    let catalog = empty_fleet();
    catalog.add_target(&tid("a"), "db-a", LifecycleState::Active, SRC);
    catalog.add_target(&tid("b"), "db-b", LifecycleState::Active, SRC);
    catalog.add_dependent(DependencyKind::AuditTrail, &rid("da"), "trail-a", &tid("a"), SRC);
    catalog.add_dependent(DependencyKind::AuditTrail, &rid("db"), "trail-b", &tid("b"), SRC);
    catalog.fail_on(&rid("da"));

    let first_selection = resolve_all(&catalog);
    let action = MoveTargets::new(&catalog, scope(SRC, "ops"), scope(DST, "prod"), true).unwrap();
    BatchExecutor::new(&PresetConfirmer(true), &RecordingSink::new()).run(
        &first_selection,
        &action,
        &exec_opts(ExecutionMode::Apply, true),
    );
    let first_run_calls = catalog.calls().len();
    assert_eq!(first_run_calls, 2, "trail-b and db-b moved, db-a failed");

    // Re-run over the same captured selection. trail-b and db-b already
    // sit in the destination and are not reprocessed; trail-a is retried
    // from its original location (and fails again while the injected
    // fault holds).
    let report = BatchExecutor::new(&PresetConfirmer(true), &RecordingSink::new()).run(
        &first_selection,
        &MoveTargets::new(&catalog, scope(SRC, "ops"), scope(DST, "prod"), true).unwrap(),
        &exec_opts(ExecutionMode::Apply, true),
    );

    let second_run_calls = catalog.calls().len() - first_run_calls;
    assert_eq!(second_run_calls, 0, "already-moved resources are not reprocessed");
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.succeeded, 1);
}
