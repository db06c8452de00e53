//! Work-order lifecycle tests: the status graph, transition observations,
//! and the evolution metrics over them.

use std::sync::Arc;

use lattice_core::graph::observation_types;
use lattice_core::LatticeError;
use lattice_evolution::{metrics, WorkOrderMachine, WorkOrderStatus};
use lattice_storage::GraphEngine;

fn machine() -> (Arc<GraphEngine>, WorkOrderMachine) {
    let store = Arc::new(GraphEngine::open_in_memory().unwrap());
    let machine = WorkOrderMachine::new(store.clone());
    (store, machine)
}

#[test]
fn happy_path_reaches_merged_with_full_event_trail() {
    let (store, machine) = machine();
    let order = machine
        .create("wo-1", "refactorer", "lattice/wo-1", None, vec![])
        .unwrap();

    use WorkOrderStatus::*;
    for status in [
        Assigned,
        Mutating,
        BuildPassed,
        SynthesisPending,
        MergePending,
        Merged,
    ] {
        machine
            .transition(&order.id, status, "system", "advance")
            .unwrap();
    }

    let (_, payload) = machine.get(&order.id).unwrap();
    assert_eq!(payload.status, Merged);
    assert_eq!(payload.event_count, 6);
    assert_eq!(payload.attempt, 1);
    assert_eq!(payload.revision, 0);

    // Six transition observations plus the creation event.
    let observations = store
        .list_observations_for_node(&order.id, 100)
        .unwrap()
        .into_iter()
        .filter(|o| o.observation_type == observation_types::WORK_ORDER_EVENT)
        .collect::<Vec<_>>();
    assert_eq!(observations.len(), 7);

    let m = metrics::compute(&store, None, None).unwrap();
    assert_eq!(m.wo_created, 1);
    assert_eq!(m.wo_merged, 1);
    assert_eq!(m.wo_rejected, 0);
    assert_eq!(m.build_success_rate, 1.0);
    assert!(m.mean_time_to_merge_ms >= 0.0);
    assert_eq!(m.per_agent.get("refactorer"), Some(&1));
}

#[test]
fn rejection_after_failed_build_is_terminal() {
    let (store, machine) = machine();
    let order = machine
        .create("wo-2", "fixer", "lattice/wo-2", None, vec![])
        .unwrap();

    use WorkOrderStatus::*;
    for status in [Assigned, Mutating, BuildFailed] {
        machine
            .transition(&order.id, status, "system", "advance")
            .unwrap();
    }
    // Retry is still reachable from build_failed...
    assert!(BuildFailed.can_transition_to(Mutating));
    // ...but rejection consumes the order.
    machine
        .transition(&order.id, Rejected, "system", "giving up")
        .unwrap();
    let err = machine
        .transition(&order.id, Mutating, "system", "too late")
        .unwrap_err();
    assert!(matches!(err, LatticeError::InvalidTransition { .. }));

    let m = metrics::compute(&store, None, None).unwrap();
    assert_eq!(m.wo_rejected, 1);
    assert_eq!(m.builds_failed, 1);
    assert_eq!(m.build_success_rate, 0.0);
}

#[test]
fn retry_after_build_failure_bumps_revision_and_attempt() {
    let (_, machine) = machine();
    let order = machine
        .create("wo-3", "fixer", "lattice/wo-3", None, vec![])
        .unwrap();

    use WorkOrderStatus::*;
    for status in [Assigned, Mutating, BuildFailed, Mutating, BuildPassed] {
        machine
            .transition(&order.id, status, "system", "advance")
            .unwrap();
    }
    let (_, payload) = machine.get(&order.id).unwrap();
    assert_eq!(payload.attempt, 2);
    assert_eq!(payload.revision, 1);
    assert_eq!(payload.status, BuildPassed);
}

#[test]
fn every_impermissible_transition_fails_and_leaves_entity_unchanged() {
    let (_, machine) = machine();

    for from in WorkOrderStatus::ALL {
        for to in WorkOrderStatus::ALL {
            if from.can_transition_to(to) {
                continue;
            }
            // Fresh order driven to `from` along a permitted route.
            let order = machine
                .create(
                    &format!("wo-{}-{}", from.as_str(), to.as_str()),
                    "probe",
                    "b",
                    None,
                    vec![],
                )
                .unwrap();
            for step in route_to(from) {
                machine.transition(&order.id, step, "system", "route").unwrap();
            }
            let (_, before) = machine.get(&order.id).unwrap();

            let err = machine
                .transition(&order.id, to, "system", "forbidden")
                .unwrap_err();
            assert!(
                matches!(err, LatticeError::InvalidTransition { .. }),
                "{from} -> {to} should be InvalidTransition"
            );
            let (_, after) = machine.get(&order.id).unwrap();
            assert_eq!(after.status, before.status, "{from} -> {to} mutated status");
            assert_eq!(after.event_count, before.event_count);
        }
    }
}

/// A permitted route from `created` to the target status.
fn route_to(target: WorkOrderStatus) -> Vec<WorkOrderStatus> {
    use WorkOrderStatus::*;
    match target {
        Created => vec![],
        Assigned => vec![Assigned],
        Mutating => vec![Assigned, Mutating],
        BuildPassed => vec![Assigned, Mutating, BuildPassed],
        BuildFailed => vec![Assigned, Mutating, BuildFailed],
        SynthesisPending => vec![Assigned, Mutating, BuildPassed, SynthesisPending],
        MergePending => vec![
            Assigned,
            Mutating,
            BuildPassed,
            SynthesisPending,
            MergePending,
        ],
        Merged => vec![
            Assigned,
            Mutating,
            BuildPassed,
            SynthesisPending,
            MergePending,
            Merged,
        ],
        Rejected => vec![Assigned, Mutating, BuildFailed, Rejected],
    }
}

#[test]
fn step_durations_report_zero_when_no_order_contains_the_step() {
    let (store, machine) = machine();
    let order = machine
        .create("wo-4", "probe", "b", None, vec![])
        .unwrap();
    machine
        .transition(&order.id, WorkOrderStatus::Assigned, "system", "advance")
        .unwrap();

    let m = metrics::compute(&store, None, None).unwrap();
    assert_eq!(m.step_durations.synthesis_ms, 0.0);
    assert_eq!(m.step_durations.merge_pending_ms, 0.0);
    assert_eq!(m.step_durations.mutating_ms, 0.0);
}

#[test]
fn scope_validation_uses_order_scope() {
    let (_, machine) = machine();
    let order = machine
        .create(
            "wo-5",
            "probe",
            "b",
            None,
            vec!["/dash/".to_string(), "/lib/".to_string()],
        )
        .unwrap();

    let check = machine
        .validate_scope(&order.id, &["/lib/util.go".to_string()])
        .unwrap();
    assert!(check.passed);
    assert_eq!(check.in_scope, vec!["/lib/util.go".to_string()]);

    let err = machine
        .validate_scope(&order.id, &["/etc/hosts".to_string()])
        .unwrap_err();
    assert!(matches!(err, LatticeError::ScopeViolation { .. }));
}
