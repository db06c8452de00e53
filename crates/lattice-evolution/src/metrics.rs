//! Evolution metrics, aggregated from `work_order_event` observations.
//!
//! Timing uses the first-seen timestamp per status: a work-order that
//! re-enters `mutating` after `build_failed` contributes only its first
//! `mutating -> build_*` interval. Averages over an empty set report 0.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use lattice_core::graph::observation_types;
use lattice_core::LatticeResult;
use lattice_storage::GraphEngine;

use crate::status::WorkOrderStatus;

const METRICS_SCAN_LIMIT: usize = 10_000;

/// Averaged per-step wall-clock durations, milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepDurations {
    /// assigned -> first build outcome.
    pub mutating_ms: f64,
    /// mutating -> first build outcome.
    pub build_gate_ms: f64,
    /// build_passed -> merge_pending.
    pub synthesis_ms: f64,
    /// merge_pending -> merged.
    pub merge_pending_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EvolutionMetrics {
    pub wo_created: usize,
    pub wo_merged: usize,
    pub wo_rejected: usize,
    pub builds_passed: usize,
    pub builds_failed: usize,
    /// build_passed / (build_passed + build_failed); 0 with no builds.
    pub build_success_rate: f64,
    pub mean_time_to_merge_ms: f64,
    pub step_durations: StepDurations,
    /// Work-order counts keyed by the first observed agent key.
    pub per_agent: HashMap<String, usize>,
}

/// First-seen timestamp per status plus the first agent key, per node.
struct OrderTimeline {
    first_seen: HashMap<WorkOrderStatus, DateTime<Utc>>,
    agent_key: Option<String>,
}

/// Aggregate all work-order events in the range.
pub fn compute(
    store: &GraphEngine,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> LatticeResult<EvolutionMetrics> {
    let observations = store.list_observations_by_type(
        observation_types::WORK_ORDER_EVENT,
        from,
        to,
        METRICS_SCAN_LIMIT,
    )?;

    // Group chronologically per node; the scan is already time-ordered.
    let mut timelines: HashMap<String, OrderTimeline> = HashMap::new();
    for obs in observations {
        let Some(status) = obs
            .payload
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(WorkOrderStatus::parse)
        else {
            continue;
        };
        let timeline = timelines
            .entry(obs.node_id.clone())
            .or_insert_with(|| OrderTimeline {
                first_seen: HashMap::new(),
                agent_key: None,
            });
        timeline.first_seen.entry(status).or_insert(obs.observed_at);
        if timeline.agent_key.is_none() {
            timeline.agent_key = obs
                .payload
                .get("agent_key")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
    }

    let mut metrics = EvolutionMetrics::default();
    let mut merge_intervals: Vec<f64> = Vec::new();
    let mut mutating_intervals: Vec<f64> = Vec::new();
    let mut build_gate_intervals: Vec<f64> = Vec::new();
    let mut synthesis_intervals: Vec<f64> = Vec::new();
    let mut merge_pending_intervals: Vec<f64> = Vec::new();

    for timeline in timelines.values() {
        let first = |status: WorkOrderStatus| timeline.first_seen.get(&status).copied();
        let build_outcome = match (
            first(WorkOrderStatus::BuildPassed),
            first(WorkOrderStatus::BuildFailed),
        ) {
            (Some(p), Some(f)) => Some(p.min(f)),
            (Some(p), None) => Some(p),
            (None, Some(f)) => Some(f),
            (None, None) => None,
        };

        if first(WorkOrderStatus::Created).is_some() {
            metrics.wo_created += 1;
        }
        if first(WorkOrderStatus::Merged).is_some() {
            metrics.wo_merged += 1;
        }
        if first(WorkOrderStatus::Rejected).is_some() {
            metrics.wo_rejected += 1;
        }
        if first(WorkOrderStatus::BuildPassed).is_some() {
            metrics.builds_passed += 1;
        }
        if first(WorkOrderStatus::BuildFailed).is_some() {
            metrics.builds_failed += 1;
        }

        if let (Some(created), Some(merged)) =
            (first(WorkOrderStatus::Created), first(WorkOrderStatus::Merged))
        {
            merge_intervals.push(interval_ms(created, merged));
        }
        if let (Some(assigned), Some(outcome)) = (first(WorkOrderStatus::Assigned), build_outcome)
        {
            mutating_intervals.push(interval_ms(assigned, outcome));
        }
        if let (Some(mutating), Some(outcome)) = (first(WorkOrderStatus::Mutating), build_outcome)
        {
            build_gate_intervals.push(interval_ms(mutating, outcome));
        }
        if let (Some(passed), Some(pending)) = (
            first(WorkOrderStatus::BuildPassed),
            first(WorkOrderStatus::MergePending),
        ) {
            synthesis_intervals.push(interval_ms(passed, pending));
        }
        if let (Some(pending), Some(merged)) = (
            first(WorkOrderStatus::MergePending),
            first(WorkOrderStatus::Merged),
        ) {
            merge_pending_intervals.push(interval_ms(pending, merged));
        }

        if let Some(agent) = &timeline.agent_key {
            *metrics.per_agent.entry(agent.clone()).or_insert(0) += 1;
        }
    }

    let total_builds = metrics.builds_passed + metrics.builds_failed;
    metrics.build_success_rate = if total_builds > 0 {
        metrics.builds_passed as f64 / total_builds as f64
    } else {
        0.0
    };
    metrics.mean_time_to_merge_ms = mean(&merge_intervals);
    metrics.step_durations = StepDurations {
        mutating_ms: mean(&mutating_intervals),
        build_gate_ms: mean(&build_gate_intervals),
        synthesis_ms: mean(&synthesis_intervals),
        merge_pending_ms: mean(&merge_pending_intervals),
    };
    Ok(metrics)
}

fn interval_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64
}

/// Mean of a possibly-empty set; no members means 0.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
