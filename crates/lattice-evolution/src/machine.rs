//! The work-order state machine over the graph store.
//!
//! Every transition writes a `work_order_event` observation carrying the
//! new status, actor, detail, and the bookkeeping counters. Those
//! observations — not the node payload — feed the evolution metrics.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use lattice_core::graph::{node_types, observation_types, Layer, Node, Observation};
use lattice_core::{LatticeError, LatticeResult};
use lattice_storage::GraphEngine;

use crate::scope::{enforce_scope, ScopeCheck};
use crate::status::WorkOrderStatus;
use crate::work_order::WorkOrderPayload;

pub struct WorkOrderMachine {
    store: Arc<GraphEngine>,
}

impl WorkOrderMachine {
    pub fn new(store: Arc<GraphEngine>) -> Self {
        Self { store }
    }

    /// Create a work-order node in `created` status and record the
    /// creation event. Returns the node.
    pub fn create(
        &self,
        name: &str,
        agent_key: &str,
        branch: &str,
        task_id: Option<String>,
        scope: Vec<String>,
    ) -> LatticeResult<Node> {
        let mut payload = WorkOrderPayload::new(agent_key, branch);
        payload.task_id = task_id;
        payload.scope = scope;
        let node = Node::new(
            Layer::Automation,
            node_types::WORK_ORDER,
            name,
            payload.to_value()?,
        );
        self.store.create_node(&node)?;
        self.record_event(&node.id, &payload, "system", "created")?;
        info!(work_order = name, branch, "created work order");
        Ok(node)
    }

    /// Load and parse a work-order by id.
    pub fn get(&self, id: &str) -> LatticeResult<(Node, WorkOrderPayload)> {
        let node = self.store.get_active(id)?;
        if node.layer != Layer::Automation || node.node_type != node_types::WORK_ORDER {
            return Err(LatticeError::invalid_argument(format!(
                "node {id} is not a work order"
            )));
        }
        let payload = WorkOrderPayload::parse(&node.payload)?;
        Ok((node, payload))
    }

    /// Attempt a status transition. On an impermissible pair the entity is
    /// left untouched and `InvalidTransition` is returned.
    pub fn transition(
        &self,
        id: &str,
        to: WorkOrderStatus,
        actor: &str,
        detail: &str,
    ) -> LatticeResult<WorkOrderPayload> {
        let (mut node, mut payload) = self.get(id)?;
        let from = payload.status;
        if !from.can_transition_to(to) {
            return Err(LatticeError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        if to == WorkOrderStatus::Mutating {
            payload.attempt += 1;
            if from == WorkOrderStatus::BuildFailed {
                payload.revision += 1;
            }
        }
        payload.status = to;
        payload.event_count += 1;
        payload.last_event = Some(json!({
            "status": to.as_str(),
            "actor": actor,
            "detail": detail,
        }));

        node.payload = payload.to_value()?;
        self.store.update_node(&node)?;
        self.record_event(id, &payload, actor, detail)?;
        info!(work_order = %id, from = %from, to = %to, "work order transition");
        Ok(payload)
    }

    /// Validate a mutation batch against the order's scope. Out-of-scope
    /// paths surface as `ScopeViolation` with the offending list.
    pub fn validate_scope(&self, id: &str, modified: &[String]) -> LatticeResult<ScopeCheck> {
        let (_, payload) = self.get(id)?;
        enforce_scope(&payload.scope, modified)
    }

    fn record_event(
        &self,
        id: &str,
        payload: &WorkOrderPayload,
        actor: &str,
        detail: &str,
    ) -> LatticeResult<()> {
        let observation = Observation::new(
            id,
            observation_types::WORK_ORDER_EVENT,
            json!({
                "status": payload.status.as_str(),
                "actor": actor,
                "detail": detail,
                "revision": payload.revision,
                "attempt": payload.attempt,
                "event_number": payload.event_count,
                "branch": payload.branch,
                "agent_key": payload.agent_key,
            }),
        );
        self.store.create_observation(&observation)
    }
}
