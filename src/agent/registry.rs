//! In-memory agent registry
//!
//! Holds one entry per registered agent: the definition, the serialized
//! admission state (rate window, running counter, priority queue), and the
//! metrics cell. Entries are shared as `Arc`s so executions that are
//! already in flight keep a valid handle across an unregistration; removal
//! only prevents new admissions.

use crate::agent::definition::AgentDefinition;
use crate::dispatch::admission::AdmissionState;
use crate::dispatch::queue::QueuedRequest;
use crate::metrics::AgentMetrics;
use crate::utils::errors::{DispatchError, Result};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

/// Live state for one registered agent
pub(crate) struct AgentEntry {
    /// Current definition; swapped in place on re-registration
    definition: RwLock<Arc<AgentDefinition>>,

    /// Admission-control state; the single serialization point for this
    /// agent's rate window, slot counter, and queue
    pub admission: Mutex<AdmissionState>,

    /// Metrics cell, mutated only from terminal outcomes and rejections
    pub metrics: Mutex<AgentMetrics>,
}

impl AgentEntry {
    fn new(definition: Arc<AgentDefinition>) -> Self {
        Self {
            definition: RwLock::new(definition),
            admission: Mutex::new(AdmissionState::default()),
            metrics: Mutex::new(AgentMetrics::default()),
        }
    }

    /// Cheap snapshot of the current definition
    pub fn definition(&self) -> Arc<AgentDefinition> {
        self.definition.read().clone()
    }

    /// Swap the definition and zero the metrics, keeping admission state
    /// so slots held by in-flight work stay accounted
    fn replace(&self, definition: Arc<AgentDefinition>) {
        *self.definition.write() = definition;
        *self.metrics.lock() = AgentMetrics::default();
    }
}

/// Concurrent map of registered agents
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Arc<DashMap<String, Arc<AgentEntry>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition. Replacement zeroes the metrics entry;
    /// a fresh registration starts with everything zeroed. Returns whether
    /// an existing registration was replaced.
    pub(crate) fn register(&self, definition: AgentDefinition) -> Result<bool> {
        definition
            .validate()
            .map_err(DispatchError::InvalidDefinition)?;

        let id = definition.id.clone();
        let definition = Arc::new(definition);

        if let Some(existing) = self.agents.get(&id) {
            existing.replace(definition);
            info!(agent_id = %id, "agent definition replaced");
            return Ok(true);
        }

        self.agents.insert(id.clone(), Arc::new(AgentEntry::new(definition)));
        info!(agent_id = %id, "agent registered");
        Ok(false)
    }

    /// Remove an agent: the definition, its metrics, and its rate-limit
    /// history go away together. Admission is closed under the per-agent
    /// lock so no request can be admitted mid-removal; still-queued
    /// requests are handed back for the caller to fail. In-flight
    /// executions are not cancelled.
    pub(crate) fn unregister(&self, id: &str) -> Option<Vec<QueuedRequest>> {
        let (_, entry) = self.agents.remove(id)?;

        let drained = {
            let mut admission = entry.admission.lock();
            admission.closed = true;
            admission.queue.drain()
        };

        debug!(agent_id = %id, queued = drained.len(), "agent unregistered");
        Some(drained)
    }

    /// Look up the live entry for admission and metrics access
    pub(crate) fn entry(&self, id: &str) -> Option<Arc<AgentEntry>> {
        self.agents.get(id).map(|e| e.value().clone())
    }

    /// Read-only definition lookup
    pub fn get(&self, id: &str) -> Option<Arc<AgentDefinition>> {
        self.agents.get(id).map(|e| e.definition())
    }

    /// Snapshot of all registered definitions
    pub fn list(&self) -> Vec<Arc<AgentDefinition>> {
        self.agents.iter().map(|e| e.definition()).collect()
    }

    /// Snapshot of all live entries, for status and metrics aggregation
    pub(crate) fn entries(&self) -> Vec<(String, Arc<AgentEntry>)> {
        self.agents
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
