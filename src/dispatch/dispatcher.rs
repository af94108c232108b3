//! The agent request dispatcher
//!
//! Accepts work for named agents, enforces per-agent admission control,
//! executes through the configured executor strategy with a deadline, and
//! maintains per-agent metrics. All admission-state mutation for one agent
//! (rate window, slot counter, queue) happens under that agent's mutex, so
//! an incoming admission check and a "slot freed" drain can never race.
//!
//! Execution always runs on a spawned task and the submitting caller waits
//! on a reply channel; a caller that goes away early therefore cannot leak
//! a concurrency slot.

use crate::agent::definition::AgentDefinition;
use crate::agent::executor::ExecutorSet;
use crate::agent::registry::{AgentEntry, AgentRegistry};
use crate::dispatch::queue::PriorityCounts;
use crate::dispatch::request::{AgentRequest, AgentResponse, SubmitOptions};
use crate::events::{DispatchEvent, EventNotifier};
use crate::metrics::{export_snapshot, AgentMetrics, ExportFormat};
use crate::utils::config::DispatcherConfig;
use crate::utils::errors::{DispatchError, Result};
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Snapshot of queued and executing work across all agents
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStatus {
    /// Requests parked in priority queues
    pub queue_length: usize,

    /// Requests currently executing
    pub in_flight: usize,

    /// Parked requests per priority level
    pub by_priority: PriorityCounts,
}

/// Outcome of the admission decision for one request
enum AdmitOutcome {
    /// A slot was reserved; execute now
    Execute(AgentRequest),

    /// Parked in the priority queue; the receiver delivers the outcome
    Parked(oneshot::Receiver<Result<AgentResponse>>),
}

/// In-process dispatcher for named agents; cheap to clone and share
#[derive(Clone)]
pub struct AgentDispatcher {
    registry: AgentRegistry,
    executors: Arc<ExecutorSet>,
    notifier: EventNotifier,
    /// Claim-once outcomes of background submissions
    pending: Arc<DashMap<String, Result<AgentResponse>>>,
    config: Arc<DispatcherConfig>,
}

impl Default for AgentDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDispatcher {
    /// Dispatcher with default configuration and the simulated executors
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    /// Dispatcher with custom configuration and the simulated executors
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self::with_executors(config, ExecutorSet::simulated())
    }

    /// Dispatcher with custom executor backends
    pub fn with_executors(config: DispatcherConfig, executors: ExecutorSet) -> Self {
        let notifier = EventNotifier::new(config.event_capacity);
        Self {
            registry: AgentRegistry::new(),
            executors: Arc::new(executors),
            notifier,
            pending: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    // ---- registration -------------------------------------------------

    /// Register an agent, or replace an existing registration (which
    /// zeroes its metrics)
    pub fn register_agent(&self, definition: AgentDefinition) -> Result<()> {
        let agent_id = definition.id.clone();
        self.registry.register(definition)?;
        self.notifier
            .emit(DispatchEvent::AgentRegistered { agent_id });
        Ok(())
    }

    /// Unregister an agent. Queued requests fail with `AgentNotFound`;
    /// executions already in flight run to completion. Returns whether the
    /// agent was registered.
    pub fn unregister_agent(&self, agent_id: &str) -> bool {
        let Some(drained) = self.registry.unregister(agent_id) else {
            return false;
        };

        for queued in drained {
            self.emit_failed(&queued.request, "agent unregistered");
            let _ = queued
                .reply
                .send(Err(DispatchError::AgentNotFound(agent_id.to_string())));
        }

        self.notifier.emit(DispatchEvent::AgentUnregistered {
            agent_id: agent_id.to_string(),
        });
        true
    }

    /// Read-only definition lookup
    pub fn agent(&self, agent_id: &str) -> Option<Arc<AgentDefinition>> {
        self.registry.get(agent_id)
    }

    /// Snapshot of all registered definitions
    pub fn list_agents(&self) -> Vec<Arc<AgentDefinition>> {
        self.registry.list()
    }

    // ---- submission ---------------------------------------------------

    /// Submit a request and block until it completes, fails, or is
    /// rejected outright
    pub async fn submit_and_wait(
        &self,
        agent_id: &str,
        input: serde_json::Value,
        opts: SubmitOptions,
    ) -> Result<AgentResponse> {
        let request = AgentRequest::new(agent_id, input, &opts);
        self.submit_request(request, &opts).await
    }

    /// Submit a request without waiting. Returns the generated request id
    /// immediately; the outcome (response or error) is recorded and can be
    /// claimed once via [`get_response`](Self::get_response).
    pub fn submit_background(
        &self,
        agent_id: &str,
        input: serde_json::Value,
        opts: SubmitOptions,
    ) -> String {
        let request = AgentRequest::new(agent_id, input, &opts);
        let request_id = request.id.clone();

        let dispatcher = self.clone();
        let key = request_id.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.submit_request(request, &opts).await;
            dispatcher.pending.insert(key, outcome);
        });

        request_id
    }

    /// Claim the outcome of a background submission. Returns `None` while
    /// the request is still pending or unknown; the outcome is removed on
    /// the first successful claim.
    pub fn get_response(&self, request_id: &str) -> Option<Result<AgentResponse>> {
        self.pending.remove(request_id).map(|(_, outcome)| outcome)
    }

    // ---- introspection ------------------------------------------------

    /// Metrics snapshot for one agent
    pub fn metrics(&self, agent_id: &str) -> Option<AgentMetrics> {
        self.registry.entry(agent_id).map(|e| e.metrics.lock().clone())
    }

    /// Queued and in-flight work across all agents
    pub fn queue_status(&self) -> QueueStatus {
        let mut status = QueueStatus {
            queue_length: 0,
            in_flight: 0,
            by_priority: PriorityCounts::default(),
        };

        for (_, entry) in self.registry.entries() {
            let admission = entry.admission.lock();
            status.queue_length += admission.queue.len();
            status.in_flight += admission.running;
            status.by_priority.merge(admission.queue.counts());
        }

        status
    }

    /// Serialize the current metrics snapshot; pure formatting
    pub fn export_metrics(&self, format: ExportFormat) -> Result<String> {
        let snapshot: BTreeMap<String, AgentMetrics> = self
            .registry
            .entries()
            .into_iter()
            .map(|(id, entry)| (id, entry.metrics.lock().clone()))
            .collect();
        export_snapshot(&snapshot, format)
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.notifier.subscribe()
    }

    // ---- internal path ------------------------------------------------

    async fn submit_request(
        &self,
        request: AgentRequest,
        opts: &SubmitOptions,
    ) -> Result<AgentResponse> {
        self.notifier.emit(DispatchEvent::RequestReceived {
            request_id: request.id.clone(),
            agent_id: request.agent_id.clone(),
        });

        let Some(entry) = self.registry.entry(&request.agent_id) else {
            self.emit_failed(&request, "agent not found");
            return Err(DispatchError::AgentNotFound(request.agent_id));
        };

        match self.try_admit(&entry, request, opts)? {
            AdmitOutcome::Execute(request) => {
                let (reply, rx) = oneshot::channel();
                self.spawn_execution(entry, request, reply);
                Self::await_reply(rx).await
            }
            AdmitOutcome::Parked(rx) => Self::await_reply(rx).await,
        }
    }

    async fn await_reply(
        rx: oneshot::Receiver<Result<AgentResponse>>,
    ) -> Result<AgentResponse> {
        rx.await
            .map_err(|_| DispatchError::ExecutorError("execution task dropped".to_string()))?
    }

    /// Evaluate admission for one request under the agent's lock: rate
    /// limit first (hard rejection), then concurrency (queue or, when
    /// queuing is disabled, reject).
    fn try_admit(
        &self,
        entry: &Arc<AgentEntry>,
        request: AgentRequest,
        opts: &SubmitOptions,
    ) -> Result<AdmitOutcome> {
        let definition = entry.definition();
        let constraints = &definition.constraints;

        let mut admission = entry.admission.lock();

        if admission.closed {
            drop(admission);
            self.emit_failed(&request, "agent not found");
            return Err(DispatchError::AgentNotFound(request.agent_id));
        }

        let now = Instant::now();
        if !admission.rate_has_room(constraints.rate_limit.as_ref(), now) {
            drop(admission);
            entry
                .metrics
                .lock()
                .record_rate_limit_rejection(&request.agent_id);
            self.emit_failed(&request, "rate limit exceeded");
            return Err(DispatchError::RateLimitExceeded(request.agent_id));
        }

        if admission.slot_available(constraints.max_concurrent) {
            admission.record_admission(constraints.rate_limit.as_ref(), now);
            admission.running += 1;
            return Ok(AdmitOutcome::Execute(request));
        }

        if !opts.queue_when_saturated {
            drop(admission);
            entry
                .metrics
                .lock()
                .record_concurrency_rejection(&request.agent_id);
            self.emit_failed(&request, "concurrency limit exceeded");
            return Err(DispatchError::ConcurrencyLimitExceeded(request.agent_id));
        }

        let queued_event = DispatchEvent::RequestQueued {
            request_id: request.id.clone(),
            agent_id: request.agent_id.clone(),
            priority: request.priority,
        };
        let (reply, rx) = oneshot::channel();
        admission.queue.push(request, reply);
        self.notifier.emit(queued_event);

        Ok(AdmitOutcome::Parked(rx))
    }

    /// Run an admitted request on its own task, then release the slot and
    /// drain the queue
    fn spawn_execution(
        &self,
        entry: Arc<AgentEntry>,
        request: AgentRequest,
        reply: oneshot::Sender<Result<AgentResponse>>,
    ) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.execute_admitted(&entry, request).await;
            dispatcher.release_slot_and_drain(&entry);
            if reply.send(outcome).is_err() {
                debug!("caller went away before the outcome was delivered");
            }
        });
    }

    /// Race the executor against the deadline and record the terminal
    /// outcome exactly once
    async fn execute_admitted(
        &self,
        entry: &Arc<AgentEntry>,
        request: AgentRequest,
    ) -> Result<AgentResponse> {
        self.notifier.emit(DispatchEvent::RequestStarted {
            request_id: request.id.clone(),
            agent_id: request.agent_id.clone(),
        });

        let definition = entry.definition();
        let deadline = definition
            .constraints
            .timeout
            .unwrap_or_else(|| self.config.default_timeout());
        let executor = self.executors.for_kind(definition.kind);

        let started = Instant::now();
        let raced = tokio::time::timeout(deadline, executor.execute(&definition, &request)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match raced {
            Ok(Ok(output)) => {
                entry.metrics.lock().record_success(
                    &request.agent_id,
                    duration_ms,
                    output.confidence,
                    output.resource_units,
                );
                self.notifier.emit(DispatchEvent::RequestCompleted {
                    request_id: request.id.clone(),
                    agent_id: request.agent_id.clone(),
                    duration_ms,
                });

                Ok(AgentResponse {
                    request_id: request.id,
                    agent_id: request.agent_id,
                    output: output.output,
                    confidence: output.confidence,
                    resource_units: output.resource_units,
                    duration_ms,
                    metadata: output.metadata,
                    completed_at: Utc::now(),
                })
            }
            Ok(Err(err)) => {
                entry
                    .metrics
                    .lock()
                    .record_failure(&request.agent_id, err.kind());
                self.emit_failed(&request, &err.to_string());
                Err(err)
            }
            Err(_) => {
                // Deadline won the race; the executor future was dropped
                // and its eventual result is discarded
                warn!(
                    request_id = %request.id,
                    agent_id = %request.agent_id,
                    ?deadline,
                    "execution timed out"
                );
                let err = DispatchError::Timeout(deadline);
                entry
                    .metrics
                    .lock()
                    .record_failure(&request.agent_id, err.kind());
                self.emit_failed(&request, &err.to_string());
                Err(err)
            }
        }
    }

    /// Free one concurrency slot and hand freed capacity to the queue:
    /// highest-priority oldest first, re-checking the rate window for each
    /// candidate. A candidate rejected by the window fails outright and
    /// the drain moves on to the next one.
    fn release_slot_and_drain(&self, entry: &Arc<AgentEntry>) {
        let definition = entry.definition();
        let constraints = &definition.constraints;

        let mut launches = Vec::new();
        let mut rate_rejected = Vec::new();
        {
            let mut admission = entry.admission.lock();
            admission.running = admission.running.saturating_sub(1);

            if admission.closed {
                return;
            }

            while admission.slot_available(constraints.max_concurrent) {
                let Some(candidate) = admission.queue.pop() else {
                    break;
                };

                let now = Instant::now();
                if !admission.rate_has_room(constraints.rate_limit.as_ref(), now) {
                    rate_rejected.push(candidate);
                    continue;
                }

                admission.record_admission(constraints.rate_limit.as_ref(), now);
                admission.running += 1;
                launches.push(candidate);
            }
        }

        for rejected in rate_rejected {
            entry
                .metrics
                .lock()
                .record_rate_limit_rejection(&rejected.request.agent_id);
            self.emit_failed(&rejected.request, "rate limit exceeded");
            let _ = rejected.reply.send(Err(DispatchError::RateLimitExceeded(
                rejected.request.agent_id.clone(),
            )));
        }

        for launch in launches {
            debug!(
                request_id = %launch.request.id,
                agent_id = %launch.request.agent_id,
                "drained request into freed slot"
            );
            self.spawn_execution(entry.clone(), launch.request, launch.reply);
        }
    }

    fn emit_failed(&self, request: &AgentRequest, reason: &str) {
        self.notifier.emit(DispatchEvent::RequestFailed {
            request_id: request.id.clone(),
            agent_id: request.agent_id.clone(),
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::definition::{AgentDefinition, AgentKind};
    use serde_json::json;

    fn rule_agent(id: &str) -> AgentDefinition {
        AgentDefinition::new(id, format!("Agent {id}"), AgentKind::RuleBased)
            .with_execution_config(json!({
                "rules": [{ "contains": "", "output": { "ok": true } }]
            }))
    }

    #[tokio::test]
    async fn test_submit_to_unknown_agent_fails_fast() {
        let dispatcher = AgentDispatcher::new();
        let err = dispatcher
            .submit_and_wait("ghost", json!("x"), SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn test_register_submit_and_metrics() {
        let dispatcher = AgentDispatcher::new();
        dispatcher.register_agent(rule_agent("a1")).unwrap();

        let response = dispatcher
            .submit_and_wait("a1", json!("hello"), SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(response.agent_id, "a1");
        assert_eq!(response.output["ok"], true);

        let metrics = dispatcher.metrics("a1").unwrap();
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.succeeded, 1);
    }

    #[tokio::test]
    async fn test_registration_events() {
        let dispatcher = AgentDispatcher::new();
        let mut events = dispatcher.subscribe();

        dispatcher.register_agent(rule_agent("a1")).unwrap();
        assert!(dispatcher.unregister_agent("a1"));
        assert!(!dispatcher.unregister_agent("a1"));

        assert!(matches!(
            events.recv().await.unwrap(),
            DispatchEvent::AgentRegistered { .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            DispatchEvent::AgentUnregistered { .. }
        ));
    }

    #[tokio::test]
    async fn test_request_lifecycle_events() {
        let dispatcher = AgentDispatcher::new();
        dispatcher.register_agent(rule_agent("a1")).unwrap();

        let mut events = dispatcher.subscribe();
        dispatcher
            .submit_and_wait("a1", json!("hello"), SubmitOptions::default())
            .await
            .unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            DispatchEvent::RequestReceived { .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            DispatchEvent::RequestStarted { .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            DispatchEvent::RequestCompleted { .. }
        ));
    }

    #[tokio::test]
    async fn test_queue_status_idle() {
        let dispatcher = AgentDispatcher::new();
        dispatcher.register_agent(rule_agent("a1")).unwrap();

        let status = dispatcher.queue_status();
        assert_eq!(status.queue_length, 0);
        assert_eq!(status.in_flight, 0);
        assert_eq!(status.by_priority, PriorityCounts::default());
    }

    #[tokio::test]
    async fn test_export_metrics_lists_registered_agents() {
        let dispatcher = AgentDispatcher::new();
        dispatcher.register_agent(rule_agent("a1")).unwrap();
        dispatcher.register_agent(rule_agent("a2")).unwrap();

        let json_out = dispatcher.export_metrics(ExportFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_out).unwrap();
        assert!(parsed.get("a1").is_some());
        assert!(parsed.get("a2").is_some());

        let csv_out = dispatcher.export_metrics(ExportFormat::Csv).unwrap();
        assert_eq!(csv_out.lines().count(), 3);
    }
}
