//! Priority dispatch queue
//!
//! Holds admitted-but-not-yet-running requests for one agent and releases
//! them highest-priority-first as concurrency slots free up. Within one
//! priority the order is first-in-first-out: new high-priority items jump
//! ahead of queued medium/low items but never ahead of an equal-priority
//! item that arrived earlier.

use crate::dispatch::request::{AgentRequest, AgentResponse, Priority};
use crate::utils::errors::Result;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tokio::sync::oneshot;

/// A request parked in the queue together with its reply channel
#[derive(Debug)]
pub(crate) struct QueuedRequest {
    /// The parked request
    pub request: AgentRequest,

    /// Delivers the eventual outcome to the submitting caller
    pub reply: oneshot::Sender<Result<AgentResponse>>,

    /// Arrival sequence, assigned by the queue
    sequence: u64,
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.request.priority == other.request.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then lower sequence (earlier arrival)
        match self.request.priority.cmp(&other.request.priority) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

/// Queued request counts per priority level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityCounts {
    /// Merge another count set into this one
    pub fn merge(&mut self, other: PriorityCounts) {
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
    }
}

/// Stable priority-ordered holding area for one agent's pending requests
#[derive(Debug, Default)]
pub(crate) struct DispatchQueue {
    heap: BinaryHeap<QueuedRequest>,
    next_sequence: u64,
}

impl DispatchQueue {
    /// Park a request together with its reply channel
    pub fn push(&mut self, request: AgentRequest, reply: oneshot::Sender<Result<AgentResponse>>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.heap.push(QueuedRequest {
            request,
            reply,
            sequence,
        });
    }

    /// Remove the highest-priority, oldest request
    pub fn pop(&mut self) -> Option<QueuedRequest> {
        self.heap.pop()
    }

    /// Remove everything, in no particular order (used at unregistration)
    pub fn drain(&mut self) -> Vec<QueuedRequest> {
        self.heap.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Count parked requests per priority level
    pub fn counts(&self) -> PriorityCounts {
        let mut counts = PriorityCounts::default();
        for entry in self.heap.iter() {
            match entry.request.priority {
                Priority::High => counts.high += 1,
                Priority::Medium => counts.medium += 1,
                Priority::Low => counts.low += 1,
            }
        }
        counts
    }
}
