//! Pluggable executor strategies
//!
//! The executor is the seam at which the actual agent backend plugs into
//! the dispatcher: one implementation per `AgentKind`, each interpreting
//! the definition's opaque `execution_config` in its own way. The
//! dispatcher only races the returned future against the timeout and
//! normalizes the output; a timed-out executor future is simply dropped,
//! so implementations must tolerate being abandoned mid-flight.
//!
//! Simulated LLM and rule-table executors ship as defaults so the crate is
//! exercisable end-to-end without a real backend.

use crate::agent::definition::{AgentDefinition, AgentKind};
use crate::dispatch::request::AgentRequest;
use crate::utils::errors::{DispatchError, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Rule confidence below which a hybrid agent also consults the LLM
pub const HYBRID_FALLBACK_THRESHOLD: f64 = 0.8;

/// Confidence reported for a matched rule when the rule carries none
pub const RULE_MATCH_CONFIDENCE: f64 = 0.95;

/// Confidence reported when no rule matched
pub const RULE_UNMATCHED_CONFIDENCE: f64 = 0.4;

/// Normalized result of one executor invocation
#[derive(Debug, Clone)]
pub struct ExecutorOutput {
    /// Produced output
    pub output: Value,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Token-like usage, when the backend meters it
    pub resource_units: Option<u64>,

    /// Opaque metadata forwarded into the response
    pub metadata: HashMap<String, Value>,
}

/// One agent backend; implementations must be abandonable on timeout
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(
        &self,
        definition: &AgentDefinition,
        request: &AgentRequest,
    ) -> Result<ExecutorOutput>;
}

fn input_text(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Simulated LLM backend: modelled latency, temperature-shaped confidence,
/// token-like resource accounting
#[derive(Debug, Default)]
pub struct SimulatedLlmExecutor;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LlmConfig {
    model: String,
    temperature: f64,
    latency_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "simulated-llm".to_string(),
            temperature: 0.7,
            latency_ms: 25,
        }
    }
}

#[async_trait]
impl AgentExecutor for SimulatedLlmExecutor {
    async fn execute(
        &self,
        definition: &AgentDefinition,
        request: &AgentRequest,
    ) -> Result<ExecutorOutput> {
        let config = parse_config::<LlmConfig>(&definition.execution_config)?;

        // Modelled network/inference latency
        tokio::time::sleep(Duration::from_millis(config.latency_ms)).await;

        let prompt = input_text(&request.input);
        let completion = format!("[{}] response to: {}", config.model, prompt);
        let resource_units = (prompt.len() as u64 + completion.len() as u64) / 4;

        let jitter: f64 = rand::thread_rng().gen_range(0.0..0.05);
        let confidence = (0.97 - config.temperature * 0.15 - jitter).clamp(0.0, 1.0);

        let mut metadata = HashMap::new();
        metadata.insert("model".to_string(), json!(config.model));
        metadata.insert("temperature".to_string(), json!(config.temperature));

        Ok(ExecutorOutput {
            output: json!({ "completion": completion }),
            confidence,
            resource_units: Some(resource_units),
            metadata,
        })
    }
}

/// Deterministic rule-table backend: first substring match wins
#[derive(Debug, Default)]
pub struct RuleExecutor;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuleTable {
    rules: Vec<Rule>,
    default_output: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Rule {
    /// Substring the input must contain for the rule to fire
    contains: String,
    output: Value,
    confidence: Option<f64>,
}

#[async_trait]
impl AgentExecutor for RuleExecutor {
    async fn execute(
        &self,
        definition: &AgentDefinition,
        request: &AgentRequest,
    ) -> Result<ExecutorOutput> {
        let table = parse_config::<RuleTable>(&definition.execution_config)?;
        let input = input_text(&request.input);

        let mut metadata = HashMap::new();

        for rule in &table.rules {
            if input.contains(&rule.contains) {
                metadata.insert("matched_rule".to_string(), json!(rule.contains));
                return Ok(ExecutorOutput {
                    output: rule.output.clone(),
                    confidence: rule.confidence.unwrap_or(RULE_MATCH_CONFIDENCE),
                    resource_units: None,
                    metadata,
                });
            }
        }

        metadata.insert("matched_rule".to_string(), Value::Null);
        Ok(ExecutorOutput {
            output: table
                .default_output
                .unwrap_or_else(|| json!({ "matched": false })),
            confidence: RULE_UNMATCHED_CONFIDENCE,
            resource_units: None,
            metadata,
        })
    }
}

/// Rules first; when rule confidence falls below
/// [`HYBRID_FALLBACK_THRESHOLD`] the LLM is consulted as well and the two
/// outputs are combined with their mean confidence
pub struct HybridExecutor {
    rule: Arc<dyn AgentExecutor>,
    llm: Arc<dyn AgentExecutor>,
}

impl HybridExecutor {
    pub fn new(rule: Arc<dyn AgentExecutor>, llm: Arc<dyn AgentExecutor>) -> Self {
        Self { rule, llm }
    }
}

#[async_trait]
impl AgentExecutor for HybridExecutor {
    async fn execute(
        &self,
        definition: &AgentDefinition,
        request: &AgentRequest,
    ) -> Result<ExecutorOutput> {
        let rule_result = self.rule.execute(definition, request).await?;

        if rule_result.confidence >= HYBRID_FALLBACK_THRESHOLD {
            let mut result = rule_result;
            result
                .metadata
                .insert("resolved_by".to_string(), json!("rule"));
            return Ok(result);
        }

        let llm_result = self.llm.execute(definition, request).await?;

        let mut metadata = rule_result.metadata;
        metadata.extend(llm_result.metadata);
        metadata.insert("resolved_by".to_string(), json!("hybrid"));

        Ok(ExecutorOutput {
            output: json!({
                "rule": rule_result.output,
                "llm": llm_result.output,
            }),
            confidence: (rule_result.confidence + llm_result.confidence) / 2.0,
            resource_units: llm_result.resource_units,
            metadata,
        })
    }
}

/// The executor strategy table, keyed on `AgentKind`
pub struct ExecutorSet {
    llm: Arc<dyn AgentExecutor>,
    rule: Arc<dyn AgentExecutor>,
    hybrid: Arc<dyn AgentExecutor>,
}

impl ExecutorSet {
    /// Build a set from an LLM and a rule backend; the hybrid strategy is
    /// composed from the two
    pub fn new(llm: Arc<dyn AgentExecutor>, rule: Arc<dyn AgentExecutor>) -> Self {
        let hybrid = Arc::new(HybridExecutor::new(rule.clone(), llm.clone()));
        Self { llm, rule, hybrid }
    }

    /// The default simulated backends
    pub fn simulated() -> Self {
        Self::new(
            Arc::new(SimulatedLlmExecutor),
            Arc::new(RuleExecutor),
        )
    }

    pub fn for_kind(&self, kind: AgentKind) -> Arc<dyn AgentExecutor> {
        match kind {
            AgentKind::Llm => self.llm.clone(),
            AgentKind::RuleBased => self.rule.clone(),
            AgentKind::Hybrid => self.hybrid.clone(),
        }
    }
}

fn parse_config<T: Default + for<'de> Deserialize<'de>>(config: &Value) -> Result<T> {
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone())
        .map_err(|e| DispatchError::ExecutorError(format!("invalid execution config: {e}")))
}
