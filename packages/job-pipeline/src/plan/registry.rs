//! Tool trait and registry with usage statistics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::error::{PlanError, PlanResult};

/// Error type returned by tools.
pub type ToolError = Box<dyn std::error::Error + Send + Sync>;

/// A named operation a plan step can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Input slots the tool requires.
    fn inputs(&self) -> &[&str];

    /// Shape of the returned value, for planners.
    fn output(&self) -> &str {
        "json"
    }

    /// Run with every declared input resolved.
    async fn run(&self, inputs: &HashMap<String, Value>) -> Result<Value, ToolError>;
}

/// Success and failure counts for one tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolStats {
    pub successes: u64,
    pub failures: u64,
    pub last_used: Option<DateTime<Utc>>,
}

impl ToolStats {
    /// Fraction of runs that succeeded; 0 when never run.
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            self.successes as f64 / total as f64
        }
    }
}

/// Tool listing for planners.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub inputs: Vec<String>,
    pub output: String,
    pub success_rate: f64,
}

/// Registered tools by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    stats: RwLock<HashMap<String, ToolStats>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replacing registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool by name and record the outcome.
    pub async fn run_tool(&self, name: &str, inputs: &HashMap<String, Value>) -> PlanResult<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| PlanError::UnknownTool(name.to_string()))?;

        debug!(tool = %name, "Running tool");
        let result = tool.run(inputs).await;

        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        let entry = stats.entry(name.to_string()).or_default();
        entry.last_used = Some(Utc::now());

        match result {
            Ok(value) => {
                entry.successes += 1;
                Ok(value)
            }
            Err(e) => {
                entry.failures += 1;
                Err(PlanError::ToolFailed {
                    tool: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Usage statistics for a tool.
    pub fn stats(&self, name: &str) -> ToolStats {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Describe every tool, sorted by name.
    pub fn describe(&self) -> Vec<ToolDescription> {
        self.tools
            .values()
            .map(|tool| ToolDescription {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                inputs: tool.inputs().iter().map(|s| s.to_string()).collect(),
                output: tool.output().to_string(),
                success_rate: self.stats(tool.name()).success_rate(),
            })
            .collect()
    }
}
