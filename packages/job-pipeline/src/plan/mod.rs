//! Step plans: ordered tool calls whose inputs are literals or earlier outputs.
//!
//! A plan is validated against a [`ToolRegistry`] before anything runs, so a
//! bad reference fails up front instead of halfway through. Outputs are kept
//! in a map keyed by each step's `output_key`; bindings resolve by lookup.
//!
//! ```rust,ignore
//! let plan = Plan::from_json(r#"[
//!     {"tool": "fetch_jobs", "input": {"source": "board"}, "output_key": "raw"},
//!     {"tool": "summarize_jobs", "input": {"jobs": "{{ raw }}"}, "output_key": "jobs"}
//! ]"#)?;
//! let outputs = execute_plan(&plan, &registry).await?;
//! ```

pub mod binding;
pub mod registry;
pub mod tools;

pub use binding::Binding;
pub use registry::{Tool, ToolDescription, ToolError, ToolRegistry, ToolStats};
pub use tools::{FetchJobsTool, SortJobsTool, SummarizeJobsTool};

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

use crate::error::{PlanError, PlanResult};

/// One tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub tool: String,
    pub inputs: BTreeMap<String, Binding>,
    pub output_key: String,
}

impl PlanStep {
    pub fn new(tool: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            inputs: BTreeMap::new(),
            output_key: output_key.into(),
        }
    }

    /// Bind a slot to a literal value.
    pub fn with_literal(mut self, slot: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(slot.into(), Binding::Literal(value));
        self
    }

    /// Bind a slot to an earlier step's output.
    pub fn with_output(mut self, slot: impl Into<String>, key: impl Into<String>) -> Self {
        self.inputs.insert(slot.into(), Binding::Output(key.into()));
        self
    }
}

#[derive(Deserialize)]
struct StepDocument {
    tool: String,
    #[serde(default, alias = "inputs")]
    input: serde_json::Map<String, Value>,
    output_key: String,
}

/// Ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// Parse a planner's JSON array of `{tool, input, output_key}` objects.
    pub fn from_json(json: &str) -> PlanResult<Self> {
        let documents: Vec<StepDocument> = serde_json::from_str(json)?;

        let steps = documents
            .into_iter()
            .map(|doc| {
                let inputs = doc
                    .input
                    .into_iter()
                    .map(|(slot, value)| Ok((slot, Binding::parse(value)?)))
                    .collect::<PlanResult<BTreeMap<_, _>>>()?;
                Ok(PlanStep {
                    tool: doc.tool,
                    inputs,
                    output_key: doc.output_key,
                })
            })
            .collect::<PlanResult<Vec<_>>>()?;

        Ok(Self { steps })
    }

    /// Check every step against the registry without running anything.
    pub fn validate(&self, registry: &ToolRegistry) -> PlanResult<()> {
        let mut produced: HashSet<&str> = HashSet::new();

        for (index, step) in self.steps.iter().enumerate() {
            let tool = registry
                .get(&step.tool)
                .ok_or_else(|| PlanError::UnknownTool(step.tool.clone()))?;
            let declared = tool.inputs();

            if let Some(slot) = declared.iter().find(|s| !step.inputs.contains_key(**s)) {
                return Err(PlanError::MissingInput {
                    step: index,
                    tool: step.tool.clone(),
                    slot: slot.to_string(),
                });
            }

            if let Some(slot) = step
                .inputs
                .keys()
                .find(|s| !declared.iter().any(|d| *d == s.as_str()))
            {
                return Err(PlanError::UndeclaredInput {
                    step: index,
                    tool: step.tool.clone(),
                    slot: slot.clone(),
                });
            }

            for binding in step.inputs.values() {
                if let Some(key) = binding.output_key() {
                    if !produced.contains(key) {
                        return Err(PlanError::UnresolvedOutput {
                            step: index,
                            key: key.to_string(),
                        });
                    }
                }
            }

            if !produced.insert(step.output_key.as_str()) {
                return Err(PlanError::DuplicateOutput {
                    key: step.output_key.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Validate then run every step in order.
///
/// Returns all outputs keyed by `output_key`. The first tool failure stops
/// the plan.
pub async fn execute_plan(
    plan: &Plan,
    registry: &ToolRegistry,
) -> PlanResult<HashMap<String, Value>> {
    plan.validate(registry)?;

    let mut outputs: HashMap<String, Value> = HashMap::new();

    for (index, step) in plan.steps.iter().enumerate() {
        let mut inputs = HashMap::with_capacity(step.inputs.len());
        for (slot, binding) in &step.inputs {
            let value = binding
                .resolve(&outputs)
                .ok_or_else(|| PlanError::UnresolvedOutput {
                    step: index,
                    key: binding.output_key().unwrap_or_default().to_string(),
                })?;
            inputs.insert(slot.clone(), value);
        }

        info!(step = index, tool = %step.tool, output = %step.output_key, "Running plan step");
        let value = registry.run_tool(&step.tool, &inputs).await?;
        outputs.insert(step.output_key.clone(), value);
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn inputs(&self) -> &[&str] {
            &["text"]
        }

        async fn run(&self, inputs: &HashMap<String, Value>) -> Result<Value, ToolError> {
            let text = inputs
                .get("text")
                .and_then(Value::as_str)
                .ok_or("text must be a string")?;
            Ok(json!(text.to_uppercase()))
        }
    }

    struct Concat;

    #[async_trait]
    impl Tool for Concat {
        fn name(&self) -> &str {
            "concat"
        }

        fn inputs(&self) -> &[&str] {
            &["left", "right"]
        }

        async fn run(&self, inputs: &HashMap<String, Value>) -> Result<Value, ToolError> {
            let left = inputs.get("left").and_then(Value::as_str).unwrap_or_default();
            let right = inputs.get("right").and_then(Value::as_str).unwrap_or_default();
            Ok(json!(format!("{left}{right}")))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Upper);
        registry.register(Concat);
        registry
    }

    #[tokio::test]
    async fn test_execute_chains_outputs() {
        let plan = Plan::from_json(
            r#"[
                {"tool": "upper", "input": {"text": "rust"}, "output_key": "shout"},
                {"tool": "concat", "input": {"left": "{{ shout }}", "right": " jobs"}, "output_key": "title"}
            ]"#,
        )
        .unwrap();

        let outputs = execute_plan(&plan, &registry()).await.unwrap();
        assert_eq!(outputs["shout"], json!("RUST"));
        assert_eq!(outputs["title"], json!("RUST jobs"));
    }

    #[test]
    fn test_expression_template_rejected_at_parse() {
        let err = Plan::from_json(
            r#"[{"tool": "upper", "input": {"text": "{{ __import__('os').getcwd() }}"}, "output_key": "x"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_validate_errors() {
        let registry = registry();

        let unknown = Plan::new(vec![PlanStep::new("search", "x")]);
        assert!(matches!(
            unknown.validate(&registry),
            Err(PlanError::UnknownTool(name)) if name == "search"
        ));

        let missing = Plan::new(vec![PlanStep::new("concat", "x").with_literal("left", json!("a"))]);
        assert!(matches!(
            missing.validate(&registry),
            Err(PlanError::MissingInput { slot, .. }) if slot == "right"
        ));

        let undeclared = Plan::new(vec![PlanStep::new("upper", "x")
            .with_literal("text", json!("a"))
            .with_literal("loud", json!(true))]);
        assert!(matches!(
            undeclared.validate(&registry),
            Err(PlanError::UndeclaredInput { slot, .. }) if slot == "loud"
        ));

        let forward = Plan::new(vec![
            PlanStep::new("upper", "a").with_output("text", "b"),
            PlanStep::new("upper", "b").with_literal("text", json!("x")),
        ]);
        assert!(matches!(
            forward.validate(&registry),
            Err(PlanError::UnresolvedOutput { step: 0, key }) if key == "b"
        ));

        let duplicate = Plan::new(vec![
            PlanStep::new("upper", "a").with_literal("text", json!("x")),
            PlanStep::new("upper", "a").with_literal("text", json!("y")),
        ]);
        assert!(matches!(
            duplicate.validate(&registry),
            Err(PlanError::DuplicateOutput { key }) if key == "a"
        ));
    }

    #[tokio::test]
    async fn test_invalid_plan_runs_nothing() {
        let registry = registry();
        let plan = Plan::new(vec![
            PlanStep::new("upper", "a").with_literal("text", json!("x")),
            PlanStep::new("upper", "b").with_output("text", "missing"),
        ]);

        assert!(execute_plan(&plan, &registry).await.is_err());
        assert_eq!(registry.stats("upper").successes, 0);
    }

    #[tokio::test]
    async fn test_tool_failure_stops_plan() {
        let registry = registry();
        let plan = Plan::new(vec![
            PlanStep::new("upper", "a").with_literal("text", json!(5)),
            PlanStep::new("concat", "b")
                .with_output("left", "a")
                .with_literal("right", json!("!")),
        ]);

        let err = execute_plan(&plan, &registry).await.unwrap_err();
        assert!(matches!(err, PlanError::ToolFailed { tool, .. } if tool == "upper"));
        assert_eq!(registry.stats("upper").failures, 1);
        assert_eq!(registry.stats("concat").last_used, None);
    }
}
