//! Step input bindings.
//!
//! A step input is either a literal JSON value or a reference to an earlier
//! step's output key. References are written `{{ key }}` where `key` is a
//! plain identifier. Nothing else is accepted between the braces.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{PlanError, PlanResult};

lazy_static! {
    static ref OUTPUT_REF_REGEX: Regex =
        Regex::new(r"^\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}$").unwrap();
}

fn has_template_marker(text: &str) -> bool {
    text.contains("{{") || text.contains("}}")
}

/// First string inside an array or object that carries a template marker.
fn nested_template(value: &Value) -> Option<&str> {
    match value {
        Value::String(text) if has_template_marker(text) => Some(text),
        Value::Array(items) => items.iter().find_map(nested_template),
        Value::Object(map) => map.values().find_map(nested_template),
        _ => None,
    }
}

/// Value source for one tool input slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Passed to the tool as-is
    Literal(Value),

    /// Output of an earlier step, looked up by key
    Output(String),
}

impl Binding {
    /// Parse a planner-supplied input value.
    ///
    /// A string holding `{{` or `}}` anywhere must be exactly `{{ key }}`.
    /// Template markers inside array or object literals are rejected.
    pub fn parse(value: Value) -> PlanResult<Self> {
        let Value::String(text) = &value else {
            if let Some(template) = nested_template(&value) {
                return Err(PlanError::InvalidTemplate {
                    template: template.to_string(),
                    reason: "references must be a whole input value".into(),
                });
            }
            return Ok(Self::Literal(value));
        };

        if !has_template_marker(text) {
            return Ok(Self::Literal(value));
        }

        let trimmed = text.trim();
        OUTPUT_REF_REGEX
            .captures(trimmed)
            .and_then(|cap| cap.get(1))
            .map(|key| Self::Output(key.as_str().to_string()))
            .ok_or_else(|| PlanError::InvalidTemplate {
                template: text.clone(),
                reason: "expected {{ output_key }} with an identifier key".into(),
            })
    }

    /// Output key this binding depends on, if any.
    pub fn output_key(&self) -> Option<&str> {
        match self {
            Self::Output(key) => Some(key),
            Self::Literal(_) => None,
        }
    }

    /// Resolve against the outputs produced so far.
    pub fn resolve(&self, outputs: &HashMap<String, Value>) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Output(key) => outputs.get(key).cloned(),
        }
    }
}
