//! Workflow configuration validation
//!
//! Collects every problem instead of stopping at the first, so a caller can
//! fix a config in one round trip.

use serde_json::Value;
use std::collections::HashSet;
use workflow_types::WorkflowConfig;

use crate::error::{Result, WorkflowError};

/// Decode a workflow config received as raw JSON. Structural checks
/// happen when the config is stored.
pub fn parse_workflow_config(value: Value) -> Result<WorkflowConfig> {
    serde_json::from_value(value)
        .map_err(|e| WorkflowError::InvalidConfig(vec![format!("Malformed workflow config: {}", e)]))
}

/// Validate a workflow configuration, returning all errors found
pub fn validate_workflow_config(config: &WorkflowConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.states.is_empty() {
        errors.push("Workflow must declare at least one state".to_string());
    }
    if config.transitions.is_empty() {
        errors.push("Workflow must declare at least one transition".to_string());
    }

    let mut codes = HashSet::new();
    for state in &config.states {
        if state.code.trim().is_empty() {
            errors.push("State codes must not be empty".to_string());
        } else if !codes.insert(state.code.as_str()) {
            errors.push(format!("Duplicate state code: {}", state.code));
        }
    }

    let initial_count = config.states.iter().filter(|s| s.is_initial).count();
    if initial_count > 1 {
        errors.push(format!("Workflow declares {} initial states, at most one is allowed", initial_count));
    }

    let mut pairs = HashSet::new();
    for transition in &config.transitions {
        for state in [&transition.from_state, &transition.to_state] {
            if !codes.contains(state.as_str()) {
                errors.push(format!(
                    "Transition {} -> {} references undeclared state {}",
                    transition.from_state, transition.to_state, state
                ));
            }
        }
        if !pairs.insert((transition.from_state.as_str(), transition.to_state.as_str())) {
            errors.push(format!(
                "Duplicate transition {} -> {}",
                transition.from_state, transition.to_state
            ));
        }
    }

    errors
}
