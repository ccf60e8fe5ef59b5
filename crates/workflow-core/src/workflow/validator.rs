//! Transition validation

use crate::error::{Result, WorkflowError};
use workflow_types::{TransitionDefinition, WorkflowConfig};
use super::approval_types::Entity;

/// Check a requested move against the config and the entity's current state.
///
/// The transition must be declared for the exact `(from, to)` pair, and the
/// entity must currently sit in `from_state`. Nothing is written either way.
pub fn validate_transition<'a>(
    config: &'a WorkflowConfig,
    from_state: &str,
    to_state: &str,
    entity: &Entity,
) -> Result<&'a TransitionDefinition> {
    let transition = config
        .find_transition(from_state, to_state)
        .ok_or_else(|| WorkflowError::InvalidTransition {
            from_state: from_state.to_string(),
            to_state: to_state.to_string(),
        })?;

    let current = entity.current_state(config);
    if current != Some(transition.from_state.as_str()) {
        return Err(WorkflowError::StateMismatch {
            expected: transition.from_state.clone(),
            actual: current.unwrap_or("<unset>").to_string(),
        });
    }

    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::approval_types::{EntityId, OrganizationId};
    use workflow_types::StateDefinition;

    fn config() -> WorkflowConfig {
        WorkflowConfig {
            states: vec![
                StateDefinition::new("DRAFT", "Draft").initial(),
                StateDefinition::new("SUBMITTED", "Submitted"),
                StateDefinition::new("APPROVED", "Approved"),
            ],
            transitions: vec![
                TransitionDefinition::new("DRAFT", "SUBMITTED"),
                TransitionDefinition::new("SUBMITTED", "APPROVED"),
            ],
            ..Default::default()
        }
    }

    fn entity(state: Option<&str>) -> Entity {
        let entity = Entity::new(EntityId::new("E1"), OrganizationId::new("org"), "INVOICE", "Invoice");
        match state {
            Some(s) => entity.with_state(s),
            None => entity,
        }
    }

    #[test]
    fn test_declared_transition_from_current_state() {
        let config = config();
        let transition = validate_transition(&config, "DRAFT", "SUBMITTED", &entity(Some("DRAFT"))).unwrap();
        assert_eq!(transition.to_state, "SUBMITTED");
    }

    #[test]
    fn test_undeclared_pairs_are_invalid() {
        let config = config();
        let states = ["DRAFT", "SUBMITTED", "APPROVED"];
        for from in states {
            for to in states {
                if config.find_transition(from, to).is_some() {
                    continue;
                }
                let err = validate_transition(&config, from, to, &entity(Some(from))).unwrap_err();
                assert!(matches!(err, WorkflowError::InvalidTransition { .. }), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_state_mismatch_is_rejected() {
        let config = config();
        let err = validate_transition(&config, "DRAFT", "SUBMITTED", &entity(Some("APPROVED"))).unwrap_err();
        match err {
            WorkflowError::StateMismatch { expected, actual } => {
                assert_eq!(expected, "DRAFT");
                assert_eq!(actual, "APPROVED");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unset_state_uses_initial_state() {
        let config = config();
        assert!(validate_transition(&config, "DRAFT", "SUBMITTED", &entity(None)).is_ok());
        assert!(validate_transition(&config, "SUBMITTED", "APPROVED", &entity(None)).is_err());
    }
}
