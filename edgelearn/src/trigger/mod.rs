//! Rule-based trigger evaluation.
//!
//! A trigger decides whether the remote work of a phase should be dispatched
//! now. Rules are plain JSON carried in the job definition and are parsed on
//! every evaluation, so a definition update takes effect on the next tick.
//!
//! # Example
//!
//! ```
//! use edgelearn::trigger::{evaluate, Facts, NUM_OF_SAMPLES};
//! use serde_json::json;
//!
//! let rule = json!({"condition": {"operator": ">", "threshold": 10}});
//! let facts = Facts::new().with(NUM_OF_SAMPLES, 15usize);
//! assert!(evaluate(&rule, &facts).unwrap());
//! ```

mod facts;
mod rule;

pub use facts::{FactValue, Facts, DELTA_SUFFIX, NUM_OF_SAMPLES};
pub use rule::{Aggregate, Condition, Operator, TriggerRule};

use serde_json::Value;
use thiserror::Error;

/// Errors raised while building or evaluating a trigger rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriggerError {
    /// The rule config could not be parsed.
    #[error("Invalid trigger rule: {0}")]
    InvalidRule(String),

    /// The rule references a fact that was not supplied.
    #[error("Trigger rule references unknown fact '{0}'")]
    UnknownFact(String),
}

/// Parses `config` and evaluates it against `facts`.
pub fn evaluate(config: &Value, facts: &Facts) -> Result<bool, TriggerError> {
    TriggerRule::from_config(config)?.evaluate(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_evaluate_parses_and_evaluates() {
        let rule = json!({"condition": {"operator": ">", "threshold": 10}});

        assert!(!evaluate(&rule, &Facts::new().with(NUM_OF_SAMPLES, 5usize)).unwrap());
        assert!(evaluate(&rule, &Facts::new().with(NUM_OF_SAMPLES, 15usize)).unwrap());
    }

    #[test]
    fn test_evaluate_surfaces_invalid_rule() {
        let err = evaluate(&json!({"condition": 3}), &Facts::new()).unwrap_err();
        assert!(err.to_string().contains("Invalid trigger rule"));
    }
}
