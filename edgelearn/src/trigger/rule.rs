//! Trigger rule parsing and evaluation.
//!
//! A rule config is a JSON object with a `condition`:
//!
//! ```json
//! { "condition": { "operator": ">", "threshold": 500, "metric": "num_of_samples" } }
//! ```
//!
//! `metric` defaults to `num_of_samples`. Conditions compose with
//! `{"all": [...]}` and `{"any": [...]}`. Against a series fact, a comparison
//! reduces the series first according to `aggregate`: `all` (default), `any`,
//! `mean`, `min`, `max` or `last`. An empty series never fires.

use serde_json::{Map, Value};
use std::fmt;

use super::facts::{FactValue, Facts, NUM_OF_SAMPLES};
use super::TriggerError;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Operator {
    fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Le),
            "=" | "==" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            _ => None,
        }
    }

    fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Ge => value >= threshold,
            Operator::Lt => value < threshold,
            Operator::Le => value <= threshold,
            Operator::Eq => value == threshold,
            Operator::Ne => value != threshold,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        };
        f.write_str(s)
    }
}

/// How a series fact is reduced before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    /// Every element must satisfy the comparison.
    #[default]
    All,
    /// At least one element must satisfy the comparison.
    Any,
    Mean,
    Min,
    Max,
    Last,
}

impl Aggregate {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Aggregate::All),
            "any" => Some(Aggregate::Any),
            "mean" => Some(Aggregate::Mean),
            "min" => Some(Aggregate::Min),
            "max" => Some(Aggregate::Max),
            "last" => Some(Aggregate::Last),
            _ => None,
        }
    }
}

/// A parsed condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        metric: String,
        operator: Operator,
        threshold: f64,
        aggregate: Aggregate,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    fn parse(value: &Value) -> Result<Self, TriggerError> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid(format!("condition must be an object, got {}", value)))?;

        if let Some(children) = obj.get("all") {
            return Ok(Condition::All(Self::parse_children("all", children)?));
        }
        if let Some(children) = obj.get("any") {
            return Ok(Condition::Any(Self::parse_children("any", children)?));
        }

        Self::parse_compare(obj)
    }

    fn parse_children(key: &str, value: &Value) -> Result<Vec<Condition>, TriggerError> {
        let items = value
            .as_array()
            .ok_or_else(|| invalid(format!("'{}' must be a list of conditions", key)))?;
        if items.is_empty() {
            return Err(invalid(format!("'{}' must not be empty", key)));
        }
        items.iter().map(Condition::parse).collect()
    }

    fn parse_compare(obj: &Map<String, Value>) -> Result<Self, TriggerError> {
        let operator = match obj.get("operator") {
            Some(Value::String(s)) => {
                Operator::parse(s).ok_or_else(|| invalid(format!("unknown operator '{}'", s)))?
            }
            Some(other) => return Err(invalid(format!("operator must be a string, got {}", other))),
            None => return Err(invalid("condition has no operator")),
        };

        let threshold = match obj.get("threshold") {
            Some(v) => v
                .as_f64()
                .ok_or_else(|| invalid(format!("threshold must be a number, got {}", v)))?,
            None => return Err(invalid("condition has no threshold")),
        };

        let metric = match obj.get("metric") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::String(_)) | None => NUM_OF_SAMPLES.to_string(),
            Some(other) => return Err(invalid(format!("metric must be a string, got {}", other))),
        };

        let aggregate = match obj.get("aggregate") {
            Some(Value::String(s)) => {
                Aggregate::parse(s).ok_or_else(|| invalid(format!("unknown aggregate '{}'", s)))?
            }
            Some(other) => {
                return Err(invalid(format!("aggregate must be a string, got {}", other)))
            }
            None => Aggregate::default(),
        };

        Ok(Condition::Compare {
            metric,
            operator,
            threshold,
            aggregate,
        })
    }

    fn evaluate(&self, facts: &Facts) -> Result<bool, TriggerError> {
        match self {
            Condition::Compare {
                metric,
                operator,
                threshold,
                aggregate,
            } => {
                let fact = facts
                    .get(metric)
                    .ok_or_else(|| TriggerError::UnknownFact(metric.clone()))?;
                Ok(compare(fact, *operator, *threshold, *aggregate))
            }
            // Evaluate every child so an unknown fact is reported even when
            // an earlier child already decided the outcome.
            Condition::All(children) => {
                let mut fired = true;
                for child in children {
                    fired &= child.evaluate(facts)?;
                }
                Ok(fired)
            }
            Condition::Any(children) => {
                let mut fired = false;
                for child in children {
                    fired |= child.evaluate(facts)?;
                }
                Ok(fired)
            }
        }
    }
}

fn compare(fact: &FactValue, operator: Operator, threshold: f64, aggregate: Aggregate) -> bool {
    let series = match fact {
        FactValue::Count(n) => return operator.compare(*n as f64, threshold),
        FactValue::Series(series) => series,
    };

    if series.is_empty() {
        return false;
    }

    let reduced = match aggregate {
        Aggregate::All => return series.iter().all(|v| operator.compare(*v, threshold)),
        Aggregate::Any => return series.iter().any(|v| operator.compare(*v, threshold)),
        Aggregate::Mean => series.iter().sum::<f64>() / series.len() as f64,
        Aggregate::Min => series.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregate::Max => series.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Aggregate::Last => series[series.len() - 1],
    };
    operator.compare(reduced, threshold)
}

fn invalid(reason: impl Into<String>) -> TriggerError {
    TriggerError::InvalidRule(reason.into())
}

/// A validated trigger rule.
///
/// Construction validates the whole condition tree; evaluation is pure.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRule {
    condition: Condition,
}

impl TriggerRule {
    /// Parses a rule from its JSON config.
    ///
    /// # Errors
    ///
    /// [`TriggerError::InvalidRule`] if the config is not an object, has no
    /// `condition`, asks for a time-based trigger, or the condition tree is
    /// malformed.
    pub fn from_config(config: &Value) -> Result<Self, TriggerError> {
        let obj = config
            .as_object()
            .ok_or_else(|| invalid(format!("rule must be an object, got {}", config)))?;

        if obj.contains_key("timer") {
            return Err(invalid("time-based triggers are not supported"));
        }

        let condition = obj
            .get("condition")
            .ok_or_else(|| invalid("rule has no condition"))?;

        Ok(Self {
            condition: Condition::parse(condition)?,
        })
    }

    /// Returns the parsed condition tree.
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Decides whether the rule fires for the given facts.
    ///
    /// # Errors
    ///
    /// [`TriggerError::UnknownFact`] if the rule references a fact that is
    /// not present.
    pub fn evaluate(&self, facts: &Facts) -> Result<bool, TriggerError> {
        self.condition.evaluate(facts)
    }
}
