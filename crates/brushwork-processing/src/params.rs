//! Hyperparameter values, tunable placeholders and their domains.
//!
//! Recipe steps and model specifications declare each of their parameters as
//! a [`Param`]: either a fixed value or a named placeholder that the tuner
//! fills in from a candidate [`Assignment`] before fitting. Placeholders carry
//! a [`Domain`] describing the values the search may draw.

use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A concrete parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value; text values have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }

    /// Integer view of the value. Floats are rounded.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.is_finite() => Some(v.round() as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => {
                if *v != 0.0 && (v.abs() < 1e-3 || v.abs() >= 1e4) {
                    write!(f, "{v:.3e}")
                } else {
                    write!(f, "{v:.4}")
                }
            }
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// A parameter slot: fixed, or a placeholder resolved per candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Param {
    Fixed(ParamValue),
    Tune(String),
}

impl Param {
    pub fn fixed(value: impl Into<ParamValue>) -> Self {
        Param::Fixed(value.into())
    }

    pub fn tune(id: impl Into<String>) -> Self {
        Param::Tune(id.into())
    }

    pub fn is_tunable(&self) -> bool {
        matches!(self, Param::Tune(_))
    }

    /// Resolve the slot against a candidate assignment.
    pub fn resolve(&self, assignment: &Assignment) -> Result<ParamValue> {
        match self {
            Param::Fixed(value) => Ok(value.clone()),
            Param::Tune(id) => assignment
                .get(id)
                .cloned()
                .ok_or_else(|| ProcessingError::UnresolvedParameter(id.clone())),
        }
    }

    /// Resolve and read as a float.
    pub fn resolve_f64(&self, name: &str, assignment: &Assignment) -> Result<f64> {
        let value = self.resolve(assignment)?;
        value.as_f64().ok_or_else(|| type_error(name, "number", &value))
    }

    /// Resolve and read as a non-negative integer.
    pub fn resolve_usize(&self, name: &str, assignment: &Assignment) -> Result<usize> {
        let value = self.resolve(assignment)?;
        match value.as_i64() {
            Some(v) if v >= 0 => Ok(v as usize),
            _ => Err(type_error(name, "non-negative integer", &value)),
        }
    }

    /// Resolve and read as text.
    pub fn resolve_text(&self, name: &str, assignment: &Assignment) -> Result<String> {
        let value = self.resolve(assignment)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| type_error(name, "text", &value))
    }
}

fn type_error(name: &str, expected: &str, actual: &ParamValue) -> ProcessingError {
    ProcessingError::ParameterType {
        name: name.to_string(),
        expected: expected.to_string(),
        actual: format!("{} ({})", actual, actual.kind()),
    }
}

/// One candidate's values for every tunable placeholder, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignment(BTreeMap<String, ParamValue>);

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, id: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(id.into(), value.into());
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, value: ParamValue) {
        self.0.insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<&ParamValue> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical string used to detect duplicate candidates.
    pub fn key(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| match v {
                ParamValue::Float(f) => format!("{k}={:016x}", f.to_bits()),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(no tunable parameters)");
        }
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&parts.join(", "))
    }
}

/// Transformation between the search scale and the parameter's natural scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Scale {
    #[default]
    Identity,
    /// Bounds are exponents of 10.
    Log10,
    /// Bounds are exponents of 2.
    Log2,
}

impl Scale {
    pub fn apply_inverse(&self, x: f64) -> f64 {
        match self {
            Scale::Identity => x,
            Scale::Log10 => 10f64.powf(x),
            Scale::Log2 => 2f64.powf(x),
        }
    }
}

/// Values a tunable parameter may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Domain {
    /// Inclusive integer range. An `upper` of `None` is unknown until the
    /// data is seen and must be finalized before sampling.
    Int { lower: i64, upper: Option<i64> },
    /// Continuous range on the given scale.
    Float { lower: f64, upper: f64, scale: Scale },
    Categorical(Vec<String>),
}

impl Domain {
    pub fn int(lower: i64, upper: i64) -> Self {
        Domain::Int {
            lower,
            upper: Some(upper),
        }
    }

    pub fn int_unknown_upper(lower: i64) -> Self {
        Domain::Int { lower, upper: None }
    }

    pub fn float(lower: f64, upper: f64) -> Self {
        Domain::Float {
            lower,
            upper,
            scale: Scale::Identity,
        }
    }

    pub fn log10(lower: f64, upper: f64) -> Self {
        Domain::Float {
            lower,
            upper,
            scale: Scale::Log10,
        }
    }

    pub fn log2(lower: f64, upper: f64) -> Self {
        Domain::Float {
            lower,
            upper,
            scale: Scale::Log2,
        }
    }

    pub fn categorical<S: AsRef<str>>(values: &[S]) -> Self {
        Domain::Categorical(values.iter().map(|v| v.as_ref().to_string()).collect())
    }

    /// `false` while an unknown bound remains.
    pub fn is_finalized(&self) -> bool {
        !matches!(self, Domain::Int { upper: None, .. })
    }

    /// `true` if no value can be drawn.
    pub fn is_empty(&self) -> bool {
        match self {
            Domain::Int {
                lower,
                upper: Some(upper),
            } => upper < lower,
            Domain::Int { upper: None, .. } => false,
            Domain::Float { lower, upper, .. } => !(upper >= lower),
            Domain::Categorical(values) => values.is_empty(),
        }
    }

    /// Map a unit-interval coordinate onto the domain.
    ///
    /// Returns `None` for unfinalized or empty domains.
    pub fn value_at(&self, u: f64) -> Option<ParamValue> {
        if self.is_empty() {
            return None;
        }
        let u = u.clamp(0.0, 1.0);
        match self {
            Domain::Int {
                lower,
                upper: Some(upper),
            } => {
                let width = (upper - lower + 1) as f64;
                let offset = ((u * width).floor() as i64).min(upper - lower);
                Some(ParamValue::Int(lower + offset))
            }
            Domain::Int { upper: None, .. } => None,
            Domain::Float {
                lower,
                upper,
                scale,
            } => Some(ParamValue::Float(
                scale.apply_inverse(lower + u * (upper - lower)),
            )),
            Domain::Categorical(values) => {
                let idx = ((u * values.len() as f64).floor() as usize).min(values.len() - 1);
                Some(ParamValue::Text(values[idx].clone()))
            }
        }
    }

    /// Does `value` lie inside the domain?
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Domain::Int { lower, upper }, ParamValue::Int(v)) => {
                v >= lower && upper.is_none_or(|u| *v <= u)
            }
            (
                Domain::Float {
                    lower,
                    upper,
                    scale,
                },
                ParamValue::Float(v),
            ) => {
                let lo = scale.apply_inverse(*lower);
                let hi = scale.apply_inverse(*upper);
                let tol = 1e-9 * hi.abs().max(1.0);
                *v >= lo - tol && *v <= hi + tol
            }
            (Domain::Categorical(values), ParamValue::Text(s)) => values.contains(s),
            _ => false,
        }
    }
}

/// A tunable placeholder together with the domain it is searched over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tunable {
    pub id: String,
    pub domain: Domain,
}

impl Tunable {
    pub fn new(id: impl Into<String>, domain: Domain) -> Self {
        Self {
            id: id.into(),
            domain,
        }
    }
}
