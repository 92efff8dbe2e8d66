//! Knob space declarations
//!
//! A trainable unit declares the hyperparameters it can be tuned over as a
//! map of named knobs. Each knob is one of three kinds:
//! - integer range (inclusive bounds)
//! - float range, optionally sampled in log space
//! - categorical choice set

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{TunefleetError, TunefleetResult};

/// A concrete value chosen for a knob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnobValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl KnobValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KnobValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KnobValue::Float(v) => Some(*v),
            KnobValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KnobValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KnobValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for KnobValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KnobValue::Int(v) => write!(f, "{}", v),
            KnobValue::Float(v) => write!(f, "{}", v),
            KnobValue::Str(v) => write!(f, "{}", v),
            KnobValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// A chosen configuration: knob name to value
pub type Knobs = BTreeMap<String, KnobValue>;

/// Declaration of a single tunable knob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Knob {
    /// Integer range, inclusive on both ends
    Integer { min: i64, max: i64 },
    /// Float range; with `log_scale` the value is drawn uniformly in log
    /// space and exponentiated, for multiplicatively scaled hyperparameters
    /// such as learning rates and tolerances
    Float {
        min: f64,
        max: f64,
        #[serde(default)]
        log_scale: bool,
    },
    /// Fixed choice set
    Categorical { choices: Vec<KnobValue> },
}

impl Knob {
    /// Check the declaration itself is well formed.
    pub fn validate(&self, name: &str) -> TunefleetResult<()> {
        match self {
            Knob::Integer { min, max } => {
                if min > max {
                    return Err(TunefleetError::Configuration(format!(
                        "knob '{}': integer min {} > max {}",
                        name, min, max
                    )));
                }
            }
            Knob::Float {
                min,
                max,
                log_scale,
            } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(TunefleetError::Configuration(format!(
                        "knob '{}': float bounds must be finite",
                        name
                    )));
                }
                if min > max {
                    return Err(TunefleetError::Configuration(format!(
                        "knob '{}': float min {} > max {}",
                        name, min, max
                    )));
                }
                if *log_scale && *min <= 0.0 {
                    return Err(TunefleetError::Configuration(format!(
                        "knob '{}': log-scale range requires min > 0, got {}",
                        name, min
                    )));
                }
            }
            Knob::Categorical { choices } => {
                if choices.is_empty() {
                    return Err(TunefleetError::Configuration(format!(
                        "knob '{}': categorical choice set is empty",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether `value` lies inside this knob's declared bounds / choice set.
    pub fn contains(&self, value: &KnobValue) -> bool {
        match self {
            Knob::Integer { min, max } => value
                .as_i64()
                .map(|v| v >= *min && v <= *max)
                .unwrap_or(false),
            Knob::Float { min, max, .. } => value
                .as_f64()
                .map(|v| v >= *min && v <= *max)
                .unwrap_or(false),
            Knob::Categorical { choices } => choices.contains(value),
        }
    }
}

/// The declared knob space of a trainable unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnobSpace {
    knobs: BTreeMap<String, Knob>,
}

impl KnobSpace {
    pub fn new() -> Self {
        Self {
            knobs: BTreeMap::new(),
        }
    }

    pub fn add_integer(mut self, name: impl Into<String>, min: i64, max: i64) -> Self {
        self.knobs.insert(name.into(), Knob::Integer { min, max });
        self
    }

    pub fn add_float(mut self, name: impl Into<String>, min: f64, max: f64) -> Self {
        self.knobs.insert(
            name.into(),
            Knob::Float {
                min,
                max,
                log_scale: false,
            },
        );
        self
    }

    pub fn add_log_float(mut self, name: impl Into<String>, min: f64, max: f64) -> Self {
        self.knobs.insert(
            name.into(),
            Knob::Float {
                min,
                max,
                log_scale: true,
            },
        );
        self
    }

    pub fn add_categorical(mut self, name: impl Into<String>, choices: Vec<KnobValue>) -> Self {
        self.knobs.insert(name.into(), Knob::Categorical { choices });
        self
    }

    pub fn get(&self, name: &str) -> Option<&Knob> {
        self.knobs.get(name)
    }

    /// Knobs in deterministic (name) order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Knob)> {
        self.knobs.iter()
    }

    pub fn len(&self) -> usize {
        self.knobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knobs.is_empty()
    }

    /// An empty or malformed space is a configuration error: advisors refuse
    /// to be built over it rather than failing later in propose.
    pub fn validate(&self) -> TunefleetResult<()> {
        if self.knobs.is_empty() {
            return Err(TunefleetError::Configuration(
                "knob space declares no knobs".to_string(),
            ));
        }
        for (name, knob) in &self.knobs {
            knob.validate(name)?;
        }
        Ok(())
    }

    /// Whether every entry of `knobs` is declared here and within bounds.
    pub fn contains(&self, knobs: &Knobs) -> bool {
        knobs.iter().all(|(name, value)| {
            self.knobs
                .get(name)
                .map(|knob| knob.contains(value))
                .unwrap_or(false)
        })
    }
}

impl FromIterator<(String, Knob)> for KnobSpace {
    fn from_iter<T: IntoIterator<Item = (String, Knob)>>(iter: T) -> Self {
        Self {
            knobs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_space() -> KnobSpace {
        KnobSpace::new()
            .add_integer("C", 2, 3)
            .add_log_float("tol", 1e-3, 1e-1)
            .add_categorical(
                "kernel",
                vec![
                    KnobValue::Str("poly".to_string()),
                    KnobValue::Str("rbf".to_string()),
                    KnobValue::Str("linear".to_string()),
                ],
            )
    }

    #[test]
    fn test_space_validates() {
        assert!(sample_space().validate().is_ok());
    }

    #[test]
    fn test_empty_space_rejected() {
        let err = KnobSpace::new().validate().unwrap_err();
        assert!(matches!(err, TunefleetError::Configuration(_)));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let space = KnobSpace::new().add_integer("C", 5, 2);
        assert!(space.validate().is_err());
    }

    #[test]
    fn test_log_scale_requires_positive_min() {
        let space = KnobSpace::new().add_log_float("tol", 0.0, 1.0);
        assert!(space.validate().is_err());
    }

    #[test]
    fn test_empty_choices_rejected() {
        let space = KnobSpace::new().add_categorical("kernel", vec![]);
        assert!(space.validate().is_err());
    }

    #[test]
    fn test_contains_bounds() {
        let space = sample_space();
        assert!(space.get("C").unwrap().contains(&KnobValue::Int(2)));
        assert!(!space.get("C").unwrap().contains(&KnobValue::Int(4)));
        assert!(space
            .get("kernel")
            .unwrap()
            .contains(&KnobValue::Str("rbf".to_string())));
        assert!(!space
            .get("kernel")
            .unwrap()
            .contains(&KnobValue::Str("sigmoid".to_string())));
    }

    #[test]
    fn test_knob_space_from_toml() {
        let toml_str = r#"
[C]
type = "integer"
min = 2
max = 3

[tol]
type = "float"
min = 1e-3
max = 1e-1
log_scale = true

[kernel]
type = "categorical"
choices = ["poly", "rbf", "linear"]
"#;
        let space: KnobSpace = toml::from_str(toml_str).unwrap();
        assert_eq!(space.len(), 3);
        assert_eq!(
            space.get("tol"),
            Some(&Knob::Float {
                min: 1e-3,
                max: 1e-1,
                log_scale: true
            })
        );
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_knob_value_untagged_parse() {
        let knobs: Knobs =
            serde_json::from_str(r#"{"C": 2, "tol": 0.01, "kernel": "rbf", "shrinking": true}"#)
                .unwrap();
        assert_eq!(knobs["C"], KnobValue::Int(2));
        assert_eq!(knobs["tol"], KnobValue::Float(0.01));
        assert_eq!(knobs["kernel"], KnobValue::Str("rbf".to_string()));
        assert_eq!(knobs["shrinking"], KnobValue::Bool(true));
    }
}
