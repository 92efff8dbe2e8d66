//! Built-in synthetic objective
//!
//! Stands in for a real model integration when running locally: "training"
//! derives a deterministic signal from the knob configuration, so tuning
//! runs are reproducible without datasets or frameworks and better knob
//! values genuinely score higher.

use serde::{Deserialize, Serialize};

use tunefleet_core::{KnobSpace, KnobValue, Knobs, TunefleetError, TunefleetResult};
use tunefleet_coordinator::{Trainable, TrainableFactory};

/// Factory for the synthetic model
pub struct SyntheticObjective {
    space: KnobSpace,
}

impl SyntheticObjective {
    pub fn new(space: KnobSpace) -> Self {
        Self { space }
    }
}

impl TrainableFactory for SyntheticObjective {
    fn knob_space(&self) -> KnobSpace {
        self.space.clone()
    }

    fn build(&self, knobs: &Knobs) -> TunefleetResult<Box<dyn Trainable>> {
        Ok(Box::new(SyntheticModel {
            knobs: knobs.clone(),
            fitted: None,
        }))
    }
}

#[derive(Serialize, Deserialize)]
struct FittedParams {
    knobs: Knobs,
    signal: f64,
}

struct SyntheticModel {
    knobs: Knobs,
    /// Signal produced by training or loaded from prior parameters
    fitted: Option<f64>,
}

impl Trainable for SyntheticModel {
    fn train(
        &mut self,
        _dataset_uri: &str,
        _features: &[String],
        _target: Option<&str>,
    ) -> TunefleetResult<()> {
        self.fitted = Some(signal(&self.knobs));
        Ok(())
    }

    fn evaluate(&self, _dataset_uri: &str) -> TunefleetResult<f64> {
        match self.fitted {
            Some(signal) => Ok(squash(signal)),
            None => Err(TunefleetError::Training(
                "model must be trained before evaluation".to_string(),
            )),
        }
    }

    fn predict(&self, queries: &[serde_json::Value]) -> TunefleetResult<Vec<serde_json::Value>> {
        let score = match self.fitted {
            Some(signal) => squash(signal),
            None => {
                return Err(TunefleetError::Training(
                    "model must be trained before prediction".to_string(),
                ))
            }
        };
        Ok(queries
            .iter()
            .map(|query| serde_json::json!({ "query": query, "score": score }))
            .collect())
    }

    fn dump_parameters(&self) -> TunefleetResult<Vec<u8>> {
        let signal = self.fitted.ok_or_else(|| {
            TunefleetError::Training("nothing to dump before training".to_string())
        })?;
        let fitted = FittedParams {
            knobs: self.knobs.clone(),
            signal,
        };
        Ok(serde_json::to_vec(&fitted)?)
    }

    fn load_parameters(&mut self, blob: &[u8]) -> TunefleetResult<()> {
        let fitted: FittedParams = serde_json::from_slice(blob)?;
        self.fitted = Some(fitted.signal);
        Ok(())
    }
}

/// Mean per-knob signal of a configuration
fn signal(knobs: &Knobs) -> f64 {
    if knobs.is_empty() {
        return 0.0;
    }
    knobs.values().map(knob_signal).sum::<f64>() / knobs.len() as f64
}

fn knob_signal(value: &KnobValue) -> f64 {
    match value {
        KnobValue::Int(i) => *i as f64,
        KnobValue::Float(f) => *f,
        KnobValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        KnobValue::Str(s) => s.bytes().map(f64::from).sum::<f64>() / 255.0,
    }
}

/// Squash an unbounded signal into (0, 1)
fn squash(signal: f64) -> f64 {
    1.0 / (1.0 + (-signal).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knobs_with_c(c: i64) -> Knobs {
        let mut knobs = Knobs::new();
        knobs.insert("C".to_string(), KnobValue::Int(c));
        knobs
    }

    fn trained(knobs: Knobs) -> Box<dyn Trainable> {
        let factory = SyntheticObjective::new(KnobSpace::new().add_integer("C", 2, 3));
        let mut model = factory.build(&knobs).unwrap();
        model.train("mem://train", &[], None).unwrap();
        model
    }

    #[test]
    fn test_score_is_deterministic() {
        let a = trained(knobs_with_c(2)).evaluate("mem://val").unwrap();
        let b = trained(knobs_with_c(2)).evaluate("mem://val").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_better_knobs_score_higher() {
        let low = trained(knobs_with_c(2)).evaluate("mem://val").unwrap();
        let high = trained(knobs_with_c(3)).evaluate("mem://val").unwrap();
        assert!(high > low);
        assert!(low > 0.0 && high < 1.0);
    }

    #[test]
    fn test_params_round_trip() {
        let model = trained(knobs_with_c(3));
        let blob = model.dump_parameters().unwrap();

        let factory = SyntheticObjective::new(KnobSpace::new().add_integer("C", 2, 3));
        let mut restored = factory.build(&knobs_with_c(3)).unwrap();
        restored.load_parameters(&blob).unwrap();

        assert_eq!(
            model.evaluate("mem://val").unwrap(),
            restored.evaluate("mem://val").unwrap()
        );
    }

    #[test]
    fn test_evaluate_requires_training() {
        let factory = SyntheticObjective::new(KnobSpace::new().add_integer("C", 2, 3));
        let model = factory.build(&knobs_with_c(2)).unwrap();
        assert!(model.evaluate("mem://val").is_err());
    }

    #[test]
    fn test_predict_scores_each_query() {
        let model = trained(knobs_with_c(2));
        let queries = vec![
            serde_json::json!({"Glucose": 130}),
            serde_json::json!({"Glucose": 90}),
        ];
        let predictions = model.predict(&queries).unwrap();
        assert_eq!(predictions.len(), 2);
        assert!(predictions[0]["score"].is_f64());
    }
}
