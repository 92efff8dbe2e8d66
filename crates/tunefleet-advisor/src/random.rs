//! RANDOM strategy: independent uniform sampling of the knob space

use rand::Rng;
use tunefleet_core::{Knob, KnobSpace, KnobValue, Knobs, Proposal, TunefleetResult};

use crate::advisor::Advisor;

/// Samples every knob independently and uniformly per trial
///
/// Integer knobs draw from the inclusive range and categorical knobs pick a
/// choice uniformly. Float knobs draw uniformly in value space; log-scaled
/// knobs draw in log space and exponentiate, so each decade of a
/// multiplicatively scaled range is equally likely.
#[derive(Debug)]
pub struct RandomAdvisor {
    space: KnobSpace,
}

impl RandomAdvisor {
    /// Create the advisor over a validated knob space.
    pub fn new(space: KnobSpace) -> TunefleetResult<Self> {
        space.validate()?;
        Ok(Self { space })
    }

    fn sample(&self) -> Knobs {
        let mut rng = rand::thread_rng();
        let mut knobs = Knobs::new();

        for (name, knob) in self.space.iter() {
            let value = match knob {
                Knob::Integer { min, max } => KnobValue::Int(rng.gen_range(*min..=*max)),
                Knob::Float {
                    min,
                    max,
                    log_scale,
                } => {
                    if *log_scale {
                        let log_val: f64 = rng.gen_range(min.ln()..=max.ln());
                        // clamp guards the exponentiation round-off at the ends
                        KnobValue::Float(log_val.exp().clamp(*min, *max))
                    } else {
                        KnobValue::Float(rng.gen_range(*min..=*max))
                    }
                }
                Knob::Categorical { choices } => {
                    let idx = rng.gen_range(0..choices.len());
                    choices[idx].clone()
                }
            };
            knobs.insert(name.clone(), value);
        }

        knobs
    }
}

impl Advisor for RandomAdvisor {
    /// Never fails for a validated space.
    fn propose(&mut self, trial_no: u64) -> TunefleetResult<Proposal> {
        Ok(Proposal::new(trial_no, self.sample()))
    }

    fn feedback(&mut self, _knobs: &Knobs, _score: f64) {}

    fn name(&self) -> &'static str {
        "RANDOM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunefleet_core::{ParamsType, TunefleetError};

    fn sample_space() -> KnobSpace {
        KnobSpace::new()
            .add_integer("C", 2, 8)
            .add_float("gamma", 0.5, 1.0)
            .add_log_float("tol", 1e-4, 1e-1)
            .add_categorical(
                "kernel",
                vec![
                    KnobValue::Str("poly".to_string()),
                    KnobValue::Str("rbf".to_string()),
                ],
            )
    }

    #[test]
    fn test_samples_respect_bounds() {
        let space = sample_space();
        let mut advisor = RandomAdvisor::new(space.clone()).unwrap();
        for trial_no in 0..100 {
            let proposal = advisor.propose(trial_no).unwrap();
            assert_eq!(proposal.knobs.len(), space.len());
            assert!(
                space.contains(&proposal.knobs),
                "out-of-bounds sample: {:?}",
                proposal.knobs
            );
        }
    }

    #[test]
    fn test_log_scale_is_log_uniform() {
        // Over 1e-4..1e-1 the log-space midpoint sits at ~3.16e-3; a
        // value-space-uniform sampler would land below it almost never,
        // a log-uniform one about half the time.
        let space = KnobSpace::new().add_log_float("tol", 1e-4, 1e-1);
        let mut advisor = RandomAdvisor::new(space).unwrap();
        let midpoint = (1e-4_f64.ln() + 1e-1_f64.ln()) / 2.0;

        let draws = 400;
        let mut below = 0;
        for trial_no in 0..draws {
            let proposal = advisor.propose(trial_no).unwrap();
            let tol = proposal.knobs["tol"].as_f64().unwrap();
            if tol.ln() < midpoint {
                below += 1;
            }
        }

        let fraction = below as f64 / draws as f64;
        assert!(
            (0.35..=0.65).contains(&fraction),
            "log-midpoint fraction {} outside tolerance",
            fraction
        );
    }

    #[test]
    fn test_proposal_flags() {
        let mut advisor = RandomAdvisor::new(sample_space()).unwrap();
        let proposal = advisor.propose(0).unwrap();
        assert_eq!(proposal.params_type, ParamsType::None);
        assert!(proposal.to_eval);
        assert!(proposal.to_save_params);
        assert!(!proposal.to_cache_params);
    }

    #[test]
    fn test_degenerate_ranges() {
        let space = KnobSpace::new()
            .add_integer("n", 3, 3)
            .add_float("x", 0.5, 0.5);
        let mut advisor = RandomAdvisor::new(space).unwrap();
        let proposal = advisor.propose(0).unwrap();
        assert_eq!(proposal.knobs["n"], KnobValue::Int(3));
        assert_eq!(proposal.knobs["x"], KnobValue::Float(0.5));
    }

    #[test]
    fn test_rejects_invalid_space() {
        let err = RandomAdvisor::new(KnobSpace::new()).unwrap_err();
        assert!(matches!(err, TunefleetError::Configuration(_)));

        let err = RandomAdvisor::new(KnobSpace::new().add_log_float("tol", 0.0, 1.0)).unwrap_err();
        assert!(matches!(err, TunefleetError::Configuration(_)));
    }
}
