//! FIXED strategy: cycle through a literal list of configurations

use tunefleet_core::{Knobs, Proposal, TunefleetError, TunefleetResult};

use crate::advisor::Advisor;

/// Proposes exactly the configurations it was given, in order, wrapping
/// around when trials outnumber configurations
///
/// Used for final-validation runs of known-good configurations, so its
/// proposals neither persist nor cache parameters.
#[derive(Debug)]
pub struct FixedAdvisor {
    configs: Vec<Knobs>,
}

impl FixedAdvisor {
    pub fn new(configs: Vec<Knobs>) -> TunefleetResult<Self> {
        if configs.is_empty() {
            return Err(TunefleetError::Configuration(
                "FIXED advisor needs at least one configuration".to_string(),
            ));
        }
        Ok(Self { configs })
    }
}

impl Advisor for FixedAdvisor {
    fn propose(&mut self, trial_no: u64) -> TunefleetResult<Proposal> {
        let idx = (trial_no % self.configs.len() as u64) as usize;
        let mut proposal = Proposal::new(trial_no, self.configs[idx].clone());
        proposal.to_save_params = false;
        proposal.to_cache_params = false;
        Ok(proposal)
    }

    fn feedback(&mut self, _knobs: &Knobs, _score: f64) {}

    fn name(&self) -> &'static str {
        "FIXED"
    }
}
