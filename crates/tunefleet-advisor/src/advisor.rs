//! Advisor trait and strategy factory

use tunefleet_core::{AdvisorType, KnobSpace, Knobs, Proposal, TunefleetError, TunefleetResult};

use crate::fixed::FixedAdvisor;
use crate::random::RandomAdvisor;

/// A search strategy driving one tuning job
///
/// Calls are serialized by the owning coordinator, so implementations need
/// no interior locking. `feedback` may carry knobs the strategy never
/// proposed (independent observations); non-adaptive strategies ignore it.
pub trait Advisor: Send + std::fmt::Debug {
    /// Produce the proposal for trial `trial_no`.
    fn propose(&mut self, trial_no: u64) -> TunefleetResult<Proposal>;

    /// Report an observed score for a knob configuration.
    fn feedback(&mut self, knobs: &Knobs, score: f64);

    /// Strategy name for logs
    fn name(&self) -> &'static str;
}

/// Build the advisor for `kind`.
///
/// Declared-but-unavailable strategies fail here, at job submission, rather
/// than at the first proposal.
pub fn create_advisor(
    kind: AdvisorType,
    space: &KnobSpace,
    fixed_configs: &[Knobs],
) -> TunefleetResult<Box<dyn Advisor>> {
    match kind {
        AdvisorType::Fixed => Ok(Box::new(FixedAdvisor::new(fixed_configs.to_vec())?)),
        AdvisorType::Random => Ok(Box::new(RandomAdvisor::new(space.clone())?)),
        other => Err(TunefleetError::Configuration(format!(
            "advisor strategy {} is not available in this build",
            other
        ))),
    }
}
