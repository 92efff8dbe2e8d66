//! Model integration seam
//!
//! A `Trainable` is the unit a trial executes: built fresh from the trial's
//! knobs, optionally warm-started from prior parameters, trained, and scored.
//! All methods run on a blocking thread owned by the coordinator, so
//! implementations are free to do heavy synchronous work.

use tunefleet_core::{KnobSpace, Knobs, TunefleetResult};

/// A tunable model under training
pub trait Trainable: Send {
    /// Fit the model on the training dataset. `features` selects the input
    /// columns (empty means all but the target), `target` the label column.
    fn train(
        &mut self,
        dataset_uri: &str,
        features: &[String],
        target: Option<&str>,
    ) -> TunefleetResult<()>;

    /// Score the model on the validation dataset. Higher is better.
    fn evaluate(&self, dataset_uri: &str) -> TunefleetResult<f64>;

    /// Run inference for a batch of queries.
    fn predict(&self, queries: &[serde_json::Value]) -> TunefleetResult<Vec<serde_json::Value>>;

    /// Serialize the trained parameters into an opaque blob.
    fn dump_parameters(&self) -> TunefleetResult<Vec<u8>>;

    /// Restore parameters produced by an earlier `dump_parameters`.
    fn load_parameters(&mut self, blob: &[u8]) -> TunefleetResult<()>;
}

/// Builds one `Trainable` per trial for a model class
pub trait TrainableFactory: Send + Sync {
    /// The knob space trials are sampled from.
    fn knob_space(&self) -> KnobSpace;

    /// Construct a fresh model from one trial's knob configuration.
    fn build(&self, knobs: &Knobs) -> TunefleetResult<Box<dyn Trainable>>;
}
