//! CLI commands implementation

mod propose;
mod run;

pub use propose::propose;
pub use run::run;
