//! `tunefleet propose`: dry-run a job's advisor

use anyhow::Context;
use std::path::Path;

use tunefleet_advisor::create_advisor;
use tunefleet_core::JobConfig;

/// Print `count` proposals as JSON lines, without touching cluster or
/// storage.
pub fn propose(job_path: &Path, count: u64) -> anyhow::Result<()> {
    let job_config = JobConfig::from_file(job_path)
        .with_context(|| format!("loading job file {}", job_path.display()))?;
    let spec = job_config.to_spec()?;

    let mut advisor = create_advisor(spec.advisor, &job_config.knobs, &job_config.fixed_configs)?;

    for trial_no in 0..count {
        let proposal = advisor.propose(trial_no)?;
        println!("{}", serde_json::to_string(&proposal)?);
    }

    Ok(())
}
