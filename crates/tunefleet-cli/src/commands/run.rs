//! `tunefleet run`: drive a tuning job on a local stand-in cluster

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use tunefleet_advisor::create_advisor;
use tunefleet_coordinator::{
    InMemoryJobStore, JobContext, ParamsRegistry, TrainableFactory, TrialCoordinator,
};
use tunefleet_core::{JobConfig, OrchestratorConfig};
use tunefleet_scheduler::{ClusterScheduler, InMemoryNodeDirectory, StubRuntime};
use tunefleet_store::{FileParamStore, ParamCache};

use crate::synthetic::SyntheticObjective;

/// Run the job described by `job_path` to completion and print its trials.
pub async fn run(
    job_path: &Path,
    config: &OrchestratorConfig,
    params_dir: Option<&str>,
) -> anyhow::Result<()> {
    let job_config = JobConfig::from_file(job_path)
        .with_context(|| format!("loading job file {}", job_path.display()))?;
    let spec = job_config.to_spec()?;

    // Cluster: the configured nodes, or a single local stand-in with one GPU
    let directory = if config.cluster.nodes.is_empty() {
        let directory = Arc::new(InMemoryNodeDirectory::new());
        directory.add_node("local", [0].into_iter().collect()).await;
        directory
    } else {
        Arc::new(InMemoryNodeDirectory::from_seeds(&config.cluster.nodes))
    };
    let runtime = Arc::new(StubRuntime::new());
    let scheduler = Arc::new(ClusterScheduler::new(
        directory,
        runtime,
        config.cluster.network_name(),
        config.cluster.claim_retries,
    ));

    let params_dir = params_dir
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| config.storage.params_dir.clone());
    info!(params_dir = %params_dir.display(), "Persisting parameters");
    let store = Arc::new(FileParamStore::new(params_dir, spec.model_class.clone()));

    let ctx = JobContext {
        scheduler,
        store,
        cache: Arc::new(ParamCache::new(config.storage.cache_capacity_bytes)),
        registry: Arc::new(ParamsRegistry::new()),
        jobs: Arc::new(InMemoryJobStore::new()),
        worker_image: config.coordinator.worker_image.clone(),
        provision_retries: config.coordinator.provision_retries,
        provision_backoff_ms: config.coordinator.provision_backoff_ms,
    };

    let factory = Arc::new(SyntheticObjective::new(job_config.knobs.clone()));
    let advisor = create_advisor(
        spec.advisor,
        &factory.knob_space(),
        &job_config.fixed_configs,
    )?;

    let coordinator = TrialCoordinator::new(spec.clone(), advisor, factory, ctx);
    let outcome = coordinator.run().await?;

    println!("{:<8} {:<10} {:<10} {}", "TRIAL", "STATUS", "SCORE", "KNOBS");
    println!("{}", "-".repeat(72));
    for trial in &outcome.trials {
        let score = trial
            .score
            .map(|s| format!("{:.4}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<10} {:<10} {}",
            trial.trial_no,
            trial.status,
            score,
            serde_json::to_string(&trial.knobs)?
        );
    }

    println!();
    println!("Job {} finished: {}", spec.id, outcome.status);
    match outcome.best {
        Some((knobs, score)) => {
            println!("Best score: {:.4}", score);
            println!("Best knobs: {}", serde_json::to_string(&knobs)?);
        }
        None => println!("No scored trials"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_fixed_job_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.toml");
        std::fs::write(
            &job_path,
            r#"
[job]
app_name = "diabetes-screen"
model_class = "SVCClf"
advisor = "FIXED"
max_trials = 2
train_dataset = "mem://train"
val_dataset = "mem://val"

[[fixed_configs]]
C = 2

[[fixed_configs]]
C = 3
"#,
        )
        .unwrap();

        let config = OrchestratorConfig::default();
        let params_dir = dir.path().join("params");
        run(&job_path, &config, params_dir.to_str()).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_random_job_persists_params() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.toml");
        std::fs::write(
            &job_path,
            r#"
[job]
app_name = "diabetes-screen"
model_class = "SVCClf"
advisor = "RANDOM"
max_trials = 2
train_dataset = "mem://train"
val_dataset = "mem://val"

[knobs.C]
type = "integer"
min = 2
max = 3

[knobs.tol]
type = "float"
min = 0.001
max = 0.1
log_scale = true
"#,
        )
        .unwrap();

        let config = OrchestratorConfig::default();
        let params_dir = dir.path().join("params");
        run(&job_path, &config, params_dir.to_str()).await.unwrap();

        // RANDOM persists every trial's parameters
        let saved = std::fs::read_dir(&params_dir).unwrap().count();
        assert_eq!(saved, 2);
    }
}
