//! Trial coordination
//!
//! `TrialCoordinator` drives one tuning job end to end: provision worker
//! services through the scheduler, pull proposals from the advisor, execute
//! trials against the trainable, route produced parameters through the
//! store/cache/registry, and finalize the job record.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tunefleet_advisor::Advisor;
use tunefleet_core::{
    ContainerService, JobRecord, JobSpec, Knobs, ParamsType, Proposal, ServiceSpec,
    TrainJobStatus, TrialRecord, TrialStatus, TunefleetError, TunefleetResult,
};
use tunefleet_scheduler::ClusterScheduler;
use tunefleet_store::{ParamCache, ParamStore};

use crate::jobs::JobRecordStore;
use crate::registry::{ParamsEntry, ParamsRegistry};
use crate::trainable::TrainableFactory;

/// Consecutive infrastructure failures that abort a job
const MAX_INFRA_FAILURES: u32 = 3;

/// Shared infrastructure a job runs against
#[derive(Clone)]
pub struct JobContext {
    pub scheduler: Arc<ClusterScheduler>,
    pub store: Arc<dyn ParamStore>,
    pub cache: Arc<ParamCache>,
    pub registry: Arc<ParamsRegistry>,
    pub jobs: Arc<dyn JobRecordStore>,
    /// Image the worker services run
    pub worker_image: String,
    /// Attempts per worker when the cluster backend is unavailable
    pub provision_retries: u32,
    /// Initial backoff between provisioning attempts, doubled each retry
    pub provision_backoff_ms: u64,
}

/// Summary of a finished job
#[derive(Debug)]
pub struct JobOutcome {
    /// Final lifecycle state
    pub status: TrainJobStatus,
    /// Best evaluated knob configuration and its score
    pub best: Option<(Knobs, f64)>,
    /// All executed trials in trial number order
    pub trials: Vec<TrialRecord>,
}

struct AdvisorState {
    advisor: Box<dyn Advisor>,
    next_trial_no: u64,
}

struct TrialExecution {
    score: Option<f64>,
    params: Option<Vec<u8>>,
}

/// Runs one tuning job
///
/// The advisor sits behind a job-scoped mutex: trial numbers are allocated
/// in the same critical section as `propose`, so they are strictly
/// increasing even with several workers pulling trials concurrently.
pub struct TrialCoordinator {
    spec: JobSpec,
    advisor: Mutex<AdvisorState>,
    factory: Arc<dyn TrainableFactory>,
    ctx: JobContext,
    /// Trials recorded as they finish
    trials: Mutex<Vec<TrialRecord>>,
    /// External stop request
    stop: AtomicBool,
    /// Abort latch set by the failure policy
    abort: AtomicBool,
    /// Consecutive infrastructure failures
    infra_failures: AtomicU32,
}

impl TrialCoordinator {
    /// Create a coordinator for one job. [`run`] drives it to completion.
    ///
    /// [`run`]: TrialCoordinator::run
    pub fn new(
        spec: JobSpec,
        advisor: Box<dyn Advisor>,
        factory: Arc<dyn TrainableFactory>,
        ctx: JobContext,
    ) -> Self {
        Self {
            spec,
            advisor: Mutex::new(AdvisorState {
                advisor,
                next_trial_no: 0,
            }),
            factory,
            ctx,
            trials: Mutex::new(Vec::new()),
            stop: AtomicBool::new(false),
            abort: AtomicBool::new(false),
            infra_failures: AtomicU32::new(0),
        }
    }

    /// Request the job stop after in-flight trials finish.
    pub fn stop(&self) {
        info!(job_id = %self.spec.id, "Stop requested");
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Drive the job to a terminal state and return its summary.
    pub async fn run(&self) -> TunefleetResult<JobOutcome> {
        self.spec.validate()?;

        let mut record = JobRecord::new(self.spec.id.clone(), self.spec.app_name.clone());
        self.ctx.jobs.put(record.clone()).await?;
        info!(
            job_id = %self.spec.id,
            app_name = %self.spec.app_name,
            advisor = %self.spec.advisor,
            max_trials = self.spec.budget.max_trials,
            workers = self.spec.worker_count,
            "Job started"
        );

        let workers = match self.provision_workers().await {
            Ok(workers) => workers,
            Err(e) => {
                error!(job_id = %self.spec.id, error = %e, "Worker provisioning failed");
                record.transition(TrainJobStatus::Errored)?;
                self.ctx.jobs.put(record).await?;
                return Err(e);
            }
        };

        record.transition(TrainJobStatus::Running)?;
        self.ctx.jobs.put(record.clone()).await?;
        info!(job_id = %self.spec.id, workers = workers.len(), "Job running");

        join_all(workers.iter().map(|worker| self.worker_loop(worker))).await;

        self.teardown(&workers).await;

        let status = if self.abort.load(Ordering::SeqCst) {
            TrainJobStatus::Errored
        } else if self.stop.load(Ordering::SeqCst) {
            TrainJobStatus::Stopped
        } else {
            TrainJobStatus::Completed
        };
        record.transition(status)?;
        self.ctx.jobs.put(record).await?;

        let mut trials = self.trials.lock().await.clone();
        trials.sort_by_key(|t| t.trial_no);
        let best = trials
            .iter()
            .filter_map(|t| t.score.map(|score| (t.knobs.clone(), score)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        info!(
            job_id = %self.spec.id,
            status = %status,
            trials = trials.len(),
            best_score = ?best.as_ref().map(|(_, score)| *score),
            "Job finished"
        );

        Ok(JobOutcome {
            status,
            best,
            trials,
        })
    }

    /// Provision the configured number of worker services. Partial
    /// provisioning degrades the job; zero workers fails it.
    async fn provision_workers(&self) -> TunefleetResult<Vec<ContainerService>> {
        let mut services = Vec::new();
        for index in 0..self.spec.worker_count {
            let name = format!("trainer-{}-{}", self.spec.id, index);
            let mut service_spec = ServiceSpec::new(name, self.ctx.worker_image.clone());
            if self.spec.gpu_required {
                service_spec = service_spec.with_gpu();
            }
            match self.launch_with_retry(&service_spec).await {
                Ok(service) => services.push(service),
                Err(e) => {
                    warn!(
                        job_id = %self.spec.id,
                        worker = index,
                        error = %e,
                        "Could not provision worker"
                    );
                }
            }
        }

        if services.is_empty() {
            return Err(TunefleetError::NoCapacity(format!(
                "no workers could be provisioned for job {}",
                self.spec.id
            )));
        }
        Ok(services)
    }

    /// Launch one service, retrying with doubling backoff while the cluster
    /// backend is unavailable. Placement errors are not retried.
    async fn launch_with_retry(&self, spec: &ServiceSpec) -> TunefleetResult<ContainerService> {
        let mut backoff = Duration::from_millis(self.ctx.provision_backoff_ms);
        let mut attempt = 0;
        loop {
            match self.ctx.scheduler.create_service(spec).await {
                Ok(service) => return Ok(service),
                Err(TunefleetError::BackendUnavailable(reason))
                    if attempt + 1 < self.ctx.provision_retries =>
                {
                    attempt += 1;
                    debug!(
                        service_name = %spec.name,
                        attempt = attempt,
                        reason = %reason,
                        "Retrying worker launch"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One worker's trial loop: claim the next trial number under the
    /// advisor lock, execute, repeat until the budget is spent or the job
    /// is stopping.
    async fn worker_loop(&self, worker: &ContainerService) {
        loop {
            if self.stop.load(Ordering::SeqCst) || self.abort.load(Ordering::SeqCst) {
                return;
            }

            let proposal = {
                let mut state = self.advisor.lock().await;
                if state.next_trial_no >= self.spec.budget.max_trials {
                    return;
                }
                let trial_no = state.next_trial_no;
                state.next_trial_no += 1;
                match state.advisor.propose(trial_no) {
                    Ok(proposal) => proposal,
                    Err(e) => {
                        error!(
                            job_id = %self.spec.id,
                            trial_no = trial_no,
                            error = %e,
                            "Advisor failed to propose, aborting job"
                        );
                        self.abort.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            };

            self.execute_trial(worker, proposal).await;
        }
    }

    /// Execute one proposal, apply the failure policy, and report feedback.
    async fn execute_trial(&self, worker: &ContainerService, mut proposal: Proposal) {
        let trial_id = Uuid::new_v4().to_string();
        proposal.trial_id = Some(trial_id.clone());
        let mut record = TrialRecord::new(trial_id, proposal.trial_no, proposal.knobs.clone());

        info!(
            job_id = %self.spec.id,
            trial_id = %record.trial_id,
            trial_no = proposal.trial_no,
            worker = %worker.info.service_name,
            params_type = %proposal.params_type,
            "Trial proposed"
        );

        match self.run_trial(&proposal, &mut record).await {
            Ok(()) => {
                self.infra_failures.store(0, Ordering::SeqCst);
                info!(
                    job_id = %self.spec.id,
                    trial_id = %record.trial_id,
                    score = ?record.score,
                    "Trial scored"
                );
                if let Some(score) = record.score.filter(|_| proposal.to_eval) {
                    let mut state = self.advisor.lock().await;
                    state.advisor.feedback(&record.knobs, score);
                }
            }
            Err(e) => {
                if record.transition(TrialStatus::Errored).is_err() {
                    debug!(trial_id = %record.trial_id, "Trial record already terminal");
                }
                warn!(
                    job_id = %self.spec.id,
                    trial_id = %record.trial_id,
                    error = %e,
                    "Trial errored"
                );
                if e.is_infrastructure() {
                    let failures = self.infra_failures.fetch_add(1, Ordering::SeqCst) + 1;
                    if failures >= MAX_INFRA_FAILURES {
                        error!(
                            job_id = %self.spec.id,
                            failures = failures,
                            "Aborting job after consecutive infrastructure failures"
                        );
                        self.abort.store(true, Ordering::SeqCst);
                    }
                } else {
                    // a model-code failure proves the infrastructure worked,
                    // so it breaks the consecutive streak
                    self.infra_failures.store(0, Ordering::SeqCst);
                }
            }
        }

        self.trials.lock().await.push(record);
    }

    /// Run one trial through its state machine: resolve prior parameters,
    /// train and evaluate on a blocking thread under the trial time limit,
    /// then persist what the proposal asked for.
    async fn run_trial(
        &self,
        proposal: &Proposal,
        record: &mut TrialRecord,
    ) -> TunefleetResult<()> {
        record.transition(TrialStatus::Running)?;

        let prior = self.resolve_params(proposal).await?;

        let factory = self.factory.clone();
        let knobs = proposal.knobs.clone();
        let train_uri = self.spec.train_dataset_uri.clone();
        let val_uri = self.spec.val_dataset_uri.clone();
        let features = self.spec.features.clone();
        let target = self.spec.target.clone();
        let to_eval = proposal.to_eval;
        let want_params = proposal.to_save_params || proposal.to_cache_params;

        let task = tokio::task::spawn_blocking(move || -> TunefleetResult<TrialExecution> {
            let mut model = factory.build(&knobs)?;
            if let Some(blob) = prior {
                model.load_parameters(&blob)?;
            }
            model.train(&train_uri, &features, target.as_deref())?;
            let score = if to_eval {
                Some(model.evaluate(&val_uri)?)
            } else {
                None
            };
            let params = if want_params {
                Some(model.dump_parameters()?)
            } else {
                None
            };
            Ok(TrialExecution { score, params })
        });

        let joined = if self.spec.trial_timeout_secs == 0 {
            task.await
        } else {
            let limit = Duration::from_secs(self.spec.trial_timeout_secs);
            match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                // The blocking thread keeps running; its handle is abandoned.
                Err(_) => {
                    return Err(TunefleetError::Training(format!(
                        "trial exceeded its {}s time limit",
                        self.spec.trial_timeout_secs
                    )))
                }
            }
        };
        let execution = joined
            .map_err(|e| TunefleetError::Training(format!("trial task panicked: {}", e)))??;

        if let Some(blob) = execution.params {
            record.params_id = Some(self.persist_params(proposal, execution.score, blob).await?);
        }
        record.score = execution.score;
        record.transition(TrialStatus::Scored)?;
        Ok(())
    }

    /// Resolve the proposal's prior-parameters reference into a blob.
    /// Nothing recorded yet is the normal cold start and trains from
    /// scratch; a referenced blob that cannot be loaded degrades to scratch
    /// only when the job allows params fallback.
    async fn resolve_params(&self, proposal: &Proposal) -> TunefleetResult<Option<Vec<u8>>> {
        if proposal.params_type == ParamsType::None {
            return Ok(None);
        }

        let resolved = self
            .ctx
            .registry
            .resolve(proposal.params_type, &self.spec.id, &self.spec.model_class)
            .await;
        let params_id = match resolved {
            Some(id) => id,
            None => {
                debug!(
                    job_id = %self.spec.id,
                    params_type = %proposal.params_type,
                    "No prior parameters recorded, training from scratch"
                );
                return Ok(None);
            }
        };

        if let Some(blob) = self.ctx.cache.get(&params_id).await {
            debug!(params_id = %params_id, "Prior parameters served from cache");
            return Ok(Some(blob));
        }

        match self.ctx.store.load(&params_id).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if self.spec.params_fallback => {
                warn!(
                    params_id = %params_id,
                    error = %e,
                    "Prior parameters unavailable, training from scratch"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Store and/or cache a trial's dumped parameters and register them for
    /// later resolution. Returns the id the blob is known by.
    async fn persist_params(
        &self,
        proposal: &Proposal,
        score: Option<f64>,
        blob: Vec<u8>,
    ) -> TunefleetResult<String> {
        let params_id = if proposal.to_save_params {
            self.ctx.store.save(&blob).await?
        } else {
            // cache-only parameters still need an id to be referenced by
            format!("cached-{}", Uuid::new_v4())
        };

        if proposal.to_cache_params {
            self.ctx.cache.put(&params_id, blob).await;
        }

        self.ctx
            .registry
            .record(ParamsEntry {
                job_id: self.spec.id.clone(),
                model_class: self.spec.model_class.clone(),
                trial_no: proposal.trial_no,
                score,
                params_id: params_id.clone(),
                persisted: proposal.to_save_params,
            })
            .await;

        Ok(params_id)
    }

    /// Best-effort teardown of the provisioned workers.
    async fn teardown(&self, workers: &[ContainerService]) {
        for worker in workers {
            if let Err(e) = self.ctx.scheduler.destroy_service(worker).await {
                warn!(
                    job_id = %self.spec.id,
                    service_id = %worker.id,
                    error = %e,
                    "Failed to tear down worker"
                );
            }
        }
    }
}
