//! Background scoring jobs
//!
//! `submit` returns as soon as the worker thread exists. The caller keeps a
//! `JobHandle` to wait for the summary; anyone holding the runner can poll a
//! job's status by id. Finished jobs are dropped from the registry when it
//! reaches `MAX_TRACKED_JOBS` entries, or on `prune_finished`.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use super::{PassSummary, ScoringPass};
use crate::logic::alert::AlertStore;
use crate::logic::error::{Result, SentinelError};
use crate::logic::features::FeatureVector;
use crate::logic::flow::FlowRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed { summary: PassSummary },
    Failed { error: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }
}

enum JobInput {
    Flows(Vec<FlowRecord>),
    Features(Vec<FeatureVector>),
}

type Registry = Arc<RwLock<HashMap<Uuid, JobStatus>>>;

/// Registry size above which finished jobs are pruned on the next submit
pub const MAX_TRACKED_JOBS: usize = 256;

fn panicked(id: Uuid) -> SentinelError {
    SentinelError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("scoring job {} panicked", id),
    ))
}

/// Caller's side of a submitted job
pub struct JobHandle {
    id: Uuid,
    registry: Registry,
    worker: JoinHandle<Result<PassSummary>>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current status; `None` once the finished job has been pruned
    pub fn status(&self) -> Option<JobStatus> {
        self.registry.read().get(&self.id).cloned()
    }

    /// Block until the pass finishes
    pub fn wait(self) -> Result<PassSummary> {
        // The worker catches its own panics; a join error means it died outside the pass
        self.worker.join().unwrap_or_else(|_| Err(panicked(self.id)))
    }
}

/// Launches scoring passes on worker threads against one shared store
#[derive(Clone)]
pub struct JobRunner {
    pass: ScoringPass,
    store: Arc<dyn AlertStore>,
    jobs: Registry,
}

impl JobRunner {
    pub fn new(pass: ScoringPass, store: Arc<dyn AlertStore>) -> Self {
        Self {
            pass,
            store,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Score flows in the background
    pub fn submit(&self, flows: Vec<FlowRecord>) -> Result<JobHandle> {
        self.spawn(JobInput::Flows(flows))
    }

    /// Score bare feature rows in the background
    pub fn submit_features(&self, vectors: Vec<FeatureVector>) -> Result<JobHandle> {
        self.spawn(JobInput::Features(vectors))
    }

    /// Status of any job submitted through this runner
    pub fn status(&self, id: Uuid) -> Option<JobStatus> {
        self.jobs.read().get(&id).cloned()
    }

    pub fn jobs(&self) -> Vec<(Uuid, JobStatus)> {
        self.jobs.read().iter().map(|(id, s)| (*id, s.clone())).collect()
    }

    /// Forget completed and failed jobs, returning how many were dropped
    pub fn prune_finished(&self) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, status| !status.is_finished());
        before - jobs.len()
    }

    fn spawn(&self, input: JobInput) -> Result<JobHandle> {
        if self.jobs.read().len() >= MAX_TRACKED_JOBS {
            let pruned = self.prune_finished();
            log::debug!("Pruned {} finished scoring jobs", pruned);
        }

        let id = Uuid::new_v4();
        self.jobs.write().insert(id, JobStatus::Queued);

        let pass = self.pass.clone();
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.jobs);

        let spawned = thread::Builder::new()
            .name(format!("scoring-{}", &id.simple().to_string()[..8]))
            .spawn(move || {
                registry.write().insert(id, JobStatus::Running);
                log::info!("Scoring job {} started", id);

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &input {
                    JobInput::Flows(flows) => pass.run_flows(flows, store.as_ref()),
                    JobInput::Features(vectors) => pass.run_features(vectors, store.as_ref()),
                }));
                let result = outcome.unwrap_or_else(|_| Err(panicked(id)));

                let status = match &result {
                    Ok(summary) => JobStatus::Completed { summary: summary.clone() },
                    Err(e) => {
                        log::error!("Scoring job {} failed: {}", id, e);
                        JobStatus::Failed { error: e.to_string() }
                    }
                };
                registry.write().insert(id, status);
                result
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                self.jobs.write().insert(id, JobStatus::Failed { error: e.to_string() });
                return Err(e.into());
            }
        };

        Ok(JobHandle {
            id,
            registry: Arc::clone(&self.jobs),
            worker,
        })
    }
}
