use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::BrResult;
use crate::jobs::base::{Job, JobRegistry, JobSet};

#[derive(Debug, Default)]
struct Inner {
    running: Vec<Job>,
    sets: BTreeMap<JobSet, Vec<Job>>,
}

/// In-process [`JobRegistry`] that tests fill directly.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `job` as executing on a worker.
    pub async fn start_job(&self, job: Job) {
        self.inner.lock().await.running.push(job);
    }

    /// Marks the job with `id` as done, returning whether it was running.
    pub async fn finish_job(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let before = inner.running.len();
        inner.running.retain(|job| job.id != id);

        inner.running.len() != before
    }

    /// Adds `job` to `set`; queues are created on first use.
    pub async fn push(&self, set: JobSet, job: Job) {
        self.inner
            .lock()
            .await
            .sets
            .entry(set)
            .or_default()
            .push(job);
    }
}

impl JobRegistry for MemoryJobRegistry {
    async fn running_jobs(&self) -> BrResult<Vec<Job>> {
        Ok(self.inner.lock().await.running.clone())
    }

    async fn queue_names(&self) -> BrResult<Vec<String>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .sets
            .keys()
            .filter_map(|set| match set {
                JobSet::Queue(name) => Some(name.clone()),
                _ => None,
            })
            .collect())
    }

    async fn jobs(&self, set: &JobSet) -> BrResult<Vec<Job>> {
        let inner = self.inner.lock().await;

        Ok(inner.sets.get(set).cloned().unwrap_or_default())
    }

    async fn delete_job(&self, set: &JobSet, job: &Job) -> BrResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(jobs) = inner.sets.get_mut(set) else {
            return Ok(false);
        };

        let Some(position) = jobs.iter().position(|candidate| candidate.id == job.id) else {
            return Ok(false);
        };
        jobs.remove(position);

        Ok(true)
    }
}
