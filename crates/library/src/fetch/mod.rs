//! Deduplicated background fetching.
//!
//! Any number of callers may ask for the same uncached URL at once; the
//! coordinator makes sure at most one job per canonical URL is queued or
//! running and hands everybody else that job's id. Jobs run on tokio tasks,
//! bounded by a semaphore sized by the configured worker count.

pub mod error;
mod job;
mod throttle;

pub use self::job::{JobId, JobStatus};
pub use self::throttle::{Caller, FetchLock};

use self::error::{ErrorKind, Result};
use self::job::JobKey;
use crate::Context;
use crate::link::{self, Ready};
use catalog_config::FetchConfig;
use catalog_sites::Site;
use catalog_sites::models::ResourceDescriptor;
use catalog_store::ItemRef;
use catalog_store::item::Item;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Semaphore, watch};
use tracing::instrument;

/// What a caller asking for a URL gets back.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The URL is already linked to this live Item.
    Ready(Item),
    /// A job is fetching it; ask again later.
    InProgress(JobId),
    /// Not in the catalog, and this caller may not trigger a fetch right now.
    NotFound,
    /// No registered site recognises the URL.
    Unsupported,
}

struct Job {
    key: JobKey,
    url: String,
    status: watch::Sender<JobStatus>,
}

#[derive(Default)]
struct Jobs {
    by_id: HashMap<JobId, Job>,
    /// Queued or running jobs.
    live: HashMap<JobKey, JobId>,
    /// Latest finished job per key.
    last: HashMap<JobKey, JobId>,
    /// Finished jobs, oldest first.
    finished: VecDeque<JobId>,
}
impl Jobs {
    /// Forget the oldest finished jobs until at most `keep` remain.
    fn evict(&mut self, keep: usize) {
        while self.finished.len() > keep {
            let Some(id) = self.finished.pop_front() else { break };
            let Some(job) = self.by_id.remove(&id) else { continue };
            if self.last.get(&job.key) == Some(&id) {
                self.last.remove(&job.key);
            }
            tracing::trace!(job = %id, url = job.url.as_str(), "Forgot finished job");
        }
    }
}

struct Inner {
    ctx: Context,
    config: FetchConfig,
    workers: Semaphore,
    jobs: Mutex<Jobs>,
    lock: FetchLock,
}

/// Schedules fetch jobs and tracks their status. Cheap to clone.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}
impl FetchCoordinator {
    pub fn new(ctx: Context, config: FetchConfig) -> Self {
        let lock = FetchLock::new(&config);
        let workers = Semaphore::new(config.workers.max(1));
        Self {
            inner: Arc::new(Inner { ctx, config, workers, jobs: Mutex::new(Jobs::default()), lock }),
        }
    }

    pub fn context(&self) -> &Context {
        &self.inner.ctx
    }

    fn jobs(&self) -> MutexGuard<'_, Jobs> {
        // Nothing panics while holding the lock; recover the map if it does.
        self.inner.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn site_for(&self, url: &str) -> Option<Site> {
        self.inner.ctx.registry.get_site_by_url(url, true).await
    }

    /// Schedule a fetch of `url`, or return the job already fetching it.
    ///
    /// A refetch scrapes again even if the URL is already linked, and
    /// overwrites the Item with the fresh values.
    #[instrument(skip(self))]
    pub async fn enqueue_fetch(&self, url: &str, is_refetch: bool) -> Result<JobId> {
        let Some(site) = self.site_for(url).await else {
            exn::bail!(ErrorKind::UnsupportedUrl(url.to_string()));
        };
        Ok(self.enqueue_site(site, is_refetch))
    }

    fn enqueue_site(&self, site: Site, is_refetch: bool) -> JobId {
        let key = JobKey::for_url(site.url());
        let id = {
            let mut jobs = self.jobs();
            if let Some(id) = jobs.live.get(&key) {
                tracing::debug!(job = %id, url = site.url(), "Fetch already in progress");
                return *id;
            }
            let id = JobId::new();
            let (status, _) = watch::channel(JobStatus::Queued);
            jobs.by_id.insert(id, Job { key: key.clone(), url: site.url().to_string(), status });
            jobs.live.insert(key.clone(), id);
            id
        };
        tracing::info!(job = %id, url = site.url(), is_refetch, "Queued fetch");
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.run(id, key, site, is_refetch).await });
        id
    }

    async fn run(self, id: JobId, key: JobKey, site: Site, is_refetch: bool) {
        let related = {
            let Ok(_permit) = self.inner.workers.acquire().await else {
                return;
            };
            self.set_status(id, JobStatus::Running);
            match link::get_resource_ready(&self.inner.ctx, &site, is_refetch).await {
                Ok(ready) => {
                    tracing::info!(job = %id, item = %ready.item.uuid, created = ready.created, "Fetch finished");
                    self.finish(id, &key, JobStatus::Finished(ready.item.uuid));
                    ready.related
                },
                Err(err) => {
                    if err.is_expected() {
                        tracing::warn!(job = %id, url = site.url(), id_type = %site.id_type(), id_value = site.id_value(), error = %err, "Fetch failed");
                    } else {
                        tracing::error!(job = %id, url = site.url(), id_type = %site.id_type(), id_value = site.id_value(), error = %err, "Fetch failed");
                    }
                    self.finish(id, &key, JobStatus::Failed(err.to_string()));
                    Vec::new()
                },
            }
        };
        self.enqueue_related(related);
    }

    fn set_status(&self, id: JobId, status: JobStatus) {
        if let Some(job) = self.jobs().by_id.get(&id) {
            job.status.send_replace(status);
        }
    }

    /// Publish the final status and free the key in one step, so a caller
    /// that sees the job done can schedule a new one straight away.
    fn finish(&self, id: JobId, key: &JobKey, status: JobStatus) {
        let mut jobs = self.jobs();
        if jobs.live.get(key) == Some(&id) {
            jobs.live.remove(key);
        }
        let Some(job) = jobs.by_id.get(&id) else { return };
        job.status.send_replace(status);
        jobs.last.insert(key.clone(), id);
        jobs.finished.push_back(id);
        jobs.evict(self.inner.config.job_history);
    }

    /// Best-effort scheduling of associated resources. Each becomes its own
    /// deduplicated job; none of them can fail the job that found them.
    fn enqueue_related(&self, related: Vec<ResourceDescriptor>) {
        for descriptor in related.into_iter().take(self.inner.config.max_related) {
            match self.inner.ctx.registry.get_site_by_id_type(descriptor.id_type, descriptor.id_value.clone()) {
                Some(site) => {
                    self.enqueue_site(site, false);
                },
                None => tracing::debug!(
                    id_type = %descriptor.id_type,
                    id_value = descriptor.id_value.as_str(),
                    "No site for related resource"
                ),
            }
        }
    }

    /// Whether `caller` may trigger a fetch of `url` right now.
    pub fn get_fetch_lock(&self, caller: &Caller, url: &str) -> bool {
        self.inner.lock.try_acquire(caller, url)
    }

    /// Answer a caller asking for a URL: the Item if it's linked already,
    /// otherwise a job to wait on.
    ///
    /// A throttled caller still gets a job for a URL nobody has tried yet.
    /// Only a URL whose last job is done without leaving a live Item (it
    /// failed, or the Item was deleted since) is reported as not found until
    /// the throttle lets the caller try again.
    #[instrument(skip(self))]
    pub async fn request(&self, caller: &Caller, url: &str) -> Result<FetchOutcome> {
        let Some(site) = self.site_for(url).await else {
            return Ok(FetchOutcome::Unsupported);
        };
        let reference = ItemRef::Resource { id_type: site.id_type(), id_value: site.id_value().to_string() };
        let resolution = self.inner.ctx.repository.resolve(&reference, true).await.map_err(ErrorKind::store)?;
        if let Some(item) = resolution.into_live() {
            return Ok(FetchOutcome::Ready(item));
        }
        if self.get_fetch_lock(caller, site.url()) {
            return Ok(FetchOutcome::InProgress(self.enqueue_site(site, false)));
        }
        {
            let jobs = self.jobs();
            let key = JobKey::for_url(site.url());
            if let Some(id) = jobs.live.get(&key) {
                return Ok(FetchOutcome::InProgress(*id));
            }
            if jobs.last.contains_key(&key) {
                return Ok(FetchOutcome::NotFound);
            }
        }
        Ok(FetchOutcome::InProgress(self.enqueue_site(site, false)))
    }

    /// Link `url` right away on the calling task, outside the job queue.
    #[instrument(skip(self))]
    pub async fn fetch_now(&self, url: &str, force: bool) -> Result<Ready> {
        let Some(site) = self.site_for(url).await else {
            exn::bail!(ErrorKind::UnsupportedUrl(url.to_string()));
        };
        link::get_resource_ready(&self.inner.ctx, &site, force).await.map_err(|err| {
            let inner = (*err).clone();
            err.raise(ErrorKind::Link(inner))
        })
    }

    /// Current status of a job. Finished jobs are forgotten once more than
    /// the configured history has finished after them.
    pub fn status(&self, id: JobId) -> Result<JobStatus> {
        match self.jobs().by_id.get(&id) {
            Some(job) => Ok(job.status.borrow().clone()),
            None => exn::bail!(ErrorKind::UnknownJob(id)),
        }
    }

    /// The canonical URL a job is fetching.
    pub fn url(&self, id: JobId) -> Result<String> {
        match self.jobs().by_id.get(&id) {
            Some(job) => Ok(job.url.clone()),
            None => exn::bail!(ErrorKind::UnknownJob(id)),
        }
    }

    /// Wait until the job has finished or failed.
    pub async fn wait(&self, id: JobId) -> Result<JobStatus> {
        let mut receiver = match self.jobs().by_id.get(&id) {
            Some(job) => job.status.subscribe(),
            None => exn::bail!(ErrorKind::UnknownJob(id)),
        };
        // Senders live as long as the coordinator, so this can't fail while
        // we hold it.
        let _ = receiver.wait_for(JobStatus::is_done).await;
        let status = receiver.borrow().clone();
        Ok(status)
    }
}
