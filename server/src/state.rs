use bulletin_service_cli::{catalog::Catalog, scraper::Scraper, summarize::Summarizer};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const SWEEP_EVERY: Duration = Duration::from_secs(60);

// State of one summary job
#[derive(Clone, Serialize, Debug)]
pub enum JobStatus {
    Pending,
    Done { summary: String },
    Failed { error: String },
}

#[derive(Clone, Debug)]
pub struct JobRecord {
    pub number: usize,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn pending(number: usize) -> Self {
        Self {
            number,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

// Catalog is loaded once at start-up and shared read-only
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<DashMap<Uuid, JobRecord>>,
    pub catalog: Arc<Catalog>,
    pub scraper: Arc<Scraper>,
    /// None when no API key is configured.
    pub summarizer: Option<Arc<Summarizer>>,
}

impl AppState {
    pub fn new(catalog: Catalog, scraper: Scraper, summarizer: Option<Summarizer>) -> Self {
        AppState {
            jobs: Arc::new(DashMap::new()),
            catalog: Arc::new(catalog),
            scraper: Arc::new(scraper),
            summarizer: summarizer.map(Arc::new),
        }
    }

    pub fn set_status(&self, id: Uuid, status: JobStatus) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.finish(status);
        }
    }

    /// Forgets jobs that finished before `cutoff`. Pending jobs stay.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| job.finished_at.map_or(true, |at| at >= cutoff));
        before.saturating_sub(self.jobs.len())
    }

    /// Background task dropping finished jobs once they are older than `ttl`.
    pub fn spawn_job_sweeper(&self, ttl: Duration) {
        let Ok(max_age) = chrono::Duration::from_std(ttl) else {
            return;
        };
        let state = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_EVERY.min(ttl).max(Duration::from_secs(1)));
            loop {
                tick.tick().await;
                let evicted = state.evict_finished_before(Utc::now() - max_age);
                if evicted > 0 {
                    debug!(evicted, "finished jobs evicted");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulletin_service_cli::config::FeedConfig;

    fn empty_state() -> AppState {
        let scraper = Scraper::new(&FeedConfig::default()).unwrap();
        AppState::new(Catalog::new(Vec::new(), Vec::new()), scraper, None)
    }

    #[test]
    fn only_old_finished_jobs_are_evicted() {
        let state = empty_state();
        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let pending = Uuid::new_v4();

        let mut record = JobRecord::pending(1);
        record.finish(JobStatus::Done { summary: "viejo".into() });
        record.finished_at = Some(Utc::now() - chrono::Duration::hours(2));
        state.jobs.insert(old, record);

        state.jobs.insert(fresh, JobRecord::pending(2));
        state.set_status(fresh, JobStatus::Failed { error: "x".into() });

        let mut stale_pending = JobRecord::pending(3);
        stale_pending.created_at = Utc::now() - chrono::Duration::hours(5);
        state.jobs.insert(pending, stale_pending);

        let evicted = state.evict_finished_before(Utc::now() - chrono::Duration::hours(1));
        assert_eq!(evicted, 1);
        assert!(!state.jobs.contains_key(&old));
        assert!(state.jobs.contains_key(&fresh));
        assert!(state.jobs.contains_key(&pending));
    }
}
