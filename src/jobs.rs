//! In-memory registry of background solve runs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use uuid::Uuid;

use crate::solver::SolveOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub url: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SolveOutcome>,
}

/// Jobs expire `ttl` after their last update.
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Cache<Uuid, JobRecord>,
}

impl JobRegistry {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        JobRegistry {
            jobs: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn create(&self, url: &str) -> JobRecord {
        let record = JobRecord {
            job_id: Uuid::new_v4(),
            url: url.to_string(),
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
        };
        self.jobs.insert(record.job_id, record.clone()).await;
        record
    }

    pub async fn mark_running(&self, job_id: Uuid) {
        if let Some(mut record) = self.jobs.get(&job_id).await {
            record.status = JobStatus::Running;
            record.started_at = Some(Utc::now());
            self.jobs.insert(job_id, record).await;
        }
    }

    pub async fn complete(&self, job_id: Uuid, outcome: SolveOutcome) {
        if let Some(mut record) = self.jobs.get(&job_id).await {
            record.status = JobStatus::Done;
            record.finished_at = Some(Utc::now());
            record.result = Some(outcome);
            self.jobs.insert(job_id, record).await;
        }
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.jobs.get(&job_id).await
    }
}
