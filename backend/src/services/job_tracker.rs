//! Job tracking for background evaluations.
//!
//! An in-memory store of progress logs and final results for long-running
//! work (repeated walk-forward evaluations). The HTTP layer streams a job's
//! log over SSE and serves its result once the job finishes.
//!
//! Running jobs are never evicted. Once more than the retention limit have
//! finished, the ones that finished earliest are dropped.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A single log entry with timestamp and message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Job status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Job metadata and logs.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub job_id: String,
    /// What the job does, e.g. `"evaluation"`.
    pub kind: String,
    pub status: JobStatus,
    pub logs: Vec<LogEntry>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Result of the job (the evaluation report on success)
    pub result: Option<serde_json::Value>,
}

/// Finished jobs kept by [`JobTracker::new`].
pub const DEFAULT_RETAINED_JOBS: usize = 100;

/// In-memory job tracker.
#[derive(Clone)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    retain_finished: usize,
}

impl JobTracker {
    /// Create a new job tracker.
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }

    /// Tracker that keeps at most `retain_finished` finished jobs.
    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retain_finished,
        }
    }

    /// Create a new running job and return its ID.
    pub fn create_job(&self, kind: impl Into<String>) -> String {
        let job_id = Uuid::new_v4().to_string();
        let job = Job {
            job_id: job_id.clone(),
            kind: kind.into(),
            status: JobStatus::Running,
            logs: vec![],
            created_at: chrono::Utc::now(),
            completed_at: None,
            result: None,
        };
        self.jobs.write().insert(job_id.clone(), job);
        job_id
    }

    /// Add a log entry to a job. Unknown ids are ignored.
    pub fn log(&self, job_id: &str, level: LogLevel, message: impl Into<String>) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id) {
            job.logs.push(LogEntry {
                timestamp: chrono::Utc::now(),
                level,
                message: message.into(),
            });
        }
    }

    /// Mark a job as completed with optional result.
    pub fn complete_job(&self, job_id: &str, result: Option<serde_json::Value>) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = JobStatus::Completed;
            job.completed_at = Some(chrono::Utc::now());
            job.result = result;
        }
        self.evict_finished(&mut jobs);
    }

    /// Mark a job as failed, logging the reason as an error entry.
    pub fn fail_job(&self, job_id: &str, error_message: impl Into<String>) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = JobStatus::Failed;
            job.completed_at = Some(chrono::Utc::now());
            job.logs.push(LogEntry {
                timestamp: chrono::Utc::now(),
                level: LogLevel::Error,
                message: error_message.into(),
            });
        }
        self.evict_finished(&mut jobs);
    }

    fn evict_finished(&self, jobs: &mut HashMap<String, Job>) {
        let mut finished: Vec<(chrono::DateTime<chrono::Utc>, String)> = jobs
            .values()
            .filter_map(|job| job.completed_at.map(|at| (at, job.job_id.clone())))
            .collect();
        if finished.len() <= self.retain_finished {
            return;
        }
        finished.sort();
        let excess = finished.len() - self.retain_finished;
        for (_, job_id) in finished.into_iter().take(excess) {
            jobs.remove(&job_id);
        }
        log::debug!("Evicted {} finished jobs", excess);
    }

    /// Get a job by ID.
    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Get all logs for a job.
    pub fn get_logs(&self, job_id: &str) -> Vec<LogEntry> {
        self.logs_since(job_id, 0).0
    }

    /// Logs from index `cursor` on, plus the job status.
    ///
    /// Returns `None` as the status for unknown jobs.
    pub fn logs_since(&self, job_id: &str, cursor: usize) -> (Vec<LogEntry>, Option<JobStatus>) {
        let jobs = self.jobs.read();
        match jobs.get(job_id) {
            Some(job) => (
                job.logs.iter().skip(cursor).cloned().collect(),
                Some(job.status),
            ),
            None => (Vec::new(), None),
        }
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle() {
        let tracker = JobTracker::new();
        let id = tracker.create_job("evaluation");
        assert_eq!(tracker.get_job(&id).unwrap().status, JobStatus::Running);

        tracker.log(&id, LogLevel::Info, "run 1/3");
        tracker.log(&id, LogLevel::Info, "run 2/3");
        tracker.complete_job(&id, Some(serde_json::json!({"runs": 3})));

        let job = tracker.get_job(&id).unwrap();
        assert_eq!(job.kind, "evaluation");
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
        assert_eq!(job.result.unwrap()["runs"], 3);
        assert_eq!(tracker.get_logs(&id).len(), 2);
    }

    #[test]
    fn test_fail_job_appends_error() {
        let tracker = JobTracker::new();
        let id = tracker.create_job("evaluation");
        tracker.fail_job(&id, "run 4 failed");

        let job = tracker.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.status.is_finished());
        assert_eq!(job.logs.last().unwrap().level, LogLevel::Error);
    }

    #[test]
    fn test_oldest_finished_jobs_evicted() {
        let tracker = JobTracker::with_retention(2);
        let running = tracker.create_job("evaluation");
        let ids: Vec<String> = (0..4).map(|_| tracker.create_job("evaluation")).collect();
        for id in &ids {
            tracker.complete_job(id, None);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        assert_eq!(tracker.len(), 3);
        assert!(tracker.get_job(&running).is_some());
        assert!(tracker.get_job(&ids[0]).is_none());
        assert!(tracker.get_job(&ids[1]).is_none());
        assert!(tracker.get_job(&ids[3]).is_some());

        tracker.fail_job(&running, "no history");
        assert_eq!(tracker.len(), 2);
        assert!(tracker.get_job(&ids[2]).is_none());
        assert_eq!(tracker.get_job(&running).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_logs_since_cursor() {
        let tracker = JobTracker::new();
        let id = tracker.create_job("evaluation");
        for i in 0..5 {
            tracker.log(&id, LogLevel::Info, format!("step {}", i));
        }
        let (tail, status) = tracker.logs_since(&id, 3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].message, "step 3");
        assert_eq!(status, Some(JobStatus::Running));

        let (none, status) = tracker.logs_since("missing", 0);
        assert!(none.is_empty());
        assert!(status.is_none());
    }
}
