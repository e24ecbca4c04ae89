use std::sync::Arc;
use std::time::Duration;

use genq_core::{Artifact, GenerationType, Job, JobPatch, Metadata};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::poller::LivePollers;
use crate::provider::{GenerationProvider, HistoryItem, HistoryQuery};
use crate::store::JobStore;

/// Metadata keys that scope a history lookup, first hit wins.
const CONTEXT_KEYS: [&str; 2] = ["profile", "profileId"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Matched history and the job is now completed
    Recovered { job_id: String, results: usize },
    /// Nothing in the window; the job stays as it was
    Unmatched { job_id: String },
    /// Reached a terminal state by other means while we looked
    Skipped { job_id: String },
    /// History could not be fetched; the job stays as it was
    Errored { job_id: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub generation_type: GenerationType,
    pub outcomes: Vec<ReconcileOutcome>,
}

impl ReconcileReport {
    pub fn recovered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ReconcileOutcome::Recovered { .. }))
            .count()
    }
}

/// Repairs jobs a previous process left in flight by matching them against
/// the provider's history instead of the (possibly forgotten) task id.
///
/// The match is a time-window heuristic: two submissions of the same type
/// inside one window can be attributed to each other.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<JobStore>,
    provider: Arc<dyn GenerationProvider>,
    live: LivePollers,
    window: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<JobStore>,
        provider: Arc<dyn GenerationProvider>,
        live: LivePollers,
        window: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            live,
            window,
        }
    }

    /// Reconcile every stale job of one type. Jobs with a poll loop running
    /// in this process are not stale and are left alone.
    pub async fn reconcile_type(&self, generation_type: GenerationType) -> ReconcileReport {
        let mut report = ReconcileReport {
            generation_type,
            outcomes: Vec::new(),
        };
        if !self.store.has_active_generation_for_type(generation_type) {
            return report;
        }

        let stale: Vec<Job> = self
            .store
            .list_active_jobs()
            .into_iter()
            .filter(|job| job.generation_type == generation_type && !self.live.contains(&job.job_id))
            .collect();

        for job in stale {
            let outcome = match self.reconcile_job(&job).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(job_id = %job.job_id, "history lookup failed: {e}");
                    ReconcileOutcome::Errored {
                        job_id: job.job_id.clone(),
                        error: e.to_string(),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        report
    }

    pub async fn reconcile_job(&self, job: &Job) -> Result<ReconcileOutcome, ProviderError> {
        let query = HistoryQuery {
            context: history_context(&job.metadata),
            generation_type: Some(job.generation_type),
        };
        let history = self.provider.history(&query).await?;
        let matches = match_history(job, &history, self.window);

        let Some(finished_at) = matches.iter().filter_map(|a| a.created_at).max() else {
            info!(job_id = %job.job_id, "no history in window, leaving job in flight");
            return Ok(ReconcileOutcome::Unmatched {
                job_id: job.job_id.clone(),
            });
        };

        let count = matches.len();
        match self.store.update_job(&job.job_id, JobPatch::completed(matches, finished_at)) {
            Some(_) => {
                info!(job_id = %job.job_id, "recovered {count} results from history");
                Ok(ReconcileOutcome::Recovered {
                    job_id: job.job_id.clone(),
                    results: count,
                })
            }
            None => Ok(ReconcileOutcome::Skipped {
                job_id: job.job_id.clone(),
            }),
        }
    }
}

/// History entries created within `[started_at, started_at + window]`, in
/// the provider's order. Entries tagged with another type are ignored.
pub fn match_history(job: &Job, history: &[HistoryItem], window: Duration) -> Vec<Artifact> {
    let Ok(window) = chrono::Duration::from_std(window) else {
        return Vec::new();
    };
    let start = job.started_at;
    let end = start + window;

    history
        .iter()
        .filter(|item| item.created_at >= start && item.created_at <= end)
        .filter(|item| {
            item.generation_type
                .as_deref()
                .is_none_or(|t| t == job.generation_type.id())
        })
        .map(HistoryItem::to_artifact)
        .collect()
}

fn history_context(metadata: &Metadata) -> Option<String> {
    CONTEXT_KEYS.iter().find_map(|key| match metadata.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, history_item};
    use chrono::{DateTime, TimeZone, Utc};
    use genq_core::JobStatus;
    use serde_json::json;

    const WINDOW: Duration = Duration::from_secs(60);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    fn stale_job(store: &JobStore, id: &str) -> Job {
        let mut metadata = Metadata::new();
        metadata.insert("profile".into(), json!("creator-1"));
        metadata.insert("prompt".into(), json!("waves at dusk"));
        let mut job = Job::with_id(id, GenerationType::TextToVideo, metadata);
        job.started_at = t0();
        store.add_job(job).unwrap();
        store.update_job(id, JobPatch::task_accepted("lost-task")).unwrap()
    }

    fn setup() -> (Arc<JobStore>, Arc<ScriptedProvider>, LivePollers, Reconciler) {
        let store = Arc::new(JobStore::new());
        let provider = Arc::new(ScriptedProvider::default());
        let live = LivePollers::default();
        let reconciler = Reconciler::new(store.clone(), provider.clone(), live.clone(), WINDOW);
        (store, provider, live, reconciler)
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let store = JobStore::new();
        let job = stale_job(&store, "J");
        let history = vec![
            history_item("before", t0() - secs(1)),
            history_item("start", t0()),
            history_item("end", t0() + secs(60)),
            history_item("after", t0() + secs(61)),
        ];
        let ids: Vec<String> = match_history(&job, &history, WINDOW).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["start", "end"]);
    }

    #[test]
    fn test_other_types_are_not_matched() {
        let store = JobStore::new();
        let job = stale_job(&store, "J");
        let mut image = history_item("img", t0() + secs(5));
        image.generation_type = Some("text-to-image".into());
        let mut video = history_item("vid", t0() + secs(6));
        video.generation_type = Some("text-to-video".into());

        let ids: Vec<String> = match_history(&job, &[image, video], WINDOW)
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["vid"]);
    }

    #[test]
    fn test_history_context_from_metadata() {
        let mut metadata = Metadata::new();
        assert_eq!(history_context(&metadata), None);
        metadata.insert("profileId".into(), json!(42));
        assert_eq!(history_context(&metadata).as_deref(), Some("42"));
        metadata.insert("profile".into(), json!("main"));
        assert_eq!(history_context(&metadata).as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_recovers_stale_job_from_history() {
        let (store, provider, _live, reconciler) = setup();
        stale_job(&store, "J3");
        provider.set_history(vec![history_item("clip", t0() + secs(20))]);

        let report = reconciler.reconcile_type(GenerationType::TextToVideo).await;
        assert_eq!(report.recovered(), 1);

        let job = store.get_job("J3").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.results.len(), 1);
        assert_eq!(job.results[0].id, "clip");
        assert_eq!(job.completed_at, Some(t0() + secs(20)));
        assert!(job.is_consistent());

        let queries = provider.history_queries();
        assert_eq!(queries[0].context.as_deref(), Some("creator-1"));
        assert_eq!(queries[0].generation_type, Some(GenerationType::TextToVideo));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let (store, provider, _live, reconciler) = setup();
        stale_job(&store, "J3");
        provider.set_history(vec![
            history_item("a", t0() + secs(10)),
            history_item("b", t0() + secs(30)),
        ]);

        reconciler.reconcile_type(GenerationType::TextToVideo).await;
        let first = store.get_job("J3").unwrap();

        let report = reconciler.reconcile_type(GenerationType::TextToVideo).await;
        assert!(report.outcomes.is_empty());
        let second = store.get_job("J3").unwrap();
        assert_eq!(first, second);
        assert_eq!(second.results.len(), 2);

        // Even when handed the job directly, nothing accumulates.
        let outcome = reconciler.reconcile_job(&first).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Skipped { job_id: "J3".into() });
        assert_eq!(store.get_job("J3").unwrap(), second);
    }

    #[tokio::test]
    async fn test_miss_leaves_job_in_flight() {
        let (store, provider, _live, reconciler) = setup();
        stale_job(&store, "J");
        provider.set_history(vec![history_item("later", t0() + secs(600))]);

        let report = reconciler.reconcile_type(GenerationType::TextToVideo).await;
        assert_eq!(report.outcomes, vec![ReconcileOutcome::Unmatched { job_id: "J".into() }]);
        assert_eq!(store.get_job("J").unwrap().status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_history_failure_is_reported_not_fatal() {
        let (store, provider, _live, reconciler) = setup();
        stale_job(&store, "J");
        provider.fail_history(ProviderError::Transport("dns".into()));

        let report = reconciler.reconcile_type(GenerationType::TextToVideo).await;
        assert!(matches!(report.outcomes[0], ReconcileOutcome::Errored { .. }));
        assert!(store.get_job("J").unwrap().is_active());
    }

    #[tokio::test]
    async fn test_live_jobs_are_not_stale() {
        let (store, provider, live, reconciler) = setup();
        stale_job(&store, "J");
        provider.set_history(vec![history_item("clip", t0() + secs(20))]);
        let _guard = live.claim("J").unwrap();

        let report = reconciler.reconcile_type(GenerationType::TextToVideo).await;
        assert!(report.outcomes.is_empty());
        assert!(provider.history_queries().is_empty());
        assert!(store.get_job("J").unwrap().is_active());
    }
}
