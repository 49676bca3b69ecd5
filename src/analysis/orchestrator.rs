// src/analysis/orchestrator.rs
use super::{AnalysisBatch, AnalysisResult, AnalysisWorker, AnalyzedJob};
use crate::events::EventSink;
use crate::scraping::JobRecord;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

const MAX_POOL_SIZE: usize = 8;

/// Fans selected jobs out to the worker and streams each result as it lands.
pub struct AnalysisOrchestrator {
    worker: Arc<AnalysisWorker>,
}

impl AnalysisOrchestrator {
    pub fn new(worker: Arc<AnalysisWorker>) -> Self {
        Self { worker }
    }

    pub async fn run(
        &self,
        jobs: &[JobRecord],
        resume_text: &str,
        events: &EventSink,
    ) -> AnalysisBatch {
        let mut batch = AnalysisBatch::default();
        if jobs.is_empty() {
            return batch;
        }

        let pool_size = jobs.len().min(MAX_POOL_SIZE);
        let semaphore = Arc::new(Semaphore::new(pool_size));
        let resume_text: Arc<str> = Arc::from(resume_text);
        let mut join_set = JoinSet::new();

        info!(jobs = jobs.len(), pool_size, "Starting analysis batch");

        for job in jobs {
            let job = job.clone();
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(&semaphore);
            let resume_text = Arc::clone(&resume_text);

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let job_desc = job.job_desc.clone();

                // Inner task so a panic comes back as a JoinError we can tie to this job
                let analysis =
                    tokio::spawn(async move { worker.analyze(&job_desc, &resume_text).await })
                        .await
                        .unwrap_or_else(|e| {
                            error!(job_id = %job.job_id, "Analysis task failed: {}", e);
                            AnalysisResult::error(format!("Critical error: {}", e))
                        });

                AnalyzedJob::new(&job, analysis)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(analyzed) => {
                    events.job_result(&analyzed);
                    batch.push(analyzed);
                }
                // Only reachable if the wrapper itself is aborted
                Err(e) => error!("Analysis wrapper task failed: {}", e),
            }
        }

        info!(
            successful = batch.success_count(),
            total = batch.total(),
            "Analysis batch finished"
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm_client::{CompletionProvider, LlmError};
    use crate::events::PipelineEvent;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;

    /// Succeeds unless the prompt carries a marker; "PANIC" panics outright.
    struct MarkerProvider;

    #[async_trait]
    impl CompletionProvider for MarkerProvider {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
            if prompt.contains("PANIC") {
                panic!("provider blew up");
            }
            if prompt.contains("FAIL") {
                return Err(LlmError::EmptyContent);
            }
            Ok(r#"{"resume_match_score": 55, "match_analysis": "ok"}"#.to_string())
        }

        fn model_name(&self) -> &str {
            "marker"
        }
    }

    fn job(id: &str, desc: &str) -> JobRecord {
        JobRecord {
            job_id: id.to_string(),
            job_link: format!("https://example.com/jobs/view/{}", id),
            job_title: format!("Role {}", id),
            company_name: "Acme".to_string(),
            salary: None,
            job_desc: desc.to_string(),
            hours_posted: Some(24),
            applicants_count: None,
        }
    }

    fn orchestrator() -> AnalysisOrchestrator {
        let worker = AnalysisWorker::new(Arc::new(MarkerProvider), Duration::from_millis(1));
        AnalysisOrchestrator::new(Arc::new(worker))
    }

    #[tokio::test]
    async fn test_panicking_job_becomes_error_result() {
        let jobs = vec![
            job("1", "Rust backend"),
            job("2", "PANIC in the description"),
            job("3", "Data platform"),
        ];
        let (sink, mut rx) = EventSink::channel();
        let batch = orchestrator().run(&jobs, "resume", &sink).await;
        drop(sink);

        assert_eq!(batch.total(), 3);
        assert_eq!(batch.success_count(), 2);
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].job_id, "2");
        assert!(batch.failed[0]
            .analysis
            .match_analysis()
            .starts_with("Critical error:"));

        let mut streamed = HashSet::new();
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::JobResult(analyzed) = event {
                streamed.insert(analyzed.job_id);
            }
        }
        assert_eq!(streamed, HashSet::from(["1".into(), "2".into(), "3".into()]));
    }

    #[tokio::test]
    async fn test_worker_errors_are_partitioned() {
        let jobs = vec![job("a", "FAIL"), job("b", "fine")];
        let batch = orchestrator().run(&jobs, "resume", &EventSink::disabled()).await;

        assert_eq!(batch.success_count(), 1);
        assert_eq!(batch.successful[0].job_id, "b");
        assert_eq!(batch.failed[0].job_id, "a");
        assert_eq!(batch.failed[0].job_title, "Role a");
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let batch = orchestrator().run(&[], "resume", &EventSink::disabled()).await;
        assert_eq!(batch, AnalysisBatch::default());
    }
}
