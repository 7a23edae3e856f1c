//! Integration tests for a full pipeline run.
//!
//! Every test runs fetch → summarize → dedupe → sort → write against mock
//! collaborators. Tests whose retries back off run on paused time, so
//! sleeps resolve instantly.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use job_pipeline::testing::{
    ConcurrencyGauge, FailingSink, MockFailure, MockSource, MockSummarizer,
};
use job_pipeline::{
    DropStage, FieldSorter, InputDetail, JobKey, MemorySink, Pipeline, PipelineConfig,
    PipelineError, RawJob, RetryPolicy, RunOutcome, SortKey, SortOrder, TsvSink,
};

fn no_jitter(policy: RetryPolicy) -> RetryPolicy {
    policy.with_jitter(false)
}

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!(
        "job-pipeline-{}-{}-{}",
        std::process::id(),
        nanos,
        name
    ))
}

#[tokio::test]
async fn test_two_sources_sorted_by_salary() {
    let a = MockSource::new("alpha").with_listings(1);
    let b = MockSource::new("beta").with_listings(1);
    let summarizer = MockSummarizer::new()
        .with_salary(a.listing_url(0), 50_000)
        .with_salary(b.listing_url(0), 90_000);
    let sink = MemorySink::new();

    let pipeline = Pipeline::builder()
        .source(a)
        .source(b)
        .summarizer(summarizer)
        .sink(sink.clone())
        .build()
        .unwrap();

    let report = pipeline.run().await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert!(report.dropped.is_empty());
    assert_eq!(report.jobs.len(), 2);
    assert_eq!(report.jobs[0].source, "beta");
    assert_eq!(report.jobs[0].salary_upper, Some(90_000));
    assert_eq!(report.jobs[1].source, "alpha");

    assert_eq!(sink.jobs(), report.jobs);
    assert_eq!(sink.flush_count(), 1);
    assert_eq!(report.sink("memory").map(|s| s.written), Some(2));
}

#[tokio::test]
async fn test_unknown_salary_sorts_last() {
    let source = MockSource::new("board").with_listings(3);
    let summarizer = MockSummarizer::new()
        .with_salary(source.listing_url(0), 50_000)
        .with_salary(source.listing_url(2), 80_000);

    let report = Pipeline::builder()
        .source(source)
        .summarizer(summarizer)
        .sink(MemorySink::new())
        .build()
        .unwrap()
        .run()
        .await;

    let ids: Vec<&str> = report.jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["board-2", "board-0", "board-1"]);
    assert_eq!(report.jobs[2].salary_upper, None);
}

#[tokio::test]
async fn test_custom_sorter() {
    let source = MockSource::new("board").with_listings(3);
    let summarizer = MockSummarizer::new()
        .with_salary(source.listing_url(0), 50_000)
        .with_salary(source.listing_url(2), 80_000);

    let report = Pipeline::builder()
        .source(source)
        .summarizer(summarizer)
        .sink(MemorySink::new())
        .sorter(FieldSorter::new(SortKey::SalaryUpper, SortOrder::Ascending))
        .build()
        .unwrap()
        .run()
        .await;

    let ids: Vec<&str> = report.jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["board-1", "board-0", "board-2"]);
}

#[tokio::test(start_paused = true)]
async fn test_transient_summarize_failure_retried_five_times() {
    let source = MockSource::new("board").with_listings(1);
    let url = source.listing_url(0);
    let summarizer = MockSummarizer::new().always_failing(&url, MockFailure::Transient);

    let report = Pipeline::builder()
        .source(source)
        .summarizer(summarizer.clone())
        .sink(MemorySink::new())
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(summarizer.calls_for(&url), 5);
    assert_eq!(report.outcome, RunOutcome::NoJobs);
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].stage, DropStage::Summarize);
    assert_eq!(report.dropped[0].attempts, 5);
    assert_eq!(report.dropped[0].url.as_deref(), Some(url.as_str()));
    assert_eq!(report.sources[0].dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn test_summarize_recovers_within_budget() {
    let source = MockSource::new("board").with_listings(1);
    let url = source.listing_url(0);
    let summarizer = MockSummarizer::new()
        .failing_times(&url, 2, MockFailure::Malformed)
        .with_salary(&url, 70_000);

    let report = Pipeline::builder()
        .source(source)
        .summarizer(summarizer.clone())
        .sink(MemorySink::new())
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(summarizer.calls_for(&url), 3);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.jobs[0].salary_upper, Some(70_000));
    assert!(report.dropped.is_empty());
}

#[tokio::test]
async fn test_fatal_summarize_failure_not_retried() {
    let source = MockSource::new("board").with_listings(2);
    let url = source.listing_url(0);
    let summarizer = MockSummarizer::new().always_failing(&url, MockFailure::Fatal);

    let report = Pipeline::builder()
        .source(source)
        .summarizer(summarizer.clone())
        .sink(MemorySink::new())
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(summarizer.calls_for(&url), 1);
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].attempts, 1);
    assert_eq!(report.jobs.len(), 1);
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_failed_source_contributes_nothing() {
    let a = MockSource::new("a").with_listings(2);
    let b = MockSource::new("b")
        .with_listings(2)
        .always_failing(MockFailure::Transient);
    let c = MockSource::new("c").with_listings(2);

    let report = Pipeline::builder()
        .source(a)
        .source(b.clone())
        .source(c)
        .summarizer(MockSummarizer::new())
        .sink(MemorySink::new())
        .config(PipelineConfig::new().with_fetch_retry(no_jitter(RetryPolicy::default())))
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(b.call_count(), 3);

    assert_eq!(report.jobs.len(), 4);
    assert!(report.jobs.iter().all(|j| j.source != "b"));

    let names: Vec<&str> = report.sources.iter().map(|s| s.source.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert!(report.sources[1].failed());
    assert_eq!(report.sources[1].fetch_attempts, 3);
    assert_eq!(report.failed_sources().count(), 1);

    let fetch_drops: Vec<_> = report
        .dropped
        .iter()
        .filter(|d| d.stage == DropStage::Fetch)
        .collect();
    assert_eq!(fetch_drops.len(), 1);
    assert_eq!(fetch_drops[0].source, "b");
    assert_eq!(fetch_drops[0].url, None);
}

#[tokio::test(start_paused = true)]
async fn test_source_recovers_after_rate_limit() {
    let source = MockSource::new("board")
        .with_listings(1)
        .failing_times(2, MockFailure::RateLimited(Duration::from_secs(2)));

    let report = Pipeline::builder()
        .source(source.clone())
        .summarizer(MockSummarizer::new())
        .sink(MemorySink::new())
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(source.call_count(), 3);
    assert_eq!(report.sources[0].fetch_attempts, 3);
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_fatal_source_failure_not_retried() {
    let source = MockSource::new("board")
        .with_listings(1)
        .always_failing(MockFailure::Fatal);
    let sink = MemorySink::new();

    let report = Pipeline::builder()
        .source(source.clone())
        .summarizer(MockSummarizer::new())
        .sink(sink.clone())
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(source.call_count(), 1);
    assert_eq!(report.outcome, RunOutcome::AllSourcesFailed);
    assert!(report.jobs.is_empty());
    assert!(sink.is_empty());
    assert_eq!(sink.flush_count(), 1);
}

#[tokio::test]
async fn test_dev_mode_caps_summarizer_calls() {
    let source = MockSource::new("board").with_listings(10);
    let summarizer = MockSummarizer::new();

    let report = Pipeline::builder()
        .source(source)
        .summarizer(summarizer.clone())
        .sink(MemorySink::new())
        .config(PipelineConfig::new().with_dev_mode(2))
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(summarizer.call_count(), 2);
    assert_eq!(report.jobs.len(), 2);
    assert_eq!(report.sources[0].fetched, 10);
    assert_eq!(report.sources[0].capped, 8);
}

#[tokio::test]
async fn test_dev_mode_cap_counts_successes() {
    let source = MockSource::new("board").with_listings(10);
    let summarizer =
        MockSummarizer::new().always_failing(source.listing_url(0), MockFailure::Fatal);

    let report = Pipeline::builder()
        .source(source)
        .summarizer(summarizer.clone())
        .sink(MemorySink::new())
        .config(PipelineConfig::new().with_dev_mode(2))
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(summarizer.call_count(), 3);
    assert_eq!(report.jobs.len(), 2);
    assert_eq!(report.sources[0].dropped, 1);
    assert_eq!(report.sources[0].capped, 7);
}

#[tokio::test]
async fn test_dev_mode_cap_is_per_source() {
    let report = Pipeline::builder()
        .source(MockSource::new("a").with_listings(5))
        .source(MockSource::new("b").with_listings(5))
        .summarizer(MockSummarizer::new())
        .sink(MemorySink::new())
        .config(PipelineConfig::new().with_dev_mode(2))
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(report.jobs.len(), 4);
    assert!(report.sources.iter().all(|s| s.summarized == 2));
}

#[tokio::test]
async fn test_missing_salary_escalates_to_full_input() {
    let source = MockSource::new("board").with_listings(2);
    let hidden = source.listing_url(0);
    let visible = source.listing_url(1);
    let summarizer = MockSummarizer::new()
        .with_full_input_salary(&hidden, 120_000)
        .with_salary(&visible, 60_000);

    let report = Pipeline::builder()
        .source(source)
        .summarizer(summarizer.clone())
        .sink(MemorySink::new())
        .config(PipelineConfig::new().with_retry_on_missing_salary(true))
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(report.sources[0].escalations, 1);
    assert_eq!(summarizer.calls_for(&hidden), 2);
    assert_eq!(summarizer.calls_for(&visible), 1);

    let full_calls: Vec<_> = summarizer
        .calls()
        .into_iter()
        .filter(|c| c.detail == InputDetail::Full)
        .collect();
    assert_eq!(full_calls.len(), 1);
    assert_eq!(full_calls[0].url, hidden);

    assert_eq!(report.jobs[0].url, hidden);
    assert_eq!(report.jobs[0].salary_upper, Some(120_000));
}

#[tokio::test]
async fn test_missing_salary_kept_when_escalation_disabled() {
    let source = MockSource::new("board").with_listings(1);
    let url = source.listing_url(0);
    let summarizer = MockSummarizer::new().with_full_input_salary(&url, 120_000);

    let report = Pipeline::builder()
        .source(source)
        .summarizer(summarizer.clone())
        .sink(MemorySink::new())
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(summarizer.calls_for(&url), 1);
    assert_eq!(report.sources[0].escalations, 0);
    assert_eq!(report.jobs[0].salary_upper, None);
    assert_eq!(report.jobs[0].salary, "Unknown Salary");
}

#[tokio::test]
async fn test_duplicate_listings_collapse() {
    let source = MockSource::new("board")
        .with_raw(RawJob::new("board", "https://board.example.com/1", "Rust").with_id("dup"))
        .with_raw(RawJob::new("board", "https://board.example.com/1?ref=x", "Rust").with_id("dup"))
        .with_raw(RawJob::new("board", "https://board.example.com/2", "Go").with_id("other"));
    let sink = MemorySink::new();

    let report = Pipeline::builder()
        .source(source)
        .summarizer(MockSummarizer::new())
        .sink(sink.clone())
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(report.duplicates, 1);
    assert_eq!(report.jobs.len(), 2);
    assert_eq!(sink.len(), 2);
    assert!(sink.contains(&JobKey::new("board", "dup")));
}

#[tokio::test(start_paused = true)]
async fn test_summarize_concurrency_is_shared_across_sources() {
    let summarizer = MockSummarizer::new().with_delay(Duration::from_millis(100));

    let report = Pipeline::builder()
        .source(MockSource::new("a").with_listings(4))
        .source(MockSource::new("b").with_listings(4))
        .summarizer(summarizer.clone())
        .sink(MemorySink::new())
        .config(PipelineConfig::new().with_summarize_concurrency(2))
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(report.jobs.len(), 8);
    assert!(summarizer.peak_concurrency() <= 2);
    assert!(summarizer.peak_concurrency() >= 1);
}

#[tokio::test]
async fn test_single_worker_matches_parallel_run() {
    let run = |workers: usize| async move {
        Pipeline::builder()
            .source(MockSource::new("a").with_listings(3))
            .source(MockSource::new("b").with_listings(3))
            .summarizer(MockSummarizer::new())
            .sink(MemorySink::new())
            .config(PipelineConfig::new().with_max_workers(workers))
            .build()
            .unwrap()
            .run()
            .await
    };

    let sequential = run(1).await;
    let parallel = run(4).await;

    assert_eq!(sequential.jobs, parallel.jobs);
    assert_eq!(sequential.jobs.len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_worker_pool_width_is_min_of_workers_and_sources() {
    let peak = |workers: usize, sources: usize| async move {
        let gauge = ConcurrencyGauge::new();
        let mut builder = Pipeline::builder()
            .summarizer(MockSummarizer::new())
            .sink(MemorySink::new())
            .config(PipelineConfig::new().with_max_workers(workers));
        for i in 0..sources {
            builder = builder.source(
                MockSource::new(format!("board{i}"))
                    .with_listings(1)
                    .with_delay(Duration::from_secs(1))
                    .with_gauge(&gauge),
            );
        }

        let report = builder.build().unwrap().run().await;
        assert_eq!(report.jobs.len(), sources);
        gauge.peak()
    };

    assert_eq!(peak(1, 3).await, 1);
    assert_eq!(peak(2, 4).await, 2);
    assert_eq!(peak(8, 3).await, 3);
}

#[tokio::test]
async fn test_same_id_on_two_sources_is_not_a_duplicate() {
    let report = Pipeline::builder()
        .source(MockSource::new("a").with_raw(RawJob::new("a", "https://a/1", "Rust").with_id("7")))
        .source(MockSource::new("b").with_raw(RawJob::new("b", "https://b/1", "Rust").with_id("7")))
        .summarizer(MockSummarizer::new())
        .sink(MemorySink::new())
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(report.duplicates, 0);
    assert_eq!(report.jobs.len(), 2);
}

#[tokio::test]
async fn test_failing_sink_does_not_block_others() {
    let failing = FailingSink::new("readonly");
    let memory = MemorySink::new();

    let report = Pipeline::builder()
        .source(MockSource::new("board").with_listings(3))
        .summarizer(MockSummarizer::new())
        .sink(failing.clone())
        .sink(memory.clone())
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(failing.attempts(), 3);
    assert_eq!(memory.len(), 3);
    assert!(!report.all_sinks_succeeded());

    let readonly = report.sink("readonly").unwrap();
    assert_eq!(readonly.failed, 3);
    assert!(readonly.error.is_some());
    assert!(report.sink("memory").unwrap().is_success());
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_rerun_into_same_tsv_adds_no_rows() {
    let path = temp_path("rerun.tsv");

    for _ in 0..2 {
        let report = Pipeline::builder()
            .source(MockSource::new("board").with_listings(2))
            .summarizer(MockSummarizer::new())
            .sink(TsvSink::open(&path).await.unwrap())
            .build()
            .unwrap()
            .run()
            .await;
        assert_eq!(report.jobs.len(), 2);
    }

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.starts_with("ID\tSource\tTitle"));

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn test_rerun_into_same_memory_sink_is_idempotent() {
    let sink = MemorySink::new();

    for _ in 0..2 {
        Pipeline::builder()
            .source(MockSource::new("board").with_listings(2))
            .summarizer(MockSummarizer::new())
            .sink(sink.clone())
            .build()
            .unwrap()
            .run()
            .await;
    }

    assert_eq!(sink.len(), 2);
    assert_eq!(sink.flush_count(), 2);
}

#[test]
fn test_builder_rejects_incomplete_pipelines() {
    assert!(matches!(
        Pipeline::builder()
            .summarizer(MockSummarizer::new())
            .sink(MemorySink::new())
            .build(),
        Err(PipelineError::NoSources)
    ));

    assert!(matches!(
        Pipeline::builder()
            .source(MockSource::new("a"))
            .summarizer(MockSummarizer::new())
            .build(),
        Err(PipelineError::NoSinks)
    ));

    assert!(matches!(
        Pipeline::builder()
            .source(MockSource::new("a"))
            .sink(MemorySink::new())
            .build(),
        Err(PipelineError::NoSummarizer)
    ));

    assert!(matches!(
        Pipeline::builder()
            .source(MockSource::new("a"))
            .source(MockSource::new("a"))
            .summarizer(MockSummarizer::new())
            .sink(MemorySink::new())
            .build(),
        Err(PipelineError::InvalidConfig { .. })
    ));

    assert!(matches!(
        Pipeline::builder()
            .source(MockSource::new("a"))
            .summarizer(MockSummarizer::new())
            .sink(MemorySink::new())
            .config(PipelineConfig::new().with_max_workers(0))
            .build(),
        Err(PipelineError::InvalidConfig { .. })
    ));
}

#[test]
fn test_builder_does_not_touch_collaborators() {
    let source = MockSource::new("a").with_listings(1);
    let summarizer = MockSummarizer::new();

    let _ = Pipeline::builder()
        .source(source.clone())
        .summarizer(summarizer.clone())
        .build();

    assert_eq!(source.call_count(), 0);
    assert_eq!(summarizer.call_count(), 0);
}
