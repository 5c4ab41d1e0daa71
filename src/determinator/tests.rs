//! Scenario tests for the determinator against in-memory collaborators.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Duration;

use super::*;
use crate::config::Config;
use crate::memory::MemoryCollaborators;
use crate::ports::UrlSpec;
use crate::test_utils::{client, fixed_time, standard_record, status_record};
use crate::types::{
    CaseId, InvestigationHandle, InvestigationStatus::*, OriginTag, QueueName, ResumeToken,
    ReviewRecord, ScanId, StatusKey, SubInvestigationStatus, SubInvestigationType, VendorId,
    WorkflowDefinition, WorkflowRunStatus,
};

fn config() -> Config {
    Config {
        workflow_definition: Some(WorkflowDefinition::new("review")),
        ..Config::new()
    }
}

fn harness_with(config: Config) -> (Determinator<MemoryCollaborators>, MemoryCollaborators) {
    let ports = MemoryCollaborators::new();
    (Determinator::new(ports.clone(), Arc::new(config)), ports)
}

fn harness() -> (Determinator<MemoryCollaborators>, MemoryCollaborators) {
    harness_with(config())
}

fn error_queue() -> QueueName {
    config().error_queue
}

fn key(url: &str) -> StatusKey {
    StatusKey::new(client(), url)
}

fn submission(urls: &[&str]) -> Signal {
    Signal::Submission(SubmissionRequest {
        client_reference_group_id: client(),
        review_urls: BTreeMap::from([(
            "storefront".to_string(),
            urls.iter().map(|u| u.to_string()).collect(),
        )]),
        client_custom_information: Some("merchant-42".to_string()),
        source: None,
        retry_count: 0,
    })
}

fn scan(scan_type: SubInvestigationType, items: &[(&str, bool)]) -> Signal {
    Signal::VendorCallback(VendorScanBatch {
        scan_spec_list: vec![ScanSpec {
            scan_id: ScanId::new("scan-1"),
            scan_type,
            client_id: client(),
            vendor_id: VendorId::EverCompliant,
            created_date: None,
            scan_items: items
                .iter()
                .enumerate()
                .map(|(i, (url, reported))| {
                    (
                        format!("item-{i}"),
                        UrlSpec {
                            url: url.to_string(),
                            reported_url: *reported,
                            verdict: Some(SubInvestigationStatus::Compliant),
                            risk: None,
                        },
                    )
                })
                .collect(),
        }],
        retry_count: 3,
    })
}

fn monitoring(url: &str) -> Signal {
    scan(SubInvestigationType::AutoMonitoring, &[(url, true)])
}

fn verdict(url: &str, case: Option<u64>) -> Signal {
    Signal::Verdict(VerdictRequest {
        client_reference_group_id: client(),
        url: url.to_string(),
        investigation_status: Some(Compliant),
        review_info: Some("looks fine".to_string()),
        case_id: case.map(CaseId),
        retry_count: 0,
    })
}

fn review(
    handle: &str,
    sub_type: SubInvestigationType,
    token: Option<&str>,
    case: Option<u64>,
) -> ReviewRecord {
    ReviewRecord {
        investigation_handle: InvestigationHandle::new(handle),
        sub_investigation_type: sub_type,
        sub_investigation_status: SubInvestigationStatus::InReview,
        resume_token: token.map(ResumeToken::new),
        sub_investigation_id: case.map(CaseId),
        client_reference_group_id: client(),
        url: "http://foo.com".to_string(),
        review_start_time: fixed_time(),
        review_end_time: None,
        review_info: None,
    }
}

fn decisions(outcomes: &[Outcome]) -> Vec<&Decision> {
    outcomes.iter().map(|o| &o.decision).collect()
}

fn no_op(reason: NoOpReason) -> Decision {
    Decision::NoOp { reason }
}

// ─── Submission ───────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_submission_creates_record_and_starts() {
    let (det, ports) = harness();

    let outcomes = det.handle(submission(&["http://Example.com/"])).await.unwrap();

    assert!(matches!(outcomes[0].decision, Decision::Start { .. }));
    let record = ports.statuses.peek(&key("http://example.com")).unwrap();
    assert_eq!(record.investigation_status, InReview);
    assert!(record.investigation_handle.is_some());
    assert_eq!(
        record.variant_urls,
        Some(BTreeSet::from(["http://example.com/".to_string()]))
    );

    let started = ports.orchestrator.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].payload["investigationType"], "New_Investigation");
    assert_eq!(started[0].payload["clientCustomInformation"], "merchant-42");
    assert_eq!(record.investigation_handle, Some(started[0].handle.clone()));

    let published = ports.notifier.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].review_status, Some(InReview));
    assert_eq!(ports.metrics.count(Metric::SubmissionSucceeded), 1);
}

#[tokio::test]
async fn known_url_is_not_restarted() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));

    let outcomes = det.handle(submission(&["https://www.foo.com"])).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::AlreadyKnown)]);
    assert!(ports.orchestrator.started().is_empty());
    let record = ports.statuses.peek(&key("http://foo.com")).unwrap();
    assert_eq!(record.investigation_status, Compliant);
    assert!(record.variant_urls.unwrap().contains("https://www.foo.com"));
    // Current verdict is reported under every variant
    assert_eq!(ports.notifier.published().len(), 2);
}

#[tokio::test]
async fn literal_match_short_circuits() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(status_record("https://foo.com", NonCompliant));

    let outcomes = det.handle(submission(&["HTTPS://FOO.com"])).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::AlreadyKnown)]);
    assert!(ports.statuses.peek(&key("http://foo.com")).is_none());
}

#[tokio::test]
async fn inactive_record_is_reactivated_and_started() {
    let (det, ports) = harness();
    ports.statuses.seed(StatusRecord {
        is_active: false,
        ..standard_record("http://foo.com", Compliant, "run-0")
    });

    let outcomes = det.handle(submission(&["http://foo.com"])).await.unwrap();

    assert!(matches!(outcomes[0].decision, Decision::Start { .. }));
    let record = ports.statuses.peek(&key("http://foo.com")).unwrap();
    assert!(record.is_active);
    assert_eq!(record.investigation_status, InReview);
    assert!(
        ports
            .notifier
            .published()
            .iter()
            .any(|e| e.is_active == Some(true))
    );
}

#[tokio::test]
async fn failed_start_reverts_and_forwards_only_failed_url() {
    let (det, ports) = harness();
    ports.orchestrator.fail_start_next(1);

    let outcomes = det
        .handle(submission(&["http://a.com", "http://b.com"]))
        .await
        .unwrap();

    let failed: Vec<_> = outcomes.iter().filter(|o| o.is_forwarded()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.is_action()).count(), 1);

    let failed_url = failed[0].url.clone();
    let record = ports
        .statuses
        .peek(&key(&crate::canon::canonicalize(&failed_url)))
        .unwrap();
    assert_eq!(record.investigation_status, Unknown);

    let sent = ports.queue.sent(&error_queue());
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].origin, OriginTag::UrlReview);
    let body: serde_json::Value = serde_json::from_str(&sent[0].body).unwrap();
    assert_eq!(body["reviewURLsMetaData"]["storefront"], serde_json::json!([failed_url]));
    assert_eq!(ports.metrics.count(Metric::StartWorkflowError), 1);
    assert_eq!(ports.metrics.count(Metric::SubmissionFailed), 1);
}

#[tokio::test]
async fn unknown_record_is_retried_by_resubmission() {
    let (det, ports) = harness();
    ports.orchestrator.fail_start_next(1);
    det.handle(submission(&["http://a.com"])).await.unwrap();

    let outcomes = det.handle(submission(&["http://a.com"])).await.unwrap();

    assert!(matches!(outcomes[0].decision, Decision::Start { .. }));
    let record = ports.statuses.peek(&key("http://a.com")).unwrap();
    assert_eq!(record.investigation_status, InReview);
}

#[tokio::test]
async fn without_dedup_literal_record_is_written() {
    let (det, ports) = harness_with(Config {
        dedupe_variant_urls: false,
        ..config()
    });

    det.handle(submission(&["https://www.Foo.com/"])).await.unwrap();

    let record = ports.statuses.peek(&key("https://www.foo.com/")).unwrap();
    assert_eq!(record.normalized_url, "http://foo.com");
    assert!(record.variant_urls.is_none());
    assert!(ports.statuses.peek(&key("http://foo.com")).is_none());
}

#[tokio::test]
async fn without_dedup_concurrent_identical_submissions_start_once() {
    let (det, ports) = harness_with(Config {
        dedupe_variant_urls: false,
        ..config()
    });
    ports.statuses.interleave(true);

    let (a, b) = tokio::join!(
        det.handle(submission(&["http://a.com"])),
        det.handle(submission(&["http://a.com"])),
    );

    let outcomes: Vec<Outcome> = a.unwrap().into_iter().chain(b.unwrap()).collect();
    assert_eq!(outcomes.iter().filter(|o| o.is_action()).count(), 1);
    assert!(outcomes.contains(&Outcome::no_op("http://a.com", NoOpReason::AlreadyKnown)));
    assert_eq!(ports.orchestrator.started().len(), 1);
}

#[tokio::test]
async fn without_dedup_deboarded_literal_record_is_reactivated() {
    let (det, ports) = harness_with(Config {
        dedupe_variant_urls: false,
        ..config()
    });
    ports.statuses.seed(StatusRecord {
        is_active: false,
        deletion_time: Some(fixed_time()),
        ..status_record("https://www.foo.com/", Compliant)
    });

    let outcomes = det.handle(submission(&["https://www.foo.com/"])).await.unwrap();

    assert!(matches!(outcomes[0].decision, Decision::Start { .. }));
    let record = ports.statuses.peek(&key("https://www.foo.com/")).unwrap();
    assert!(record.is_active);
    assert_eq!(record.deletion_time, None);
    assert_eq!(record.investigation_status, InReview);
}

#[tokio::test]
async fn missing_workflow_definition_reverts_without_forwarding() {
    let (det, ports) = harness_with(Config::new());

    let outcomes = det.handle(submission(&["http://a.com"])).await.unwrap();

    assert_eq!(
        decisions(&outcomes),
        vec![&no_op(NoOpReason::WorkflowNotAvailable)]
    );
    assert_eq!(ports.metrics.count(Metric::WorkflowNotAvailable), 1);
    assert_eq!(
        ports.statuses.peek(&key("http://a.com")).unwrap().investigation_status,
        Unknown
    );
    assert!(ports.queue.sent(&error_queue()).is_empty());
}

#[tokio::test]
async fn empty_submission_is_invalid() {
    let (det, _) = harness();
    let err = det.handle(submission(&[])).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Validation(_)));
}

// ─── Vendor callbacks ─────────────────────────────────────────────────────

#[tokio::test]
async fn unreported_url_is_ignored() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));

    let outcomes = det
        .handle(scan(SubInvestigationType::AutoMonitoring, &[("http://foo.com", false)]))
        .await
        .unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::UnreportedUrl)]);
    assert!(ports.orchestrator.started().is_empty());
}

#[tokio::test]
async fn monitoring_without_record_is_metered() {
    let (det, ports) = harness();

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::NoStatusRecord)]);
    assert_eq!(ports.metrics.count(Metric::NoStatusRecord), 1);
}

#[tokio::test]
async fn monitoring_reopens_compliant_and_starts() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));
    ports
        .orchestrator
        .set_status(&InvestigationHandle::new("run-0"), WorkflowRunStatus::Succeeded);

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    let Decision::Start { handle } = &outcomes[0].decision else {
        panic!("expected start, got {outcomes:?}");
    };
    let record = ports.statuses.peek(&key("http://foo.com")).unwrap();
    assert_eq!(record.investigation_status, CompliantToInReview);
    assert_eq!(record.investigation_handle.as_ref(), Some(handle));

    let started = ports.orchestrator.started();
    assert_eq!(started[0].payload["investigationType"], "Periodic_Investigation");
    assert_eq!(
        started[0].payload["scanSpec"]["scanItems"]["item-0"]["url"],
        "http://foo.com"
    );
}

#[tokio::test]
async fn replayed_monitoring_callback_starts_once() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", NonCompliant, "run-0"));
    ports
        .orchestrator
        .set_status(&InvestigationHandle::new("run-0"), WorkflowRunStatus::Succeeded);

    det.handle(monitoring("http://foo.com")).await.unwrap();
    let replay = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert_eq!(decisions(&replay), vec![&no_op(NoOpReason::WorkflowRunning)]);
    assert_eq!(ports.orchestrator.started().len(), 1);
    assert_eq!(
        ports.statuses.peek(&key("http://foo.com")).unwrap().investigation_status,
        NonCompliantToInReview
    );
}

#[tokio::test]
async fn monitoring_while_under_review_is_metered_per_status() {
    let (det, ports) = harness();
    ports.statuses.seed(StatusRecord {
        investigation_handle: None,
        ..standard_record("http://foo.com", CompliantToInReview, "unused")
    });

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::UnderReview)]);
    assert_eq!(
        ports
            .metrics
            .count(Metric::MonitoringUnderReview(CompliantToInReview)),
        1
    );
}

#[tokio::test]
async fn monitoring_with_unknown_status_is_metered() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Unknown, "run-0"));

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::StatusUnknown)]);
    assert_eq!(ports.metrics.count(Metric::InvestigationStatusMissing), 1);
}

#[tokio::test]
async fn status_query_failure_does_not_block_monitoring() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));
    ports.orchestrator.fail_status_next(1);

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert!(matches!(outcomes[0].decision, Decision::Start { .. }));
    assert_eq!(ports.metrics.count(Metric::WorkflowStatusError), 1);
}

#[tokio::test]
async fn monitoring_start_failure_reverts_and_forwards() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));
    ports
        .orchestrator
        .set_status(&InvestigationHandle::new("run-0"), WorkflowRunStatus::Succeeded);
    ports.orchestrator.fail_start_next(1);

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert!(outcomes[0].is_forwarded());
    assert_eq!(
        ports.statuses.peek(&key("http://foo.com")).unwrap().investigation_status,
        Compliant
    );
    let sent = ports.queue.sent(&error_queue());
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].origin, OriginTag::VendorResponse);
    let body: VendorScanBatch = serde_json::from_str(&sent[0].body).unwrap();
    assert_eq!(body.retry_count, 3);
    assert_eq!(body.scan_spec_list[0].scan_items.len(), 1);
}

#[tokio::test]
async fn lost_conditional_write_is_a_no_op() {
    let (det, ports) = harness();
    let loaded = standard_record("http://foo.com", Compliant, "run-0");
    ports
        .orchestrator
        .set_status(&InvestigationHandle::new("run-0"), WorkflowRunStatus::Succeeded);
    // Another writer reopened the record after we loaded it
    ports
        .statuses
        .seed(loaded.clone().with_status(CompliantToInReview));

    let Signal::VendorCallback(batch) = monitoring("http://foo.com") else {
        unreachable!()
    };
    let result = det.monitoring_scan(loaded, &batch.scan_spec_list[0]).await;

    assert!(matches!(
        result,
        Err(ReconcileError::StaleSignal(StaleReason::ConditionalWriteLost))
    ));
    assert!(ports.orchestrator.started().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_monitoring_triggers_start_exactly_once() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));
    ports
        .orchestrator
        .set_status(&InvestigationHandle::new("run-0"), WorkflowRunStatus::Succeeded);
    let det = Arc::new(det);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let det = Arc::clone(&det);
            tokio::spawn(async move { det.handle(monitoring("http://foo.com")).await })
        })
        .collect();

    let mut starts = 0;
    for task in tasks {
        let outcomes = task.await.unwrap().unwrap();
        starts += outcomes.iter().filter(|o| o.is_action()).count();
    }
    assert_eq!(starts, 1);
    assert_eq!(ports.orchestrator.started().len(), 1);
}

#[tokio::test]
async fn concurrent_variant_submissions_all_join_canonical_record() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));
    ports.statuses.interleave(true);

    let (a, b) = tokio::join!(
        det.handle(submission(&["https://foo.com"])),
        det.handle(submission(&["http://www.foo.com"])),
    );

    assert_eq!(decisions(&a.unwrap()), vec![&no_op(NoOpReason::AlreadyKnown)]);
    assert_eq!(decisions(&b.unwrap()), vec![&no_op(NoOpReason::AlreadyKnown)]);
    let record = ports.statuses.peek(&key("http://foo.com")).unwrap();
    assert_eq!(
        record.variant_urls,
        Some(BTreeSet::from([
            "http://foo.com".to_string(),
            "http://www.foo.com".to_string(),
            "https://foo.com".to_string(),
        ]))
    );
    assert!(ports.orchestrator.started().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_spellings_submitted_in_parallel_are_all_kept() {
    let (det, ports) = harness();
    let det = Arc::new(det);
    let spellings = [
        "https://foo.com",
        "http://www.foo.com",
        "https://www.foo.com",
        "http://foo.com/",
        "https://foo.com/",
        "http://www.foo.com/",
        "https://www.foo.com/",
    ];

    let tasks: Vec<_> = spellings
        .iter()
        .map(|url| {
            let det = Arc::clone(&det);
            let signal = submission(&[*url]);
            tokio::spawn(async move { det.handle(signal).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(ports.statuses.len(), 1);
    let record = ports.statuses.peek(&key("http://foo.com")).unwrap();
    let expected: BTreeSet<String> = spellings.iter().map(|u| u.to_string()).collect();
    assert_eq!(record.variant_urls, Some(expected));
    assert_eq!(ports.orchestrator.started().len(), 1);
}

#[tokio::test]
async fn monitoring_collapses_variants_first() {
    let (det, ports) = harness();
    for url in ["https://foo.com", "http://www.foo.com/", "https://www.foo.com"] {
        ports.statuses.seed(status_record(url, Compliant));
    }

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].url, "http://foo.com");
    assert_eq!(ports.statuses.len(), 1);
    let record = ports.statuses.peek(&key("http://foo.com")).unwrap();
    assert_eq!(record.investigation_status, CompliantToInReview);
    assert_eq!(record.variant_urls.unwrap().len(), 3);
    assert_eq!(ports.orchestrator.started().len(), 1);
}

#[tokio::test]
async fn conflicting_variants_are_processed_separately() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(status_record("https://foo.com", Compliant));
    ports
        .statuses
        .seed(status_record("http://www.foo.com", NonCompliant));

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(ports.statuses.len(), 2);
    assert_eq!(ports.orchestrator.started().len(), 2);
}

#[tokio::test]
async fn scan_without_review_record_leaves_status_alone() {
    let (det, ports) = harness();
    let record = standard_record("http://foo.com", Compliant, "H");
    ports.statuses.seed(record.clone());

    let outcomes = det
        .handle(scan(SubInvestigationType::Manual, &[("http://foo.com", true)]))
        .await
        .unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::NoReviewRecord)]);
    assert_eq!(ports.metrics.count(Metric::NoReviewRecord), 1);
    assert_eq!(ports.statuses.peek(&record.key()), Some(record));
}

#[tokio::test]
async fn scan_resumes_waiting_step_once() {
    let (det, ports) = harness();
    let record = standard_record("http://foo.com", InReview, "H");
    ports.statuses.seed(record.clone());
    ports.reviews.seed(review(
        "H",
        SubInvestigationType::AutoLightWeight,
        Some("token-abcdef123"),
        None,
    ));
    ports
        .orchestrator
        .issue_token(ResumeToken::new("token-abcdef123"));

    let signal = scan(SubInvestigationType::AutoLightWeight, &[("http://foo.com", true)]);
    let first = det.handle(signal.clone()).await.unwrap();
    let replay = det.handle(signal).await.unwrap();

    assert_eq!(decisions(&first), vec![&Decision::Resume]);
    assert_eq!(decisions(&replay), vec![&no_op(NoOpReason::ResumeTokenInvalid)]);
    assert_eq!(ports.metrics.count(Metric::DuplicateResume), 1);
    assert_eq!(ports.orchestrator.resumed().len(), 1);
    assert_eq!(ports.statuses.peek(&record.key()), Some(record));
}

#[tokio::test]
async fn scan_without_token_is_metered() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", InReview, "H"));
    ports
        .reviews
        .seed(review("H", SubInvestigationType::AutoHeavyWeight, None, None));

    let outcomes = det
        .handle(scan(SubInvestigationType::AutoHeavyWeight, &[("http://foo.com", true)]))
        .await
        .unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::NoResumeToken)]);
    assert_eq!(ports.metrics.count(Metric::NoResumeToken), 1);
}

#[tokio::test]
async fn scan_without_handle_is_metered() {
    let (det, ports) = harness();
    ports.statuses.seed(StatusRecord {
        investigation_handle: None,
        ..standard_record("http://foo.com", InReview, "unused")
    });

    let outcomes = det
        .handle(scan(SubInvestigationType::Manual, &[("http://foo.com", true)]))
        .await
        .unwrap();

    assert_eq!(
        decisions(&outcomes),
        vec![&no_op(NoOpReason::NoInvestigationHandle)]
    );
    assert_eq!(ports.metrics.count(Metric::InvestigationHandleMissing), 1);
}

#[tokio::test]
async fn resume_failure_forwards_single_item() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", InReview, "H"));
    ports
        .reviews
        .seed(review("H", SubInvestigationType::Manual, Some("tok"), None));
    ports.orchestrator.issue_token(ResumeToken::new("tok"));
    ports.orchestrator.fail_resume_next(1);

    let outcomes = det
        .handle(scan(
            SubInvestigationType::Manual,
            &[("http://foo.com", true), ("http://unrelated.com", false)],
        ))
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(ports.metrics.count(Metric::ResumeWorkflowError), 1);
    let sent = ports.queue.sent(&error_queue());
    assert_eq!(sent.len(), 1);
    let body: VendorScanBatch = serde_json::from_str(&sent[0].body).unwrap();
    let item = body.scan_spec_list[0].scan_items.values().next().unwrap();
    assert_eq!(item.url, "http://foo.com");
}

#[tokio::test]
async fn inactive_record_ignores_scans() {
    let (det, ports) = harness();
    ports.statuses.seed(StatusRecord {
        is_active: false,
        ..standard_record("http://foo.com", Compliant, "run-0")
    });

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::Inactive)]);
}

#[tokio::test]
async fn store_outage_forwards_callback() {
    let (det, ports) = harness();
    ports.statuses.fail_next(1);

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();

    assert!(outcomes[0].is_forwarded());
    assert_eq!(ports.queue.sent(&error_queue()).len(), 1);
}

// ─── Verdicts and appeals ─────────────────────────────────────────────────

#[tokio::test]
async fn verdict_without_case_is_invalid() {
    let (det, ports) = harness();
    let err = det.handle(verdict("http://foo.com", None)).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Validation(_)));
    assert_eq!(ports.metrics.count(Metric::VerdictFailed), 1);
}

#[tokio::test]
async fn verdict_resumes_latest_step_for_case() {
    let (det, ports) = harness();
    let older = ReviewRecord {
        review_start_time: fixed_time() - Duration::days(3),
        ..review("H-old", SubInvestigationType::Manual, Some("old-token"), Some(7))
    };
    ports.reviews.seed(older);
    ports
        .reviews
        .seed(review("H-new", SubInvestigationType::Manual, Some("new-token"), Some(7)));
    ports.orchestrator.issue_token(ResumeToken::new("new-token"));
    ports
        .orchestrator
        .set_status(&InvestigationHandle::new("H-new"), WorkflowRunStatus::Running);

    let outcomes = det.handle(verdict("http://foo.com", Some(7))).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&Decision::Resume]);
    let resumed = ports.orchestrator.resumed();
    assert_eq!(resumed[0].0, ResumeToken::new("new-token"));
    assert_eq!(resumed[0].1["caseId"], 7);
    assert_eq!(ports.metrics.count(Metric::VerdictSucceeded), 1);
}

#[tokio::test]
async fn verdict_with_spent_token_is_a_no_op() {
    let (det, ports) = harness();
    ports
        .reviews
        .seed(review("H", SubInvestigationType::Manual, Some("spent"), Some(7)));
    ports
        .orchestrator
        .set_status(&InvestigationHandle::new("H"), WorkflowRunStatus::Running);

    let outcomes = det.handle(verdict("http://foo.com", Some(7))).await.unwrap();

    assert_eq!(
        decisions(&outcomes),
        vec![&no_op(NoOpReason::ResumeTokenInvalid)]
    );
    assert_eq!(ports.metrics.count(Metric::InvalidResumeToken), 1);
    assert!(ports.queue.sent(&error_queue()).is_empty());
}

#[tokio::test]
async fn verdict_for_failed_run_starts_fresh_workflow() {
    let (det, ports) = harness();
    ports
        .reviews
        .seed(review("H", SubInvestigationType::Manual, Some("tok"), Some(7)));
    ports.orchestrator.issue_token(ResumeToken::new("tok"));
    ports
        .orchestrator
        .set_status(&InvestigationHandle::new("H"), WorkflowRunStatus::TimedOut);

    let outcomes = det.handle(verdict("http://foo.com", Some(7))).await.unwrap();

    assert!(matches!(outcomes[0].decision, Decision::Start { .. }));
    assert!(ports.orchestrator.resumed().is_empty());
    assert_eq!(
        ports.orchestrator.started()[0].payload["investigationType"],
        "Appeal"
    );
}

#[tokio::test]
async fn appeal_reopens_and_duplicate_is_dropped() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", NonCompliant, "run-0"));

    let first = det.handle(verdict("http://foo.com", Some(99))).await.unwrap();
    let duplicate = det.handle(verdict("http://foo.com", Some(99))).await.unwrap();

    assert!(matches!(first[0].decision, Decision::Escalate { .. }));
    assert_eq!(decisions(&duplicate), vec![&no_op(NoOpReason::NotAppealable)]);
    assert_eq!(
        ports.statuses.peek(&key("http://foo.com")).unwrap().investigation_status,
        NonCompliantToInReview
    );
    assert_eq!(ports.orchestrator.started().len(), 1);
    assert_eq!(ports.orchestrator.started()[0].payload["caseId"], 99);
    assert!(ports.queue.sent(&error_queue()).is_empty());
}

#[tokio::test]
async fn appeal_falls_back_to_canonical_record() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));

    let outcomes = det
        .handle(verdict("HTTPS://www.Foo.com/", Some(5)))
        .await
        .unwrap();

    assert!(matches!(outcomes[0].decision, Decision::Escalate { .. }));
    assert_eq!(
        ports.statuses.peek(&key("http://foo.com")).unwrap().investigation_status,
        CompliantToInReview
    );
}

#[tokio::test]
async fn appeal_without_dedup_needs_literal_record() {
    let (det, ports) = harness_with(Config {
        dedupe_variant_urls: false,
        ..config()
    });
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));

    let outcomes = det
        .handle(verdict("https://www.foo.com", Some(5)))
        .await
        .unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::NotAppealable)]);
}

#[tokio::test]
async fn appeal_start_failure_reverts_and_forwards() {
    let (det, ports) = harness();
    ports
        .statuses
        .seed(standard_record("http://foo.com", Compliant, "run-0"));
    ports.orchestrator.fail_start_next(1);

    let outcomes = det.handle(verdict("http://foo.com", Some(5))).await.unwrap();

    assert!(outcomes[0].is_forwarded());
    assert_eq!(
        ports.statuses.peek(&key("http://foo.com")).unwrap().investigation_status,
        Compliant
    );
    let sent = ports.queue.sent(&error_queue());
    assert_eq!(sent[0].origin, OriginTag::ManualResponse);
}

// ─── Deboard ──────────────────────────────────────────────────────────────

fn deboard(url: &str) -> Signal {
    Signal::Deboard(DeboardRequest {
        client_reference_group_id: client(),
        url: url.to_string(),
        retry_count: 0,
    })
}

fn merged_record() -> StatusRecord {
    StatusRecord {
        variant_urls: Some(BTreeSet::from([
            "http://foo.com".to_string(),
            "https://foo.com".to_string(),
        ])),
        ..standard_record("http://foo.com", Compliant, "run-0")
    }
}

#[tokio::test]
async fn deboard_soft_deletes_and_notifies_every_variant() {
    let (det, ports) = harness();
    ports.statuses.seed(merged_record());

    let outcomes = det.handle(deboard("HTTPS://foo.com")).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&Decision::Deboarded]);
    let record = ports.statuses.peek(&key("http://foo.com")).unwrap();
    assert!(!record.is_active);
    assert!(record.deletion_time.is_some());
    assert_eq!(record.investigation_status, Compliant);

    let deboards = ports.vendor.deboards();
    assert_eq!(deboards.len(), 1);
    assert_eq!(deboards[0].review_url, "HTTPS://foo.com");
    assert_eq!(deboards[0].sub_investigation_type, SubInvestigationType::AutoHeavyWeight);

    let published = ports.notifier.published_on(&config().notification_topic);
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|e| e.is_active == Some(false)));
    assert_eq!(ports.metrics.count(Metric::DeboardSucceeded), 1);
}

#[tokio::test]
async fn upfront_validation_url_is_deboarded_without_vendor() {
    let (det, ports) = harness();
    ports.statuses.seed(StatusRecord {
        sub_investigation_type: Some(SubInvestigationType::UpfrontValidation),
        ..merged_record()
    });

    let outcomes = det.handle(deboard("http://foo.com")).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&Decision::Deboarded]);
    assert!(ports.vendor.deboards().is_empty());
    assert!(!ports.statuses.peek(&key("http://foo.com")).unwrap().is_active);
}

#[tokio::test]
async fn deboard_of_unknown_url_is_metered() {
    let (det, ports) = harness();
    ports.statuses.seed(merged_record());

    // A spelling never submitted does not match the canonical record
    let outcomes = det.handle(deboard("https://www.foo.com")).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::NoStatusRecord)]);
    assert_eq!(ports.metrics.count(Metric::DeboardRecordNotFound), 1);
    assert!(ports.statuses.peek(&key("http://foo.com")).unwrap().is_active);
    assert!(ports.vendor.deboards().is_empty());
}

#[tokio::test]
async fn without_dedup_deboard_needs_literal_record() {
    let (det, ports) = harness_with(Config {
        dedupe_variant_urls: false,
        ..config()
    });
    ports.statuses.seed(merged_record());

    let outcomes = det.handle(deboard("https://foo.com")).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::NoStatusRecord)]);
}

#[tokio::test]
async fn repeated_deboard_is_a_no_op() {
    let (det, ports) = harness();
    ports.statuses.seed(merged_record());

    det.handle(deboard("https://foo.com")).await.unwrap();
    let outcomes = det.handle(deboard("https://foo.com")).await.unwrap();

    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::Inactive)]);
    assert_eq!(ports.vendor.deboards().len(), 1);
    assert_eq!(ports.notifier.published().len(), 2);
}

#[tokio::test]
async fn vendor_outage_forwards_deboard_and_keeps_record_active() {
    let (det, ports) = harness();
    ports.statuses.seed(merged_record());
    ports.vendor.fail_next(1);

    let outcomes = det.handle(deboard("https://foo.com")).await.unwrap();

    assert!(outcomes[0].is_forwarded());
    assert!(ports.statuses.peek(&key("http://foo.com")).unwrap().is_active);
    let sent = ports.queue.sent(&error_queue());
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].origin, OriginTag::UrlDeboard);
    assert_eq!(ports.metrics.count(Metric::DeboardFailed), 1);
    assert!(ports.notifier.published().is_empty());
}

#[tokio::test]
async fn vendor_rejection_drops_deboard() {
    let (det, ports) = harness();
    ports.statuses.seed(merged_record());
    ports.vendor.reject_next(1);

    let outcomes = det.handle(deboard("https://foo.com")).await.unwrap();

    assert!(matches!(outcomes[0].decision, Decision::Rejected { .. }));
    assert!(ports.queue.sent(&error_queue()).is_empty());
    assert!(ports.statuses.peek(&key("http://foo.com")).unwrap().is_active);
}

#[tokio::test]
async fn deboard_without_url_is_invalid() {
    let (det, _) = harness();
    let err = det.handle(deboard("  ")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Validation(_)));
}

#[tokio::test]
async fn deboarded_url_ignores_monitoring_until_resubmitted() {
    let (det, ports) = harness();
    ports.statuses.seed(merged_record());
    ports
        .orchestrator
        .set_status(&InvestigationHandle::new("run-0"), WorkflowRunStatus::Succeeded);
    det.handle(deboard("https://foo.com")).await.unwrap();

    let outcomes = det.handle(monitoring("http://foo.com")).await.unwrap();
    assert_eq!(decisions(&outcomes), vec![&no_op(NoOpReason::Inactive)]);
    assert!(ports.orchestrator.started().is_empty());

    let outcomes = det.handle(submission(&["https://foo.com"])).await.unwrap();
    assert!(matches!(outcomes[0].decision, Decision::Start { .. }));
    let record = ports.statuses.peek(&key("http://foo.com")).unwrap();
    assert!(record.is_active);
    assert_eq!(record.deletion_time, None);
    assert_eq!(record.investigation_status, InReview);
    assert!(
        ports
            .notifier
            .published()
            .iter()
            .any(|e| e.is_active == Some(true))
    );
}

#[test]
fn outcome_json_shape() {
    let outcome = Outcome::no_op("http://foo.com", NoOpReason::ConditionalWriteLost);
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "url": "http://foo.com",
            "decision": "no_op",
            "reason": "conditional_write_lost"
        })
    );
}
