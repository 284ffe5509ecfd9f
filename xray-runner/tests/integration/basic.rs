// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use serde_json::json;
use xray_report::{ExecutionSummary, TestStatus};
use xray_runner::{
    errors::{ConfigurationError, ReporterError},
    outcome::{PhaseOutcome, TestPhase},
    reporter::{TestEvent, TestEventKind, TestState, XrayReporter},
};

const PASSED: [PhaseOutcome; 3] = [PhaseOutcome::Passed; 3];

#[test]
fn full_run_is_published_per_execution() {
    test_init();

    let config = config(indoc! {r#"
        base-url = "https://jira.example.com/"
        default-test-exec-key = "EXEC-1"

        [execution-info]
        summary = "Nightly regression"
        test-environments = ["linux"]
    "#});
    let reporter = XrayReporter::new(&config);

    run_test(&reporter, "tests::login", "PROJ-1", None, PASSED, 0);

    let attachments = reporter.attachments("tests::checkout");
    reporter
        .register_ticket("tests::checkout", "PROJ-2", Some("EXEC-2".to_owned()))
        .unwrap();
    attachments.evidence("logs/out.txt", "hello").unwrap();
    attachments
        .result("assertion", "expected 2, got 3", "FAIL")
        .unwrap();
    reporter
        .set_comment("tests::checkout", "flaky on CI")
        .unwrap();
    for (phase, outcome) in [
        (TestPhase::Setup, PhaseOutcome::Passed),
        (TestPhase::Call, PhaseOutcome::Failed),
        (TestPhase::Teardown, PhaseOutcome::Passed),
    ] {
        reporter
            .handle_event(TestEvent {
                identity: "tests::checkout",
                kind: TestEventKind::PhaseFinished {
                    phase,
                    outcome,
                    start: at(10),
                    stop: at(12),
                },
            })
            .unwrap();
    }

    run_test(
        &reporter,
        "tests::search",
        "PROJ-3",
        None,
        [
            PhaseOutcome::Skipped,
            PhaseOutcome::Skipped,
            PhaseOutcome::Passed,
        ],
        20,
    );

    // Not marked for reporting.
    reporter
        .handle_event(TestEvent {
            identity: "tests::unmarked",
            kind: TestEventKind::PhaseFinished {
                phase: TestPhase::Teardown,
                outcome: PhaseOutcome::Failed,
                start: at(30),
                stop: at(31),
            },
        })
        .unwrap();
    assert_eq!(
        reporter.test_state("tests::unmarked").unwrap(),
        TestState::Unseen
    );

    let reports = reporter.drain().unwrap();
    let statuses: Vec<_> = reports
        .iter()
        .map(|report| (report.test_key.as_str(), report.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("PROJ-1", TestStatus::Pass),
            ("PROJ-2", TestStatus::Fail),
            ("PROJ-3", TestStatus::Todo),
        ]
    );

    let transport = RecordingTransport::new();
    let outcome = publisher(&config, &transport).publish(reports).unwrap();
    assert_eq!(outcome.published, vec!["EXEC-1", "EXEC-2"]);
    assert!(outcome.is_success());

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(
            request.url,
            "https://jira.example.com/raven/1.0/import/execution"
        );
        assert_eq!(
            request.authorization,
            "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ="
        );
    }

    assert_eq!(
        requests[0].document,
        json!({
            "testExecutionKey": "EXEC-1",
            "info": {
                "summary": "Nightly regression",
                "description": "",
                "testEnvironments": ["linux"],
            },
            "tests": [
                {
                    "testKey": "PROJ-1",
                    "status": "PASS",
                    "start": "2024-03-01T12:00:00+02:00",
                    "finish": "2024-03-01T12:00:03+02:00",
                    "evidences": [],
                    "results": [],
                },
                {
                    "testKey": "PROJ-3",
                    "status": "TODO",
                    "start": "2024-03-01T12:00:20+02:00",
                    "finish": "2024-03-01T12:00:23+02:00",
                    "evidences": [],
                    "results": [],
                },
            ],
        })
    );

    assert_eq!(
        requests[1].document["tests"],
        json!([{
            "testKey": "PROJ-2",
            "status": "FAIL",
            "start": "2024-03-01T12:00:10+02:00",
            "finish": "2024-03-01T12:00:12+02:00",
            "evidences": [{ "filename": "logs_out.txt", "data": "aGVsbG8=" }],
            "results": [{ "name": "assertion", "log": "expected 2, got 3", "status": "FAIL" }],
            "comment": "flaky on CI",
        }])
    );

    // The posted document parses back into the summary that was built.
    let bytes = serde_json::to_vec(&requests[1].document).unwrap();
    let summary = ExecutionSummary::from_slice(&bytes).unwrap();
    assert_eq!(summary.test_execution_key, "EXEC-2");
    assert_eq!(summary.tests[0].test_exec_key, "EXEC-2");
}

#[test]
fn no_marked_tests_means_no_requests() {
    test_init();

    let config = config("");
    let reporter = XrayReporter::new(&config);
    for identity in ["a", "b"] {
        for phase in [TestPhase::Setup, TestPhase::Call, TestPhase::Teardown] {
            let report = reporter
                .handle_event(TestEvent {
                    identity,
                    kind: TestEventKind::PhaseFinished {
                        phase,
                        outcome: PhaseOutcome::Passed,
                        start: at(0),
                        stop: at(1),
                    },
                })
                .unwrap();
            assert_eq!(report, None);
        }
    }

    let reports = reporter.drain().unwrap();
    assert!(reports.is_empty());

    let transport = RecordingTransport::new();
    let outcome = publisher(&config, &transport).publish(reports).unwrap();
    assert!(outcome.published.is_empty());
    assert!(transport.requests().is_empty());
}

#[test]
fn missing_exec_key_fails_at_registration() {
    test_init();

    let reporter = XrayReporter::new(&config(""));
    let err = reporter
        .register_ticket("tests::orphan", "PROJ-9", None)
        .unwrap_err();
    match err {
        ReporterError::Configuration(ConfigurationError::MissingTestExecKey {
            identity,
            test_key,
        }) => {
            assert_eq!(identity, "tests::orphan");
            assert_eq!(test_key, "PROJ-9");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        reporter.test_state("tests::orphan").unwrap(),
        TestState::Unseen
    );
}

#[test]
fn teardown_never_arrives() {
    test_init();

    let reporter = XrayReporter::new(&config(r#"default-test-exec-key = "EXEC-1""#));
    reporter.register_ticket("stuck", "PROJ-1", None).unwrap();
    reporter
        .record_phase("stuck", TestPhase::Setup, PhaseOutcome::Passed, at(0))
        .unwrap();
    reporter
        .record_phase("stuck", TestPhase::Call, PhaseOutcome::Failed, at(1))
        .unwrap();
    assert_eq!(
        reporter.test_state("stuck").unwrap(),
        TestState::AwaitingTeardown
    );
    assert_eq!(
        reporter.reconciled_outcome("stuck").unwrap(),
        Some(PhaseOutcome::Failed)
    );

    assert!(reporter.drain().unwrap().is_empty());
}

#[test]
fn concurrent_tests_share_one_reporter() {
    test_init();

    let config = config(r#"default-test-exec-key = "EXEC-1""#);
    let reporter = XrayReporter::new(&config);
    let identities: Vec<String> = (0..16).map(|i| format!("tests::case_{i}")).collect();

    std::thread::scope(|scope| {
        for (i, identity) in identities.iter().enumerate() {
            let reporter = &reporter;
            scope.spawn(move || {
                let test_key = format!("PROJ-{i}");
                let outcomes = if i % 4 == 0 {
                    [
                        PhaseOutcome::Passed,
                        PhaseOutcome::Failed,
                        PhaseOutcome::Passed,
                    ]
                } else {
                    PASSED
                };
                run_test(reporter, identity, &test_key, None, outcomes, 0);
            });
        }
    });

    let reports = reporter.drain().unwrap();
    assert_eq!(reports.len(), identities.len());
    let failed = reports
        .iter()
        .filter(|report| report.status == TestStatus::Fail)
        .count();
    assert_eq!(failed, 4);
    for identity in &identities {
        assert_eq!(
            reporter.test_state(identity).unwrap(),
            TestState::Finalized
        );
    }

    let transport = RecordingTransport::new();
    publisher(&config, &transport).publish(reports).unwrap();
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].document["tests"].as_array().unwrap().len(),
        identities.len()
    );
}
