// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregates per-phase test events into finalized test reports.
//!
//! The main structure in this module is [`XrayReporter`]. A host test runner creates one per run,
//! feeds it events as each test's phases complete, and [drains](XrayReporter::drain) the finished
//! reports at the end of the run.

use crate::{
    config::XrayConfig,
    errors::{ConfigurationError, ReconciliationConflict, ReporterError},
    outcome::{PhaseOutcome, StatusMapping, TestPhase, reconcile},
};
use bytesize::ByteSize;
use chrono::{DateTime, FixedOffset};
use std::{
    collections::HashMap,
    mem,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, warn};
use xray_report::{Evidence, TestReport, XrayResult};

/// An event produced by the host test runner for a single test.
#[derive(Clone, Debug)]
pub struct TestEvent<'a> {
    /// The runner-assigned identity of the test, stable across its phases.
    pub identity: &'a str,

    /// The kind of event.
    pub kind: TestEventKind,
}

/// The kind of a [`TestEvent`].
#[derive(Clone, Debug)]
pub enum TestEventKind {
    /// The test is marked for reporting to Xray.
    Registered {
        /// The key of the test ticket.
        test_key: String,

        /// The key of the execution ticket, if the test names one.
        test_exec_key: Option<String>,
    },

    /// A phase of the test finished.
    ///
    /// The test is finalized when its teardown phase finishes.
    PhaseFinished {
        /// The phase that finished.
        phase: TestPhase,

        /// The outcome of the phase.
        outcome: PhaseOutcome,

        /// When the phase started.
        start: DateTime<FixedOffset>,

        /// When the phase finished.
        stop: DateTime<FixedOffset>,
    },

    /// Evidence was attached to the test.
    EvidenceAttached {
        /// The evidence.
        evidence: Evidence,
    },

    /// A named result was attached to the test.
    ResultAttached {
        /// The result.
        result: XrayResult,
    },

    /// A comment was set on the test.
    CommentSet {
        /// The comment.
        comment: String,
    },
}

/// Where a test is in its reporting lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TestState {
    /// Nothing is known about the test: it isn't marked for reporting.
    Unseen,

    /// The test is marked for reporting, but none of its phases have finished.
    Registered,

    /// At least one phase has finished; waiting for teardown.
    AwaitingTeardown,

    /// A report was produced for the test. No further events are accepted.
    Finalized,
}

/// Run-scoped aggregator of test outcomes, evidence and results.
///
/// All methods take `&self`: state is behind a single coarse lock, so hosts that run tests on
/// several threads can share one reporter.
#[derive(Debug)]
pub struct XrayReporter {
    state: Mutex<ReporterState>,
}

impl XrayReporter {
    /// Creates a new reporter for one run.
    pub fn new(config: &XrayConfig) -> Self {
        Self {
            state: Mutex::new(ReporterState {
                default_test_exec_key: config.default_test_exec_key().map(str::to_owned),
                status_mapping: config.status_mapping(),
                max_evidence_size: config.max_evidence_size(),
                tests: HashMap::new(),
                finished: vec![],
            }),
        }
    }

    /// Marks a test for reporting.
    ///
    /// If `test_exec_key` is `None`, the configured run-wide default is used. If there is no
    /// default either, this fails with [`ConfigurationError::MissingTestExecKey`].
    pub fn register_ticket(
        &self,
        identity: &str,
        test_key: impl Into<String>,
        test_exec_key: Option<String>,
    ) -> Result<(), ReporterError> {
        self.lock()?.register(identity, test_key.into(), test_exec_key)
    }

    /// Records the outcome of one phase of a test.
    ///
    /// `timestamp` is the time the phase started; the earliest one becomes the test's start time
    /// when finalized through [`Self::handle_event`]. Does nothing for tests that aren't registered.
    pub fn record_phase(
        &self,
        identity: &str,
        phase: TestPhase,
        outcome: PhaseOutcome,
        timestamp: impl Into<DateTime<FixedOffset>>,
    ) -> Result<(), ReporterError> {
        self.lock()?
            .record_phase(identity, phase, outcome, timestamp.into())
    }

    /// Attaches evidence to a test. Does nothing for tests that aren't registered.
    pub fn attach_evidence(&self, identity: &str, evidence: Evidence) -> Result<(), ReporterError> {
        self.lock()?.attach_evidence(identity, evidence)
    }

    /// Attaches a named result to a test. Does nothing for tests that aren't registered.
    pub fn attach_result(&self, identity: &str, result: XrayResult) -> Result<(), ReporterError> {
        self.lock()?.attach_result(identity, result)
    }

    /// Sets the comment of a test, replacing any earlier one. Does nothing for tests that aren't
    /// registered.
    pub fn set_comment(
        &self,
        identity: &str,
        comment: impl Into<String>,
    ) -> Result<(), ReporterError> {
        self.lock()?.set_comment(identity, comment.into())
    }

    /// Finalizes a test, producing its report.
    ///
    /// Returns `Ok(None)` if the test isn't registered. The teardown phase must have been recorded
    /// first; until then this fails with [`ReporterError::TeardownNotRecorded`] and the test stays
    /// pending. Finalizing a test twice is an error.
    pub fn finalize(
        &self,
        identity: &str,
        start: impl Into<DateTime<FixedOffset>>,
        stop: impl Into<DateTime<FixedOffset>>,
    ) -> Result<Option<TestReport>, ReporterError> {
        self.lock()?.finalize(identity, start.into(), stop.into())
    }

    /// Handles an event from the host test runner.
    ///
    /// When the teardown phase of a registered test finishes, the test is finalized: it starts when
    /// its first recorded phase started and stops when teardown stopped. The new report is
    /// returned.
    pub fn handle_event(&self, event: TestEvent<'_>) -> Result<Option<TestReport>, ReporterError> {
        let mut state = self.lock()?;
        let identity = event.identity;

        match event.kind {
            TestEventKind::Registered {
                test_key,
                test_exec_key,
            } => state.register(identity, test_key, test_exec_key)?,
            TestEventKind::PhaseFinished {
                phase,
                outcome,
                start,
                stop,
            } => {
                state.record_phase(identity, phase, outcome, start)?;
                if phase == TestPhase::Teardown {
                    let start = state.started_at(identity).unwrap_or(start);
                    return state.finalize(identity, start, stop);
                }
            }
            TestEventKind::EvidenceAttached { evidence } => {
                state.attach_evidence(identity, evidence)?
            }
            TestEventKind::ResultAttached { result } => state.attach_result(identity, result)?,
            TestEventKind::CommentSet { comment } => state.set_comment(identity, comment)?,
        }

        Ok(None)
    }

    /// Returns a handle for attaching evidence and results to one test, suitable for passing to
    /// the test body.
    pub fn attachments<'a>(&'a self, identity: &'a str) -> TestAttachments<'a> {
        TestAttachments {
            reporter: self,
            identity,
        }
    }

    /// Returns the outcome reconciled so far for a test, if any phase has been recorded.
    pub fn reconciled_outcome(&self, identity: &str) -> Result<Option<PhaseOutcome>, ReporterError> {
        let state = self.lock()?;
        Ok(match state.tests.get(identity) {
            Some(TestEntry::Pending(test)) => test.outcome,
            Some(TestEntry::Finalized) | None => None,
        })
    }

    /// Returns where a test is in its reporting lifecycle.
    pub fn test_state(&self, identity: &str) -> Result<TestState, ReporterError> {
        let state = self.lock()?;
        Ok(match state.tests.get(identity) {
            None => TestState::Unseen,
            Some(TestEntry::Pending(test)) if test.outcome.is_none() => TestState::Registered,
            Some(TestEntry::Pending(_)) => TestState::AwaitingTeardown,
            Some(TestEntry::Finalized) => TestState::Finalized,
        })
    }

    /// Returns all reports finalized so far, in the order they were finalized, and clears them.
    ///
    /// Tests still awaiting teardown never produce a report.
    pub fn drain(&self) -> Result<Vec<TestReport>, ReporterError> {
        let mut state = self.lock()?;

        let unfinished = state
            .tests
            .values()
            .filter(|entry| matches!(entry, TestEntry::Pending(test) if test.outcome.is_some()))
            .count();
        if unfinished > 0 {
            warn!(
                "{unfinished} {} never finished teardown and will not be reported",
                if unfinished == 1 { "test" } else { "tests" },
            );
        }

        let finished = mem::take(&mut state.finished);
        debug!("drained {} finished test reports", finished.len());
        Ok(finished)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReporterState>, ReporterError> {
        self.state.lock().map_err(|_| ReporterError::Poisoned)
    }
}

/// Attaches evidence and results to a single test.
///
/// Returned by [`XrayReporter::attachments`].
#[derive(Clone, Copy, Debug)]
pub struct TestAttachments<'a> {
    reporter: &'a XrayReporter,
    identity: &'a str,
}

impl TestAttachments<'_> {
    /// Attaches a file's contents as evidence. Text is stored as UTF-8.
    pub fn evidence(
        &self,
        filename: impl AsRef<str>,
        data: impl Into<Vec<u8>>,
    ) -> Result<(), ReporterError> {
        self.reporter
            .attach_evidence(self.identity, Evidence::new(filename, data))
    }

    /// Attaches a named chunk of text with its own status.
    pub fn result(
        &self,
        name: impl Into<String>,
        log: impl Into<String>,
        status: impl Into<String>,
    ) -> Result<(), ReporterError> {
        self.reporter
            .attach_result(self.identity, XrayResult::new(name, log, status))
    }
}

#[derive(Debug)]
struct ReporterState {
    default_test_exec_key: Option<String>,
    status_mapping: StatusMapping,
    max_evidence_size: ByteSize,
    tests: HashMap<String, TestEntry>,
    finished: Vec<TestReport>,
}

#[derive(Debug)]
enum TestEntry {
    Pending(PendingTest),
    Finalized,
}

#[derive(Debug, Default)]
struct PendingTest {
    test_key: String,
    test_exec_key: String,
    // Indexed by `TestPhase::index`.
    phase_outcomes: [Option<PhaseOutcome>; 3],
    outcome: Option<PhaseOutcome>,
    started_at: Option<DateTime<FixedOffset>>,
    evidences: Vec<Evidence>,
    results: Vec<XrayResult>,
    comment: Option<String>,
}

impl ReporterState {
    fn register(
        &mut self,
        identity: &str,
        test_key: String,
        test_exec_key: Option<String>,
    ) -> Result<(), ReporterError> {
        match self.tests.get(identity) {
            Some(TestEntry::Pending(test)) => {
                return Err(ReporterError::AlreadyRegistered {
                    identity: identity.to_owned(),
                    test_key: test.test_key.clone(),
                });
            }
            Some(TestEntry::Finalized) => {
                return Err(ReporterError::AlreadyFinalized {
                    identity: identity.to_owned(),
                });
            }
            None => {}
        }

        let test_exec_key = test_exec_key
            .filter(|key| !key.is_empty())
            .or_else(|| self.default_test_exec_key.clone())
            .ok_or_else(|| ConfigurationError::MissingTestExecKey {
                identity: identity.to_owned(),
                test_key: test_key.clone(),
            })?;

        debug!("registered test `{identity}` as {test_key} in execution {test_exec_key}");
        self.tests.insert(
            identity.to_owned(),
            TestEntry::Pending(PendingTest {
                test_key,
                test_exec_key,
                ..Default::default()
            }),
        );
        Ok(())
    }

    fn record_phase(
        &mut self,
        identity: &str,
        phase: TestPhase,
        outcome: PhaseOutcome,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<(), ReporterError> {
        let Some(test) = pending_mut(&mut self.tests, identity)? else {
            return Ok(());
        };

        let slot = &mut test.phase_outcomes[phase.index()];
        if let Some(previous) = *slot {
            return Err(ReconciliationConflict {
                identity: identity.to_owned(),
                phase,
                previous,
                incoming: outcome,
            }
            .into());
        }
        *slot = Some(outcome);

        test.outcome = Some(reconcile(test.outcome, outcome));
        test.started_at = Some(match test.started_at {
            Some(started_at) => started_at.min(timestamp),
            None => timestamp,
        });
        Ok(())
    }

    fn attach_evidence(&mut self, identity: &str, evidence: Evidence) -> Result<(), ReporterError> {
        let limit = self.max_evidence_size;
        let Some(test) = pending_mut(&mut self.tests, identity)? else {
            return Ok(());
        };

        let size = ByteSize::b(evidence.len() as u64);
        if size > limit {
            return Err(ReporterError::EvidenceTooLarge {
                identity: identity.to_owned(),
                filename: evidence.filename().to_owned(),
                size,
                limit,
            });
        }
        test.evidences.push(evidence);
        Ok(())
    }

    fn attach_result(&mut self, identity: &str, result: XrayResult) -> Result<(), ReporterError> {
        if let Some(test) = pending_mut(&mut self.tests, identity)? {
            test.results.push(result);
        }
        Ok(())
    }

    fn set_comment(&mut self, identity: &str, comment: String) -> Result<(), ReporterError> {
        if let Some(test) = pending_mut(&mut self.tests, identity)? {
            test.comment = Some(comment);
        }
        Ok(())
    }

    fn started_at(&self, identity: &str) -> Option<DateTime<FixedOffset>> {
        match self.tests.get(identity) {
            Some(TestEntry::Pending(test)) => test.started_at,
            Some(TestEntry::Finalized) | None => None,
        }
    }

    fn finalize(
        &mut self,
        identity: &str,
        start: DateTime<FixedOffset>,
        stop: DateTime<FixedOffset>,
    ) -> Result<Option<TestReport>, ReporterError> {
        let Some(entry) = self.tests.get_mut(identity) else {
            debug!("test `{identity}` is not marked for Xray reporting, skipping");
            return Ok(None);
        };
        let test = match entry {
            TestEntry::Pending(test) => test,
            TestEntry::Finalized => {
                return Err(ReporterError::AlreadyFinalized {
                    identity: identity.to_owned(),
                });
            }
        };
        let outcome = match (test.phase_outcomes[TestPhase::Teardown.index()], test.outcome) {
            (Some(_), Some(outcome)) => outcome,
            _ => {
                return Err(ReporterError::TeardownNotRecorded {
                    identity: identity.to_owned(),
                });
            }
        };
        let test = mem::take(test);
        *entry = TestEntry::Finalized;

        let status = self.status_mapping.status_for(outcome);
        let mut report = TestReport::new(test.test_key, test.test_exec_key, status, start, stop);
        report
            .add_evidences(test.evidences)
            .add_results(test.results);
        if let Some(comment) = test.comment {
            report.set_comment(comment);
        }

        debug!(
            "finalized test `{identity}` ({}) with status {status}",
            report.test_key
        );
        self.finished.push(report.clone());
        Ok(Some(report))
    }
}

/// Returns the pending state for a test, `None` if it isn't registered, or an error if it was
/// already finalized.
fn pending_mut<'a>(
    tests: &'a mut HashMap<String, TestEntry>,
    identity: &str,
) -> Result<Option<&'a mut PendingTest>, ReporterError> {
    match tests.get_mut(identity) {
        Some(TestEntry::Pending(test)) => Ok(Some(test)),
        Some(TestEntry::Finalized) => Err(ReporterError::AlreadyFinalized {
            identity: identity.to_owned(),
        }),
        None => Ok(None),
    }
}
