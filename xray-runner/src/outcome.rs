// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folding per-phase outcomes into a single test status.
//!
//! A test runs in three phases: setup, call and teardown. Each phase reports its own
//! [`PhaseOutcome`], and [`reconcile`] folds them into one. A failing phase poisons the whole test,
//! then a skipped one; an expected failure only overrides passing phases.

use crate::errors::UnsupportedOutcomeError;
use serde::Deserialize;
use std::{fmt, str::FromStr};
use xray_report::TestStatus;

/// A phase in the lifecycle of a single test.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum TestPhase {
    /// Fixtures and other preconditions are set up.
    Setup,

    /// The test body runs.
    Call,

    /// Fixtures are torn down. The test is finalized once this phase reports.
    Teardown,
}

impl TestPhase {
    pub(crate) fn index(self) -> usize {
        match self {
            TestPhase::Setup => 0,
            TestPhase::Call => 1,
            TestPhase::Teardown => 2,
        }
    }

    /// Returns the name of this phase.
    pub fn as_str(self) -> &'static str {
        match self {
            TestPhase::Setup => "setup",
            TestPhase::Call => "call",
            TestPhase::Teardown => "teardown",
        }
    }
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome reported for one phase of a test.
///
/// Variants are declared in increasing priority, so `Ord` is the reconciliation order.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum PhaseOutcome {
    /// The phase passed.
    Passed,

    /// The phase failed, and the test was marked as expected to fail.
    ExpectedFailure,

    /// The phase was skipped.
    Skipped,

    /// The phase failed.
    Failed,
}

impl PhaseOutcome {
    /// String representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["passed", "expected_failure", "skipped", "failed"]
    }

    /// Returns the name of this outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseOutcome::Passed => "passed",
            PhaseOutcome::ExpectedFailure => "expected_failure",
            PhaseOutcome::Skipped => "skipped",
            PhaseOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseOutcome {
    type Err = UnsupportedOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let val = match s {
            "passed" => PhaseOutcome::Passed,
            "failed" => PhaseOutcome::Failed,
            "skipped" => PhaseOutcome::Skipped,
            "expected_failure" | "xfailed" => PhaseOutcome::ExpectedFailure,
            other => return Err(UnsupportedOutcomeError::new(other)),
        };
        Ok(val)
    }
}

/// Folds an incoming phase outcome into the outcome accumulated so far for a test.
///
/// The result depends only on the set of outcomes seen, never on their order:
///
/// 1. `Failed` if any phase failed,
/// 2. else `Skipped` if any phase was skipped,
/// 3. else `ExpectedFailure` if any phase failed as expected,
/// 4. else `Passed`.
pub fn reconcile(previous: Option<PhaseOutcome>, incoming: PhaseOutcome) -> PhaseOutcome {
    match previous {
        Some(previous) => previous.max(incoming),
        None => incoming,
    }
}

/// How reconciled outcomes are presented to Xray.
#[derive(Copy, Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct StatusMapping {
    /// The status used for skipped tests.
    pub skipped: SkippedStatus,

    /// The status used for tests that failed as expected.
    pub expected_failure: TestStatus,
}

impl StatusMapping {
    /// Returns the Xray status for a reconciled outcome.
    pub fn status_for(&self, outcome: PhaseOutcome) -> TestStatus {
        match outcome {
            PhaseOutcome::Passed => TestStatus::Pass,
            PhaseOutcome::Failed => TestStatus::Fail,
            PhaseOutcome::Skipped => self.skipped.into(),
            PhaseOutcome::ExpectedFailure => self.expected_failure,
        }
    }
}

impl Default for StatusMapping {
    fn default() -> Self {
        Self {
            skipped: SkippedStatus::Todo,
            expected_failure: TestStatus::Xfail,
        }
    }
}

/// The Xray statuses that a skipped test may be reported as.
#[derive(Copy, Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SkippedStatus {
    /// Report skipped tests as `TODO`.
    Todo,

    /// Report skipped tests as `ABORTED`.
    Aborted,
}

impl From<SkippedStatus> for TestStatus {
    fn from(status: SkippedStatus) -> Self {
        match status {
            SkippedStatus::Todo => TestStatus::Todo,
            SkippedStatus::Aborted => TestStatus::Aborted,
        }
    }
}
