// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{DeserializeError, SerializeError, TestStatusParseError},
    serialize::{base64_data, seconds_timestamp, serialize_summary, transport_safe_filename},
};
use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use std::{fmt, io, iter, str::FromStr};

/// The root element of an Xray execution import: every test attached to one execution ticket.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    /// The key of the execution ticket, e.g. `PROJ-123`.
    pub test_execution_key: String,

    /// Run-level metadata.
    pub info: ExecutionInfo,

    /// The tests in this execution, in the order they were added.
    pub tests: Vec<TestReport>,
}

impl ExecutionSummary {
    /// Creates a new, empty `ExecutionSummary` for the given execution ticket.
    pub fn new(test_execution_key: impl Into<String>, info: ExecutionInfo) -> Self {
        Self {
            test_execution_key: test_execution_key.into(),
            info,
            tests: vec![],
        }
    }

    /// Adds a test report to this summary.
    ///
    /// The report's `test_exec_key` is not checked against this summary's key; grouping is the
    /// caller's job.
    pub fn add_test(&mut self, report: TestReport) -> &mut Self {
        self.add_tests(iter::once(report))
    }

    /// Adds several test reports to this summary, preserving their order.
    pub fn add_tests(&mut self, reports: impl IntoIterator<Item = TestReport>) -> &mut Self {
        self.tests.extend(reports);
        self
    }

    /// Returns the number of tests in this summary.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if this summary has no tests.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Serialize this summary to the given writer as pretty-printed JSON.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_summary(self, writer)
    }

    /// Serialize this summary to a string.
    pub fn to_string(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        // serde_json only ever writes valid UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Converts this summary into a JSON value, as handed to a transport.
    pub fn to_json_value(&self) -> Result<serde_json::Value, SerializeError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses a submission document.
    ///
    /// The execution key is not part of the per-test wire format, so each test's
    /// `test_exec_key` is restored from the document's `testExecutionKey`.
    pub fn from_slice(input: &[u8]) -> Result<Self, DeserializeError> {
        let mut summary: Self = serde_json::from_slice(input)?;
        for test in &mut summary.tests {
            test.test_exec_key.clone_from(&summary.test_execution_key);
        }
        Ok(summary)
    }
}

/// Run-level metadata attached to every [`ExecutionSummary`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInfo {
    /// A one-line summary of the execution.
    pub summary: String,

    /// A longer description of the execution.
    pub description: String,

    /// The version the execution was run against, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// The test environments the execution ran in.
    #[serde(default)]
    pub test_environments: Vec<String>,
}

impl ExecutionInfo {
    /// The summary used when none is configured.
    pub const DEFAULT_SUMMARY: &'static str = "Execution of automated tests";

    /// Creates a new `ExecutionInfo` with the given summary and everything else empty.
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            description: String::new(),
            version: None,
            test_environments: vec![],
        }
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    /// Sets the version.
    pub fn set_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a test environment.
    pub fn add_test_environment(&mut self, environment: impl Into<String>) -> &mut Self {
        self.test_environments.push(environment.into());
        self
    }
}

impl Default for ExecutionInfo {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SUMMARY)
    }
}

/// The finalized record of one logical test.
///
/// Timestamps are kept at second precision, which is all the wire format carries.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    /// The key of the test ticket, e.g. `PROJ-42`.
    pub test_key: String,

    /// The key of the execution ticket this test belongs to.
    ///
    /// Not serialized: it's carried by the enclosing [`ExecutionSummary`].
    #[serde(skip)]
    pub test_exec_key: String,

    /// The final status of the test.
    pub status: TestStatus,

    /// The time at which the test began execution.
    #[serde(with = "seconds_timestamp")]
    pub start: DateTime<FixedOffset>,

    /// The time at which the test finished execution.
    #[serde(rename = "finish", with = "seconds_timestamp")]
    pub stop: DateTime<FixedOffset>,

    /// Evidence attached while the test ran, in attachment order.
    #[serde(default)]
    pub evidences: Vec<Evidence>,

    /// Named results captured while the test ran, in attachment order.
    #[serde(default)]
    pub results: Vec<XrayResult>,

    /// A free-form comment, typically the failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TestReport {
    /// Creates a new report with no evidence, results or comment.
    pub fn new(
        test_key: impl Into<String>,
        test_exec_key: impl Into<String>,
        status: TestStatus,
        start: impl Into<DateTime<FixedOffset>>,
        stop: impl Into<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            test_key: test_key.into(),
            test_exec_key: test_exec_key.into(),
            status,
            start: truncate_to_seconds(start.into()),
            stop: truncate_to_seconds(stop.into()),
            evidences: vec![],
            results: vec![],
            comment: None,
        }
    }

    /// Adds a piece of evidence.
    pub fn add_evidence(&mut self, evidence: Evidence) -> &mut Self {
        self.evidences.push(evidence);
        self
    }

    /// Adds several pieces of evidence, preserving their order.
    pub fn add_evidences(&mut self, evidences: impl IntoIterator<Item = Evidence>) -> &mut Self {
        self.evidences.extend(evidences);
        self
    }

    /// Adds a result.
    pub fn add_result(&mut self, result: XrayResult) -> &mut Self {
        self.results.push(result);
        self
    }

    /// Adds several results, preserving their order.
    pub fn add_results(&mut self, results: impl IntoIterator<Item = XrayResult>) -> &mut Self {
        self.results.extend(results);
        self
    }

    /// Sets the comment.
    pub fn set_comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }
}

fn truncate_to_seconds(timestamp: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}

/// The status of a test as understood by Xray.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    /// The test passed.
    Pass,

    /// The test failed.
    Fail,

    /// The test was not run to completion and is still to be done.
    Todo,

    /// The test was aborted.
    Aborted,

    /// The test failed, and was expected to.
    Xfail,
}

impl TestStatus {
    /// String representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["PASS", "FAIL", "TODO", "ABORTED", "XFAIL"]
    }

    /// Returns the wire label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Todo => "TODO",
            TestStatus::Aborted => "ABORTED",
            TestStatus::Xfail => "XFAIL",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = TestStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let val = match s {
            "PASS" => TestStatus::Pass,
            "FAIL" => TestStatus::Fail,
            "TODO" => TestStatus::Todo,
            "ABORTED" => TestStatus::Aborted,
            "XFAIL" => TestStatus::Xfail,
            other => return Err(TestStatusParseError::new(other)),
        };
        Ok(val)
    }
}

/// A binary artifact attached to a test.
///
/// Serialized with its payload encoded as base64. The file name can only be set through
/// [`Evidence::new`], so it is always transport-safe.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    filename: String,
    #[serde(with = "base64_data")]
    data: Vec<u8>,
}

impl Evidence {
    /// Creates a new piece of evidence.
    ///
    /// `filename` is rewritten with [`transport_safe_filename`]. Text payloads are stored as their
    /// UTF-8 bytes.
    pub fn new(filename: impl AsRef<str>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: transport_safe_filename(filename.as_ref()),
            data: data.into(),
        }
    }

    /// Returns the transport-safe file name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the raw payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payloads can be large binary blobs.
        f.debug_struct("Evidence")
            .field("filename", &self.filename)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A named sub-result captured during a test, independent of the test's own status.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct XrayResult {
    /// The name of the result.
    pub name: String,

    /// The log text.
    pub log: String,

    /// The status of this result, passed through as given.
    pub status: String,
}

impl XrayResult {
    /// Creates a new result.
    pub fn new(name: impl Into<String>, log: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: log.into(),
            status: status.into(),
        }
    }
}
