// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batches finished test reports into execution summaries and posts them to Xray.

use crate::{
    config::XrayConfig,
    errors::{PublishError, TransportError},
    transport::{Credentials, Transport},
};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, error, info};
use xray_report::{ExecutionInfo, ExecutionSummary, TestReport};

/// What to do when posting an execution summary fails.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum TransportFailurePolicy {
    /// Stop at the first failure and return it. Later summaries are not posted.
    #[default]
    Abort,

    /// Log the failure and carry on with the next summary.
    Continue,
}

/// Groups reports by execution key into one [`ExecutionSummary`] per key.
///
/// Summaries come out in the order their key was first seen, and each summary lists its tests in
/// input order.
pub fn build_summaries(
    reports: impl IntoIterator<Item = TestReport>,
    info: &ExecutionInfo,
) -> Vec<ExecutionSummary> {
    let mut summaries: IndexMap<String, ExecutionSummary> = IndexMap::new();
    for report in reports {
        summaries
            .entry(report.test_exec_key.clone())
            .or_insert_with_key(|key| ExecutionSummary::new(key.clone(), info.clone()))
            .add_test(report);
    }
    summaries.into_values().collect()
}

/// The result of a [`XrayPublisher::publish`] call that didn't abort.
#[derive(Debug, Default)]
pub struct PublishOutcome {
    /// Execution keys whose summaries were posted, in posting order.
    pub published: Vec<String>,

    /// Summaries that failed to post. Only populated with [`TransportFailurePolicy::Continue`].
    pub failed: Vec<PublishError>,
}

impl PublishOutcome {
    /// Returns true if every summary was posted.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Posts execution summaries to the Xray API.
#[derive(Debug)]
pub struct XrayPublisher<T> {
    base_url: String,
    credentials: Credentials,
    info: ExecutionInfo,
    policy: TransportFailurePolicy,
    transport: T,
}

impl<T: Transport> XrayPublisher<T> {
    /// The path, relative to the base URL, that execution summaries are posted to.
    pub const RESULTS_PATH: &'static str = "/raven/1.0/import/execution";

    /// Creates a new publisher.
    pub fn new(config: &XrayConfig, credentials: Credentials, transport: T) -> Self {
        Self {
            base_url: config.base_url().to_owned(),
            credentials,
            info: config.execution_info(),
            policy: config.on_transport_error(),
            transport,
        }
    }

    /// Returns the URL execution summaries are posted to.
    pub fn results_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), Self::RESULTS_PATH)
    }

    /// Returns the failure policy used by [`Self::publish`].
    pub fn policy(&self) -> TransportFailurePolicy {
        self.policy
    }

    /// Groups reports into execution summaries. See [`build_summaries`].
    pub fn summaries(&self, reports: impl IntoIterator<Item = TestReport>) -> Vec<ExecutionSummary> {
        build_summaries(reports, &self.info)
    }

    /// Groups reports into execution summaries and posts each one.
    ///
    /// With no reports, nothing is posted. With [`TransportFailurePolicy::Abort`], the first
    /// failure is returned as an error; with [`TransportFailurePolicy::Continue`], failures are
    /// collected into the returned [`PublishOutcome`].
    pub fn publish(
        &self,
        reports: impl IntoIterator<Item = TestReport>,
    ) -> Result<PublishOutcome, PublishError> {
        let summaries = self.summaries(reports);
        let mut outcome = PublishOutcome::default();
        if summaries.is_empty() {
            debug!("no tests were marked for Xray reporting, nothing to publish");
            return Ok(outcome);
        }

        let url = self.results_url();
        for summary in &summaries {
            match self.post(&url, summary) {
                Ok(()) => outcome.published.push(summary.test_execution_key.clone()),
                Err(error) => {
                    error!(
                        "failed to publish {} {} for execution {}: {}",
                        summary.len(),
                        if summary.len() == 1 { "test" } else { "tests" },
                        error.test_exec_key(),
                        DisplayErrorChain(&error),
                    );
                    match self.policy {
                        TransportFailurePolicy::Abort => return Err(error),
                        TransportFailurePolicy::Continue => outcome.failed.push(error),
                    }
                }
            }
        }

        if outcome.is_success() {
            info!("successfully posted all test execution results to Xray");
        }
        Ok(outcome)
    }

    fn post(&self, url: &str, summary: &ExecutionSummary) -> Result<(), PublishError> {
        let test_exec_key = &summary.test_execution_key;
        let document = summary
            .to_json_value()
            .map_err(|error| PublishError::Serialize {
                test_exec_key: test_exec_key.clone(),
                error,
            })?;
        debug!("posting execution {test_exec_key} to {url}, payload => {document}");

        let transport_error = |error| PublishError::Transport {
            test_exec_key: test_exec_key.clone(),
            error,
        };
        let response = self
            .transport
            .post(url, &document, &self.credentials)
            .map_err(transport_error)?;
        if !response.is_success() {
            return Err(transport_error(TransportError::Status {
                status_code: response.status_code,
                body: response.body,
            }));
        }

        info!(
            "posted execution {test_exec_key} ({} {})",
            summary.len(),
            if summary.len() == 1 { "test" } else { "tests" },
        );
        Ok(())
    }
}

/// Displays an error along with its chain of sources on one line.
struct DisplayErrorChain<'a>(&'a dyn std::error::Error);

impl std::fmt::Display for DisplayErrorChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
