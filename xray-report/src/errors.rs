// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::TestStatus;
use thiserror::Error;

/// An error that occurs while serializing an [`ExecutionSummary`](crate::ExecutionSummary).
///
/// Returned by [`ExecutionSummary::serialize`](crate::ExecutionSummary::serialize) and
/// [`ExecutionSummary::to_string`](crate::ExecutionSummary::to_string).
#[derive(Debug, Error)]
#[error("error serializing Xray execution summary")]
pub struct SerializeError {
    #[from]
    inner: serde_json::Error,
}

/// An error that occurs while parsing an [`ExecutionSummary`](crate::ExecutionSummary) document.
#[derive(Debug, Error)]
#[error("error parsing Xray execution summary")]
pub struct DeserializeError {
    #[from]
    inner: serde_json::Error,
}

/// An error returned while parsing a [`TestStatus`] label from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized Xray test status: {input}\n(known values: {})",
    TestStatus::variants().join(", ")
)]
pub struct TestStatusParseError {
    input: String,
}

impl TestStatusParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}
