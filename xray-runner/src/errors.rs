// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the Xray reporter.

use crate::outcome::{PhaseOutcome, TestPhase};
use bytesize::ByteSize;
use camino::Utf8PathBuf;
use config::ConfigError;
use thiserror::Error;
use xray_report::SerializeError;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse Xray config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// Required reporting configuration is missing.
///
/// Raised where the missing value is first needed, never deferred to publish time.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A test has no execution key, and no run-wide default is configured.
    #[error(
        "test `{identity}` (test key `{test_key}`) has no execution key, \
         and no default-test-exec-key is configured"
    )]
    MissingTestExecKey {
        /// The identity of the test.
        identity: String,

        /// The test ticket key.
        test_key: String,
    },

    /// A credential was missing or empty.
    #[error("Xray API {field} is missing or empty")]
    MissingCredential {
        /// The name of the missing credential.
        field: &'static str,
    },
}

/// The same phase of a test reported an outcome more than once.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(
    "test `{identity}` reported its {phase} phase twice \
     (previous outcome: {previous}, incoming outcome: {incoming})"
)]
pub struct ReconciliationConflict {
    /// The identity of the test.
    pub identity: String,

    /// The phase that was reported twice.
    pub phase: TestPhase,

    /// The outcome recorded first.
    pub previous: PhaseOutcome,

    /// The outcome that conflicted with it.
    pub incoming: PhaseOutcome,
}

/// An error that occurs while parsing a [`PhaseOutcome`] value from a string.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(
    "unsupported test outcome: {input}\n(known values: {})",
    PhaseOutcome::variants().join(", ")
)]
pub struct UnsupportedOutcomeError {
    input: String,
}

impl UnsupportedOutcomeError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that could not be parsed.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// An error returned by [`XrayReporter`](crate::reporter::XrayReporter).
///
/// These are infrastructure failures, distinct from a test failing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReporterError {
    /// Required configuration was missing.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Phase outcomes for a test conflicted.
    #[error(transparent)]
    Conflict(#[from] ReconciliationConflict),

    /// A test was registered more than once.
    #[error("test `{identity}` was already registered with test key `{test_key}`")]
    AlreadyRegistered {
        /// The identity of the test.
        identity: String,

        /// The test key it was first registered with.
        test_key: String,
    },

    /// An event arrived for a test that was already finalized.
    #[error("test `{identity}` was already finalized")]
    AlreadyFinalized {
        /// The identity of the test.
        identity: String,
    },

    /// A test was finalized before its teardown phase reported an outcome.
    #[error("test `{identity}` was finalized before its teardown phase reported an outcome")]
    TeardownNotRecorded {
        /// The identity of the test.
        identity: String,
    },

    /// An evidence payload exceeded the configured size limit.
    #[error(
        "evidence `{filename}` attached to test `{identity}` is {size}, \
         larger than the limit of {limit}"
    )]
    EvidenceTooLarge {
        /// The identity of the test.
        identity: String,

        /// The transport-safe file name of the evidence.
        filename: String,

        /// The size of the payload.
        size: ByteSize,

        /// The configured limit.
        limit: ByteSize,
    },

    /// The reporter's state lock was poisoned by a panic on another thread.
    #[error("reporter state was poisoned by a panic")]
    Poisoned,
}

/// An error returned by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request could not be sent, or the response could not be read.
    #[error("HTTP request to `{url}` failed")]
    Request {
        /// The URL the request was sent to.
        url: String,

        /// The underlying error.
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The Xray API responded with a non-success status.
    #[error("Xray API responded with HTTP {status_code}: {body}")]
    Status {
        /// The HTTP status code.
        status_code: u16,

        /// The response body.
        body: String,
    },
}

/// An error that occurred while publishing one execution summary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PublishError {
    /// The summary could not be serialized.
    #[error("failed to serialize execution summary for `{test_exec_key}`")]
    Serialize {
        /// The execution key of the summary.
        test_exec_key: String,

        /// The underlying error.
        #[source]
        error: SerializeError,
    },

    /// The transport failed to deliver the summary.
    #[error("failed to publish execution summary for `{test_exec_key}`")]
    Transport {
        /// The execution key of the summary.
        test_exec_key: String,

        /// The underlying error.
        #[source]
        error: TransportError,
    },
}

impl PublishError {
    /// Returns the execution key of the summary that failed to publish.
    pub fn test_exec_key(&self) -> &str {
        match self {
            Self::Serialize { test_exec_key, .. } | Self::Transport { test_exec_key, .. } => {
                test_exec_key
            }
        }
    }
}
