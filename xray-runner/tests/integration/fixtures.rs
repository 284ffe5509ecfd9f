// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, FixedOffset, TimeZone};
use std::sync::{Mutex, Once};
use xray_runner::{
    config::XrayConfig,
    errors::TransportError,
    outcome::{PhaseOutcome, TestPhase},
    publisher::XrayPublisher,
    reporter::{TestEvent, TestEventKind, XrayReporter},
    transport::{Credentials, Transport, TransportResponse},
};

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Another test binary in the same process may have installed a subscriber already.
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Returns a timestamp `secs` seconds after 2024-03-01T12:00:00+02:00.
pub(crate) fn at(secs: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(secs.into())
}

pub(crate) fn config(toml: &str) -> XrayConfig {
    XrayConfig::from_toml_str(toml).unwrap()
}

pub(crate) fn publisher<T: Transport>(config: &XrayConfig, transport: T) -> XrayPublisher<T> {
    let credentials = Credentials::new("client-id", "client-secret").unwrap();
    XrayPublisher::new(config, credentials, transport)
}

/// A request captured by [`RecordingTransport`].
#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub(crate) url: String,
    pub(crate) authorization: String,
    pub(crate) document: serde_json::Value,
}

/// An in-memory transport that records requests and answers each with a scripted status.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    // Popped from the back; missing entries answer 200.
    statuses: Mutex<Vec<u16>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_statuses(statuses: &[u16]) -> Self {
        let mut statuses = statuses.to_vec();
        statuses.reverse();
        Self {
            requests: Mutex::new(vec![]),
            statuses: Mutex::new(statuses),
        }
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn posted_exec_keys(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| {
                request.document["testExecutionKey"]
                    .as_str()
                    .unwrap()
                    .to_owned()
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn post(
        &self,
        url: &str,
        document: &serde_json::Value,
        credentials: &Credentials,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_owned(),
            authorization: credentials.basic_auth_header(),
            document: document.clone(),
        });
        let status_code = self.statuses.lock().unwrap().pop().unwrap_or(200);
        Ok(TransportResponse {
            status_code,
            body: if status_code == 200 {
                "{}".to_owned()
            } else {
                format!("{{\"error\":\"status {status_code}\"}}")
            },
        })
    }
}

/// A transport whose requests never complete.
#[derive(Debug, Default)]
pub(crate) struct UnreachableTransport {
    attempts: Mutex<usize>,
}

impl UnreachableTransport {
    pub(crate) fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl Transport for UnreachableTransport {
    fn post(
        &self,
        url: &str,
        _document: &serde_json::Value,
        _credentials: &Credentials,
    ) -> Result<TransportResponse, TransportError> {
        *self.attempts.lock().unwrap() += 1;
        Err(TransportError::Request {
            url: url.to_owned(),
            error: "connection refused".into(),
        })
    }
}

/// Drives one test through registration and its three phases, one second per phase.
pub(crate) fn run_test(
    reporter: &XrayReporter,
    identity: &str,
    test_key: &str,
    test_exec_key: Option<&str>,
    outcomes: [PhaseOutcome; 3],
    offset: u32,
) {
    reporter
        .handle_event(TestEvent {
            identity,
            kind: TestEventKind::Registered {
                test_key: test_key.to_owned(),
                test_exec_key: test_exec_key.map(str::to_owned),
            },
        })
        .unwrap();

    let phases = [TestPhase::Setup, TestPhase::Call, TestPhase::Teardown];
    for (i, (phase, outcome)) in phases.into_iter().zip(outcomes).enumerate() {
        let i = i as u32;
        reporter
            .handle_event(TestEvent {
                identity,
                kind: TestEventKind::PhaseFinished {
                    phase,
                    outcome,
                    start: at(offset + i),
                    stop: at(offset + i + 1),
                },
            })
            .unwrap();
    }
}
