// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of submission documents to the Xray API.
//!
//! The core only needs one capability: post a JSON document to a URL with basic-auth credentials
//! and get an HTTP status back. That capability is the [`Transport`] trait. Deadlines belong to the
//! transport; nothing here retries.

use crate::errors::{ConfigurationError, TransportError};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::fmt;

/// Posts submission documents to the Xray API.
pub trait Transport {
    /// Posts `document` to `url`, authenticating with `credentials`.
    ///
    /// A response with a non-success status is returned as `Ok`; errors are reserved for requests
    /// that could not be completed at all.
    fn post(
        &self,
        url: &str,
        document: &serde_json::Value,
        credentials: &Credentials,
    ) -> Result<TransportResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(
        &self,
        url: &str,
        document: &serde_json::Value,
        credentials: &Credentials,
    ) -> Result<TransportResponse, TransportError> {
        (**self).post(url, document, credentials)
    }
}

/// The response to a [`Transport::post`] call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status_code: u16,

    /// The response body.
    pub body: String,
}

impl TransportResponse {
    /// Returns true if the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Client credentials for the Xray API, sent as HTTP basic auth.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    /// Creates a new set of credentials.
    ///
    /// Returns an error if either value is empty.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.is_empty() {
            return Err(ConfigurationError::MissingCredential { field: "client id" });
        }
        if client_secret.is_empty() {
            return Err(ConfigurationError::MissingCredential {
                field: "client secret",
            });
        }
        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Returns the client ID.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the value of the `Authorization` header for these credentials.
    pub fn basic_auth_header(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        format!("Basic {encoded}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

#[cfg(feature = "http")]
mod http {
    use super::*;
    use std::time::Duration;
    use ureq::Agent;

    /// A blocking [`Transport`] backed by `ureq`.
    #[derive(Clone)]
    pub struct UreqTransport {
        agent: Agent,
        timeout: Duration,
    }

    impl UreqTransport {
        /// Creates a new transport that gives up on a request after `timeout`.
        pub fn new(timeout: Duration) -> Self {
            let config = Agent::config_builder()
                // Non-success statuses are reported through `TransportResponse`.
                .http_status_as_error(false)
                .timeout_global(Some(timeout))
                .build();
            Self {
                agent: Agent::new_with_config(config),
                timeout,
            }
        }
    }

    impl fmt::Debug for UreqTransport {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("UreqTransport")
                .field("timeout", &self.timeout)
                .finish_non_exhaustive()
        }
    }

    impl Transport for UreqTransport {
        fn post(
            &self,
            url: &str,
            document: &serde_json::Value,
            credentials: &Credentials,
        ) -> Result<TransportResponse, TransportError> {
            let request_error = |error: ureq::Error| TransportError::Request {
                url: url.to_owned(),
                error: Box::new(error),
            };

            let body = document.to_string();
            let mut response = self
                .agent
                .post(url)
                .header("Authorization", credentials.basic_auth_header())
                .header("Content-Type", "application/json")
                .send(body.as_bytes())
                .map_err(request_error)?;

            let status_code = response.status().as_u16();
            let body = response
                .body_mut()
                .read_to_string()
                .map_err(request_error)?;
            Ok(TransportResponse { status_code, body })
        }
    }
}

#[cfg(feature = "http")]
pub use http::UreqTransport;
