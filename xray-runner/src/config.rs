// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for the Xray reporter.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind},
    outcome::StatusMapping,
    publisher::TransportFailurePolicy,
};
use bytesize::ByteSize;
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};
use tracing::warn;
use xray_report::ExecutionInfo;

/// Overall configuration for the Xray reporter.
///
/// Repository configuration is layered on top of [`Self::DEFAULT_CONFIG`]. Credentials are not part
/// of the configuration: the host passes them to
/// [`XrayPublisher::new`](crate::publisher::XrayPublisher::new) directly.
#[derive(Clone, Debug)]
pub struct XrayConfig {
    inner: XrayConfigImpl,
    unknown_keys: BTreeSet<String>,
}

impl XrayConfig {
    /// The default location of the config within a workspace: `.config/xray.toml`.
    pub const CONFIG_PATH: &'static str = ".config/xray.toml";

    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/xray.toml` in the
    /// workspace root.
    ///
    /// An explicitly specified file must exist. If no file is specified and the workspace doesn't
    /// have `.config/xray.toml`, the default config is used.
    pub fn from_sources(
        workspace_root: impl AsRef<Utf8Path>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.as_ref().join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown_keys) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file.clone(), kind))?;
        warn_unknown_keys(&config_file, &unknown_keys);
        Ok(Self {
            inner,
            unknown_keys,
        })
    }

    /// Parses a config from a TOML string layered on top of the default config.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigParseError> {
        let builder =
            Self::make_default_config().add_source(File::from_str(input, FileFormat::Toml));
        let config_file = Utf8PathBuf::from("<inline>");
        let (inner, unknown_keys) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file.clone(), kind))?;
        warn_unknown_keys(&config_file, &unknown_keys);
        Ok(Self {
            inner,
            unknown_keys,
        })
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");

        let mut unknown = BTreeSet::new();
        let inner = serde_ignored::deserialize(config, |path: serde_ignored::Path| {
            unknown.insert(path.to_string());
        })
        .expect("default config is always valid");

        // The default config is embedded in this crate, so it must not have unknown keys.
        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            );
        }

        Self {
            inner,
            unknown_keys: BTreeSet::new(),
        }
    }

    /// Returns the keys in the config file that weren't recognized, in sorted order.
    ///
    /// Unknown keys are ignored, and a warning is logged for them when the config is read.
    pub fn unknown_keys(&self) -> &BTreeSet<String> {
        &self.unknown_keys
    }

    /// Returns the base URL of the Jira/Xray API.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Overrides the base URL, e.g. from a command-line flag.
    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.inner.base_url = base_url.into();
        self
    }

    /// Returns the run-wide execution key used by tests that don't name one.
    ///
    /// An empty key is treated as unset.
    pub fn default_test_exec_key(&self) -> Option<&str> {
        self.inner
            .default_test_exec_key
            .as_deref()
            .filter(|key| !key.is_empty())
    }

    /// Overrides the run-wide execution key.
    pub fn set_default_test_exec_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.inner.default_test_exec_key = Some(key.into());
        self
    }

    /// Returns what to do when publishing an execution summary fails.
    pub fn on_transport_error(&self) -> TransportFailurePolicy {
        self.inner.on_transport_error
    }

    /// Returns the deadline for a single request to the Xray API.
    pub fn http_timeout(&self) -> Duration {
        self.inner.http_timeout
    }

    /// Returns the maximum size of a single evidence payload.
    pub fn max_evidence_size(&self) -> ByteSize {
        self.inner.max_evidence_size
    }

    /// Returns how reconciled outcomes are presented to Xray.
    pub fn status_mapping(&self) -> StatusMapping {
        self.inner.status
    }

    /// Returns the run-level metadata attached to every execution summary.
    pub fn execution_info(&self) -> ExecutionInfo {
        let info = &self.inner.execution_info;
        ExecutionInfo {
            summary: info.summary.clone(),
            description: info.description.clone(),
            version: info.version.clone(),
            test_environments: info.test_environments.clone(),
        }
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(XrayConfigImpl, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))?;

        Ok((config, ignored))
    }
}

fn warn_unknown_keys(config_file: &Utf8Path, unknown: &BTreeSet<String>) {
    let mut unknown_str = String::new();
    match unknown.len() {
        0 => return,
        1 => {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.extend(unknown.iter().map(String::as_str));
        }
        _ => {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push_str("\n  - ");
                unknown_str.push_str(ignored_key);
            }
        }
    }

    warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct XrayConfigImpl {
    base_url: String,
    #[serde(default)]
    default_test_exec_key: Option<String>,
    on_transport_error: TransportFailurePolicy,
    #[serde(with = "humantime_serde")]
    http_timeout: Duration,
    max_evidence_size: ByteSize,
    status: StatusMapping,
    execution_info: ExecutionInfoConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ExecutionInfoConfig {
    summary: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    test_environments: Vec<String>,
}
