// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize an `ExecutionSummary`.

use crate::{ExecutionSummary, SerializeError};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::io;

/// Characters left as-is in evidence file names: ASCII alphanumerics and the URL-unreserved
/// punctuation.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn serialize_summary(
    summary: &ExecutionSummary,
    mut writer: impl io::Write,
) -> Result<(), SerializeError> {
    serde_json::to_writer_pretty(&mut writer, summary)?;

    // Add a trailing newline.
    writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    Ok(())
}

/// Rewrites an evidence file name into a form that is safe to send to Xray.
///
/// Path separators (`/` and `\`) become `_`, then everything outside the URL-unreserved set is
/// percent-encoded. For example, `logs/run 1.txt` becomes `logs_run%201.txt`.
pub fn transport_safe_filename(filename: &str) -> String {
    let flattened = filename.replace(['/', '\\'], "_");
    utf8_percent_encode(&flattened, FILENAME_ENCODE_SET).to_string()
}

/// Timestamps as ISO-8601 strings with second precision, e.g. `2024-03-01T10:00:00+01:00`.
pub(crate) mod seconds_timestamp {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(crate) fn serialize<S: Serializer>(
        timestamp: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Secs, false))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s).map_err(D::Error::custom)
    }
}

/// Binary payloads as standard base64 strings.
pub(crate) mod base64_data {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(crate) fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(D::Error::custom)
    }
}
