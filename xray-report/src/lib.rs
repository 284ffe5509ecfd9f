// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Build and serialize Jira/Xray execution import documents in Rust.
//!
//! The root of a document is an [`ExecutionSummary`]: one execution ticket, some run-level
//! [`ExecutionInfo`], and the [`TestReport`]s attached to that ticket.

mod errors;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;
pub use serialize::transport_safe_filename;
