// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for reporting test outcomes to Jira/Xray.
//!
//! A run goes through three stages:
//!
//! 1. An [`XrayReporter`](reporter::XrayReporter) receives per-phase events from the host test
//!    runner and reconciles them into one [`TestReport`](xray_report::TestReport) per test.
//! 2. At the end of the run, finished reports are [drained](reporter::XrayReporter::drain) and
//!    grouped into one execution summary per execution ticket.
//! 3. An [`XrayPublisher`](publisher::XrayPublisher) posts each summary through a
//!    [`Transport`](transport::Transport).
//!
//! For the structure of the submitted documents, see the
//! [`xray-report`](https://docs.rs/xray-report) crate.

pub mod config;
pub mod errors;
pub mod outcome;
pub mod publisher;
pub mod reporter;
pub mod transport;
