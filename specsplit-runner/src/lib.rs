// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [specsplit](https://crates.io/crates/specsplit), which splits a
//! shell spec suite into balanced chunks for parallel CI workers.
//!
//! The basic flow is a forward pipeline:
//!
//! 1. [`report`] turns JUnit reports from earlier runs into timing samples.
//! 2. [`merge`] combines samples into a [`TimingModel`](specsplit_metadata::TimingModel), which
//!    [`timings`] persists.
//! 3. [`items`] turns candidate spec files and the model into weighted test items.
//! 4. [`partition`] distributes those items across chunks and renders one chunk for the test
//!    runner.

pub mod config;
pub mod errors;
pub mod helpers;
pub mod items;
pub mod merge;
pub mod partition;
pub mod report;
pub mod spec_path;
pub mod timings;
