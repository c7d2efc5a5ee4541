// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command dispatch and execution.

mod app;
mod chunk;
mod common;
mod discover;
mod merge;

pub use app::SpecsplitApp;
