// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the documents specsplit reads and writes.
//!
//! specsplit persists historical test durations as a versioned JSON document (the *timing
//! model*). This crate defines that document, along with the exit codes the `specsplit` binary
//! documents for its expected failures.

mod errors;
mod exit_codes;
mod timings;

pub use errors::*;
pub use exit_codes::*;
pub use timings::*;
