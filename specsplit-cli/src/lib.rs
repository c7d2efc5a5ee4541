// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Split a shell spec suite into balanced chunks for parallel CI workers.
//!
//! `specsplit merge` turns JUnit reports from earlier CI runs into a timing model, and
//! `specsplit chunk` uses that model to work out which spec files (or examples) the current
//! worker should run.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, StderrStyles};
