// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `trellis` host: spawns a test binary, drives it over the remote control channel, and
//! reports the events it streams back.
//!
//! A test binary is any program whose `main` calls `trellis_runner::harness::main`.

#![warn(missing_docs)]

mod dispatch;
mod errors;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
