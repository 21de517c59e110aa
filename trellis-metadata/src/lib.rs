// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable data exchanged with [trellis](https://crates.io/crates/trellis-runner) target
//! processes.
//!
//! Host adapters (IDE integrations, CI drivers) can depend on this crate alone: it contains every
//! message that crosses the remote control channel, the records those messages carry, and the
//! documented process exit codes.

mod errors;
mod events;
mod exit_codes;
mod failure;
mod method_id;
mod protocol;

pub use errors::*;
pub use events::*;
pub use exit_codes::*;
pub use failure::*;
pub use method_id::*;
pub use protocol::*;
