// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Listeners that report execution events.
//!
//! Rendering is not part of the engine: these are ordinary bus listeners, registered by the
//! harness or by a host process.

mod console;
mod summary;

pub use console::*;
pub use summary::*;
