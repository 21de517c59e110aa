// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The remote control protocol.
//!
//! A host process binds a channel (a Unix domain socket) and starts the target test binary,
//! which connects back. Each connection serves exactly one request:
//!
//! 1. The host sends one of `DiscoverMethods`, `RunMethods` or `RunAssembly`.
//! 2. The target streams every event published during the request.
//! 3. If the request failed, the target sends an `Error` envelope.
//! 4. The target always sends `Completed` last, then closes the connection.
//!
//! Frames are a 4-byte big-endian length followed by a JSON [`Envelope`].

mod channel;
mod host;
mod target;
mod wire;

pub use channel::*;
pub use host::*;
pub use target::*;
pub use wire::*;
