// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for trellis: the case state machine, the class lifecycle controller, the
//! event bus, and the remote control protocol.
//!
//! A test binary describes its classes and method bindings as an [`Assembly`](runner::Assembly),
//! chooses a [`ClassExecution`](lifecycle::ClassExecution) convention, and hands both to
//! [`harness::main`]. From there the binary either runs directly, reporting to the console, or
//! serves a single request from a host process over the remote control channel.

pub mod bus;
pub mod case;
pub mod config;
pub mod errors;
pub mod harness;
pub mod lifecycle;
pub mod output;
pub mod remote;
pub mod reporter;
pub mod runner;
mod time;
