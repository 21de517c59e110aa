// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The class lifecycle: how a class's cases are instanced, wrapped and executed.
//!
//! The pieces are:
//!
//! * [`TestClass`]: the discovery collaborator's view of a class, with a type-erased instance
//!   factory and an ordered list of already-resolved method bindings.
//! * [`ClassBehavior`]: one wrapping layer around a class's cases.
//! * [`ClassExecution`]: the convention: instancing policy, behaviors, and skip rules.
//! * [`ClassRunner`]: runs one class under a convention, converting every error raised along the
//!   way into case outcomes.

mod behavior;
mod class;
mod controller;
mod execution;
mod unwind;

pub use behavior::*;
pub use class::*;
pub use controller::*;
pub use execution::*;
