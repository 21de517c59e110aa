// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::MethodId;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A message that can be published on the event bus and sent over the remote control channel.
///
/// Each message type carries a stable wire name. Receivers dispatch on this name, never on the
/// shape of the body.
pub trait Message: Serialize + DeserializeOwned + 'static {
    /// The name of this message type on the wire.
    const TYPE_NAME: &'static str;
}

/// Host → target: enumerate candidate test methods without running them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverMethods {}

impl Message for DiscoverMethods {
    const TYPE_NAME: &'static str = "DiscoverMethods";
}

/// Host → target: run exactly the named methods.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMethods {
    /// The methods to run. Every parameterization of each named method runs.
    pub methods: Vec<MethodId>,
}

impl Message for RunMethods {
    const TYPE_NAME: &'static str = "RunMethods";
}

/// Host → target: run every test in the target's assembly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAssembly {}

impl Message for RunAssembly {
    const TYPE_NAME: &'static str = "RunAssembly";
}

/// Target → host: the requested operation failed with an unhandled error.
///
/// Case failures never produce this envelope; they are reported through case events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// A description of the error, including its chain of causes.
    pub description: String,
}

impl Message for ErrorEnvelope {
    const TYPE_NAME: &'static str = "Error";
}

/// Target → host: the exchange is over. Always the last frame on the channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completed {}

impl Message for Completed {
    const TYPE_NAME: &'static str = "Completed";
}
