// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while parsing a [`MethodId`](crate::MethodId) from a string.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid method identifier `{input}`: expected `Class.Method`")]
pub struct MethodIdParseError {
    input: String,
}

impl MethodIdParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}
