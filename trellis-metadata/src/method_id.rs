// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::MethodIdParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Identifies a test method by its declaring class and method name.
///
/// The string form is `Class.Method`. Class names may themselves contain dots (for example a
/// module path), so parsing splits at the *last* dot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
    class: String,
    method: String,
}

impl MethodId {
    /// Creates a new method identifier.
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }

    /// The declaring class.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The method name.
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)
    }
}

impl FromStr for MethodId {
    type Err = MethodIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((class, method)) if !class.is_empty() && !method.is_empty() => {
                Ok(Self::new(class, method))
            }
            _ => Err(MethodIdParseError::new(s)),
        }
    }
}

impl Serialize for MethodId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MethodId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
