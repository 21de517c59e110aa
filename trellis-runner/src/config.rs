// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for trellis test binaries.
//!
//! Configuration is layered: the built-in defaults in [`RunnerConfig::DEFAULT_CONFIG`] come
//! first, and an optional user file is merged on top of them.

use crate::{errors::ConfigParseError, lifecycle::Instancing};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;

/// Overall configuration for a test binary.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct RunnerConfig {
    /// Execution settings.
    pub execution: ExecutionConfig,

    /// Reporter settings.
    pub reporter: ReporterConfig,
}

impl RunnerConfig {
    /// The default configuration.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the default configuration, then merges `file` over it if provided.
    pub fn from_sources(file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        let mut builder = Self::make_default_config();
        if let Some(file) = file {
            builder = builder.add_source(File::new(file.as_str(), FileFormat::Toml));
        }

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|err| ConfigParseError::new(file.map(Utf8Path::to_owned), err))
    }

    /// Returns the built-in defaults.
    pub fn default_config() -> Self {
        Self::make_default_config()
            .build()
            .and_then(|config| config.try_deserialize())
            .expect("default config is always valid")
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Execution settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutionConfig {
    /// The instancing policy used when the convention does not choose one.
    pub instancing: Instancing,
}

/// Reporter settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ReporterConfig {
    /// Whether the console listener is registered when running without a host.
    pub console: bool,

    /// When to show output for failing cases.
    pub failure_output: OutputDisplay,

    /// When to show passing cases and their output.
    pub success_output: OutputDisplay,
}

/// When to display a case and its captured output.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutputDisplay {
    /// Show it as soon as the case's outcome is reported.
    Immediate,

    /// Never show it.
    Never,
}

impl OutputDisplay {
    /// Returns true if output should be shown.
    pub fn is_immediate(self) -> bool {
        matches!(self, Self::Immediate)
    }
}
