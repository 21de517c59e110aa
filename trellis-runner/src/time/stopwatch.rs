// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking how long cases and runs take.
//!
//! A stopwatch records a start time with the realtime clock (for reporting) and measures elapsed
//! time with the monotonic clock.

use chrono::{DateTime, FixedOffset, Local};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

/// The start state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            // These two syscalls will happen imperceptibly close to each other, which is good
            // enough for our purposes.
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn start_time(&self) -> DateTime<FixedOffset> {
        self.start_time.fixed_offset()
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }
}
