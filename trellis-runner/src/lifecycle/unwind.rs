// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converting panics into exceptions.
//!
//! While a guarded closure runs, panics are captured instead of printed: the panic hook records
//! the location and a backtrace for the current thread, and [`guarded`] attaches them to the
//! exception as its stack trace. Panics outside guarded code go to the previous hook unchanged.

use crate::case::Exception;
use std::{
    backtrace::{Backtrace, BacktraceStatus},
    cell::{Cell, RefCell},
    panic::{self, AssertUnwindSafe, PanicHookInfo},
    sync::Once,
};
use swrite::{SWrite, swrite};

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.get() {
                LAST_PANIC.set(Some(panic_trace(info)));
            } else {
                previous_hook(info);
            }
        }));
    });
}

fn panic_trace(info: &PanicHookInfo<'_>) -> String {
    let mut trace = String::new();
    if let Some(location) = info.location() {
        swrite!(
            trace,
            "at {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        );
    }
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        if !trace.is_empty() {
            trace.push('\n');
        }
        swrite!(trace, "{backtrace}");
    }
    trace
}

/// Runs `f`, converting a panic into an exception that carries the panic's location.
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, Exception>) -> Result<T, Exception> {
    install_hook();
    let was_capturing = CAPTURING.replace(true);
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.set(was_capturing);

    result.unwrap_or_else(|payload| {
        let trace = LAST_PANIC.take().filter(|trace| !trace.is_empty());
        Err(Exception::from_panic(payload).with_panic_trace(trace))
    })
}
