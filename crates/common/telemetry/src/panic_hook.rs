// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Panics become `error` events, so they reach the error log files.

use std::{
    panic::{self, PanicHookInfo},
    sync::atomic::{AtomicU64, Ordering},
    thread,
};

use backtrace::Backtrace;

static PANIC_COUNT: AtomicU64 = AtomicU64::new(0);

/// Panics seen by the hook so far.
#[must_use]
pub fn panic_count() -> u64 { PANIC_COUNT.load(Ordering::Relaxed) }

/// Log every panic with its thread, location and a backtrace before the
/// previous hook prints it. A panicking reconcile task is reported as a
/// failed target by the sync engine; this keeps the full trace in the logs.
pub fn set_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        log_panic(info);
        PANIC_COUNT.fetch_add(1, Ordering::Relaxed);
        previous(info);
    }));
}

fn log_panic(info: &PanicHookInfo<'_>) {
    let current = thread::current();
    let thread_name = current.name().unwrap_or("<unnamed>");
    let location = info
        .location()
        .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
    let backtrace = format!("{:?}", Backtrace::new());

    tracing::error!(
        thread = thread_name,
        location = %location,
        backtrace = %backtrace,
        "{info}"
    );
}
