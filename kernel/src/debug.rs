// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Support for in-kernel debugging.
//!
//! For printing, this module provides the `debug!` macro. It formats the
//! message, prefixed with the file and line it was issued from, into the
//! output registered with [`set_debug_writer`]. Boards typically register a
//! blocking UART writer early during setup.
//!
//! If no writer has been registered, messages are silently dropped. Debug
//! output is best effort and never fails or blocks the caller beyond what the
//! registered writer itself does.
//!
//! ```rust,ignore
//! debug!("Bus reset");
//! debug!("stall on endpoint {}", ep);
//! usb_trace!("tx {} bytes on ep{}", len, ep);
//! ```
//!
//! `usb_trace!` only prints when the `trace_usb` kernel feature is enabled,
//! see `kernel::config`.

use core::cell::Cell;
use core::fmt::{self, Arguments, Write};

/// Output sink for debug messages.
pub trait IoWrite {
    /// Write all of `buf` to the underlying device.
    fn write(&self, buf: &[u8]);
}

struct DebugSink {
    writer: Cell<Option<&'static dyn IoWrite>>,
}

// Tock runs on a single core and the debug sink is only installed during board
// setup, before interrupts are enabled.
unsafe impl Sync for DebugSink {}

static DEBUG_SINK: DebugSink = DebugSink {
    writer: Cell::new(None),
};

/// Register the writer all `debug!` output goes to.
pub fn set_debug_writer(writer: &'static dyn IoWrite) {
    DEBUG_SINK.writer.set(Some(writer));
}

/// Stop emitting debug output.
pub fn clear_debug_writer() {
    DEBUG_SINK.writer.set(None);
}

struct SinkWriter(&'static dyn IoWrite);

impl Write for SinkWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write(s.as_bytes());
        Ok(())
    }
}

pub fn begin_debug_fmt(args: Arguments, file_line: &(&'static str, u32)) {
    if let Some(writer) = DEBUG_SINK.writer.get() {
        let mut writer = SinkWriter(writer);
        let (file, line) = *file_line;
        let _ = writer.write_fmt(format_args!("{}:{}: ", file, line));
        let _ = writer.write_fmt(args);
        let _ = writer.write_str("\r\n");
    }
}

pub fn begin_debug(msg: &str, file_line: &(&'static str, u32)) {
    begin_debug_fmt(format_args!("{}", msg), file_line);
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::begin_debug($msg, {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::begin_debug_fmt(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}

/// Per-packet USB tracing, compiled out unless the `trace_usb` feature is set.
#[macro_export]
macro_rules! usb_trace {
    ($($arg:tt)+) => ({
        if $crate::config::CONFIG.trace_usb {
            $crate::debug!($($arg)+);
        }
    });
}
