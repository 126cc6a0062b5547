// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Data structure for storing compile-time configuration options.
//!
//! Configuration is a typed `const` object rather than scattered `#[cfg]`
//! attributes. All code paths are type-checked by the compiler, even those
//! that end up disabled, and the optimizer folds the constant away so a
//! disabled trace costs nothing in the resulting binary.

/// Data structure holding compile-time configuration options.
///
/// The values are selected with cargo features of the `kernel` crate; see
/// `kernel/Cargo.toml`.
pub struct Config {
    /// Whether USB drivers should trace every packet, FIFO wait and control
    /// stage to the debug output.
    ///
    /// This is extremely chatty and slows the interrupt handler down enough
    /// that a host may time out during enumeration. Only enable it while
    /// bringing up a new controller.
    pub trace_usb: bool,

    /// Whether the control endpoint should hex-dump every SETUP packet it
    /// receives.
    pub log_setup_packets: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub const CONFIG: Config = Config {
    trace_usb: cfg!(feature = "trace_usb"),
    log_setup_packets: cfg!(feature = "log_setup_packets"),
};
