// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Host-side tests of the OpenUSB stack.
//!
//! The chip driver, the control pipe and the CDC-ACM function run unchanged on
//! top of [`sim::SimBus`], a model of the controller that plays the host's
//! side of the bus.

#![forbid(unsafe_code)]

pub mod sim;

#[cfg(test)]
mod cdc_acm;
