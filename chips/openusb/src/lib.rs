// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Driver for the OpenUSB USB 2.0 function controller.
//!
//! The controller is a memory mapped block with four FIFO endpoints. Endpoint
//! 0 is the control endpoint, endpoints 1-3 can be used for bulk or interrupt
//! traffic. All data moves through byte-wide FIFO ports, there is no DMA.

#![no_std]
#![crate_name = "openusb"]
#![crate_type = "rlib"]

pub mod registers;
pub mod usbf;
