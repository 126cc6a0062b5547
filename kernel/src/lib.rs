// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Core Tock Kernel
//!
//! The kernel crate holds the code that chips and capsules share: the
//! standard `ErrorCode`, the `debug!` facility, the compile-time
//! configuration, utilities for register access and interior mutability, and
//! the Hardware Interface Layer (HIL) definitions.
//!
//! Most `unsafe` code is in this kernel crate.

#![warn(unreachable_pub)]
#![no_std]

pub mod config;
#[macro_use]
pub mod debug;
pub mod errorcode;
pub mod hil;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
