// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Busy-wait helpers for drivers that poll hardware status bits.
//!
//! There are two distinct kinds of waiting, and drivers should pick the one
//! that matches the hardware contract:
//!
//! - [`RetryBudget`] bounds a wait by a fixed number of polls. It is meant for
//!   local recovery paths (for example flushing a FIFO that never drains).
//!   The budget is an iteration count, not wall-clock time, so how long it
//!   lasts depends on the core clock.
//! - [`spin_until`] waits without any bound. It is used where the other side
//!   of the bus must respond for the protocol to make progress. If it never
//!   does, the caller hangs. This is a known liveness risk of polled drivers
//!   and callers must document where they use it.

/// A fixed number of polls a driver may spend waiting on a status bit.
#[derive(Clone, Copy, Debug)]
pub struct RetryBudget {
    remaining: usize,
}

impl RetryBudget {
    pub const fn new(polls: usize) -> RetryBudget {
        RetryBudget { remaining: polls }
    }

    /// Spend one poll. Returns `false` once the budget is used up.
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            false
        } else {
            self.remaining -= 1;
            true
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

/// Poll `done` until it returns `true`. Never gives up.
pub fn spin_until<F: FnMut() -> bool>(mut done: F) {
    while !done() {
        core::hint::spin_loop();
    }
}
