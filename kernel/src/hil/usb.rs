// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interface to USB function (device-side) controller hardware.
//!
//! The controller exposes a small set of FIFO-based endpoints. Endpoint 0 is
//! the bidirectional control endpoint; the remaining endpoints carry bulk or
//! interrupt traffic. Received packets stay in the endpoint FIFO until the
//! client drains them and calls [`UsbFunction::clear_rx_ready`], which lets
//! the hardware accept the next packet.
//!
//! All methods are called from a single execution context: either the USB
//! interrupt handler or the main loop with the USB interrupt masked. Client
//! callbacks run synchronously from the interrupt handler and must not block
//! indefinitely.

use crate::ErrorCode;

/// USB function controller interface.
pub trait UsbFunction<'a> {
    /// Set the client that receives bus and control endpoint events.
    fn set_client(&self, client: &'a dyn Client);

    /// Whether a received packet is waiting in the endpoint's FIFO.
    fn is_rx_ready(&self, ep: usize) -> bool;

    /// Whether the packet waiting on `ep` arrived in a SETUP token.
    fn is_rx_setup(&self, ep: usize) -> bool;

    /// Number of bytes in the packet waiting on `ep`.
    fn rx_byte_count(&self, ep: usize) -> usize;

    /// Pop one byte from the receive FIFO of `ep`.
    ///
    /// Callers must not pop more bytes than `rx_byte_count` reported.
    fn read_rx_byte(&self, ep: usize) -> u8;

    /// Drain up to `buf.len()` bytes of the waiting packet into `buf`.
    ///
    /// Returns the number of bytes read, which is the smaller of the packet
    /// length and `buf.len()`.
    fn read_rx_block(&self, ep: usize, buf: &mut [u8]) -> usize;

    /// Release the receive FIFO so the hardware admits the next packet.
    ///
    /// Must be called exactly once per received packet, after draining it.
    fn clear_rx_ready(&self, ep: usize);

    /// Load `buf` into the transmit FIFO of `ep` and start the transfer.
    ///
    /// At most one maximum-size packet is sent; longer buffers are truncated.
    /// A zero-length `buf` sends a zero-length packet.
    fn transmit(&self, ep: usize, buf: &[u8]);

    /// Whether the last transfer on `ep` has left the FIFO, i.e. the endpoint
    /// is no longer busy transmitting.
    fn is_tx_complete(&self, ep: usize) -> bool;

    /// Enable or disable the RX-ready interrupt of `ep`.
    fn set_rx_interrupt(&self, ep: usize, enabled: bool);

    /// Make `ep` answer the host with STALL.
    fn set_stall(&self, ep: usize) -> Result<(), ErrorCode>;

    /// Take `ep` out of the STALL condition.
    fn clear_stall(&self, ep: usize) -> Result<(), ErrorCode>;

    /// Whether `ep` is currently stalled. Out of range endpoints are never
    /// stalled.
    fn is_stalled(&self, ep: usize) -> bool;

    /// Acknowledge the STATUS stage of a control transfer with a zero-length
    /// packet on endpoint 0 and wait until it has been sent.
    fn send_status_zlp(&self);

    /// Program the device address assigned by the host.
    fn set_address(&self, addr: u8);

    fn is_addressed(&self) -> bool;

    fn set_configured(&self, configured: bool);

    fn is_configured(&self) -> bool;

    fn is_attached(&self) -> bool;
}

/// USB function controller client interface.
///
/// These are the events of the control pipe. They are all delivered from the
/// controller's interrupt handler.
pub trait Client {
    /// The host reset the bus. Lifecycle flags, stalls and FIFOs have already
    /// been cleared by the controller.
    fn bus_reset(&self);

    /// A SETUP packet is waiting on endpoint 0.
    fn ctrl_setup(&self);

    /// An OUT packet is waiting on endpoint 0.
    fn ctrl_out(&self);
}

/// Client for the data endpoints (every endpoint but endpoint 0).
pub trait EndpointClient {
    /// A packet is waiting in the receive FIFO of `ep`.
    fn packet_received(&self, ep: usize);

    /// A transfer started on `ep` has completed.
    fn packet_transmitted(&self, ep: usize);
}
