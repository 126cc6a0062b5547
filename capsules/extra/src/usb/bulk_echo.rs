// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Loopback of the CDC data interface.
//!
//! Packets the host writes to the bulk OUT endpoint are sent back on the bulk
//! IN endpoint. Receiving happens in interrupt context through
//! `hil::usb::EndpointClient`; the echo itself is sent from the main loop by
//! calling [`BulkEcho::service`], since `transmit` busy-waits on the FIFO.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let echo = static_init!(
//!     BulkEcho<'static, Usbf<'static, MmioBus>>,
//!     BulkEcho::new(usbf, CDC_ENDPOINT_BULK_OUT, CDC_ENDPOINT_BULK_IN)
//! );
//! usbf.set_endpoint_client(echo);
//!
//! loop {
//!     usbf.service_pending_reset();
//!     echo.service();
//! }
//! ```

use core::cell::Cell;

use kernel::hil;
use kernel::utilities::cells::MapCell;
use kernel::{debug, usb_trace};

/// Largest packet of a full-speed bulk endpoint.
pub const BULK_PACKET_SIZE: usize = 64;

pub struct BulkEcho<'a, U: hil::usb::UsbFunction<'a>> {
    controller: &'a U,
    out_endpoint: usize,
    in_endpoint: usize,

    /// Last packet received on `out_endpoint`
    buffer: MapCell<[u8; BULK_PACKET_SIZE]>,
    rx_len: Cell<usize>,

    /// Set by the interrupt side when `buffer` holds a packet to echo
    rx_pending: Cell<bool>,

    /// Set when a transfer on `in_endpoint` completed
    tx_done: Cell<bool>,
}

impl<'a, U: hil::usb::UsbFunction<'a>> BulkEcho<'a, U> {
    pub fn new(controller: &'a U, out_endpoint: usize, in_endpoint: usize) -> Self {
        BulkEcho {
            controller,
            out_endpoint,
            in_endpoint,
            buffer: MapCell::new([0; BULK_PACKET_SIZE]),
            rx_len: Cell::new(0),
            rx_pending: Cell::new(false),
            tx_done: Cell::new(false),
        }
    }

    /// Whether a received packet is waiting to be echoed.
    pub fn is_pending(&self) -> bool {
        self.rx_pending.get()
    }

    /// Send back the packet received last, if any. Returns whether a packet
    /// was sent.
    ///
    /// Empty packets are consumed without reply.
    pub fn service(&self) -> bool {
        if !self.rx_pending.get() {
            return false;
        }
        let len = self.rx_len.get();
        let sent = len != 0
            && self
                .buffer
                .map(|buf| {
                    usb_trace!("USB: echo {:02x?}", &buf[..len]);
                    self.controller.transmit(self.in_endpoint, &buf[..len]);
                })
                .is_some();
        self.rx_len.set(0);
        self.rx_pending.set(false);
        sent
    }

    /// Returns and clears the IN completion flag.
    pub fn take_tx_complete(&self) -> bool {
        self.tx_done.replace(false)
    }
}

impl<'a, U: hil::usb::UsbFunction<'a>> hil::usb::EndpointClient for BulkEcho<'a, U> {
    fn packet_received(&self, ep: usize) {
        if ep != self.out_endpoint {
            return;
        }
        if self.rx_pending.get() {
            debug!("USB: ep{} packet overwrites unsent echo", ep);
        }
        let len = self
            .buffer
            .map(|buf| self.controller.read_rx_block(ep, buf))
            .unwrap_or(0);
        self.controller.clear_rx_ready(ep);
        usb_trace!("USB: ep{} received {} bytes", ep, len);
        self.rx_len.set(len);
        self.rx_pending.set(true);
    }

    fn packet_transmitted(&self, ep: usize) {
        if ep == self.in_endpoint {
            usb_trace!("USB: ep{} transmitted", ep);
            self.tx_done.set(true);
        }
    }
}
